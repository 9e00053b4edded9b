//! Receive pipeline
//!
//! Converts the asynchronous stream of raw byte chunks arriving from the
//! transport into a pollable queue of completed replies. A dedicated
//! assembly thread takes chunks off an unbounded channel, accumulates them
//! until a reply boundary, and pushes finished lines onto a reply channel
//! that the transaction layer polls with a timeout. Raw chunks are also
//! fanned out to passive observers for console display.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Observer receiving every decoded inbound chunk (un-trimmed)
pub type ChunkObserver = Box<dyn Fn(&str) + Send>;

enum ChunkEvent {
    Data(String),
    /// Clear the accumulation buffer; the ack lets `flush` wait until all
    /// chunks queued before the marker have been consumed.
    Flush(Sender<()>),
    Stop,
}

/// Non-blocking entry point handed to the receive pump thread.
///
/// Decodes a byte chunk as Latin-1 and enqueues it; never blocks, never
/// fails. Safe to call from any thread.
#[derive(Clone)]
pub struct ChunkSink {
    tx: Sender<ChunkEvent>,
    enabled: Arc<AtomicBool>,
}

impl ChunkSink {
    /// Enqueue one received chunk
    pub fn on_chunk(&self, bytes: &[u8]) {
        if bytes.is_empty() || !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        // Latin-1: every byte maps to the code point of the same value.
        let text: String = bytes.iter().map(|&b| b as char).collect();
        let _ = self.tx.send(ChunkEvent::Data(text));
    }
}

/// Restores line-break-wait mode when dropped.
///
/// Taken around binary bulk exchanges so a failure mid-transfer cannot
/// leave the assembler permanently in binary mode.
pub struct BinaryModeGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BinaryModeGuard {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// Chunk-to-reply assembler with a background thread
pub struct ReceiveListener {
    chunk_tx: Sender<ChunkEvent>,
    reply_rx: Mutex<Receiver<String>>,
    line_break_wait: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
    observers: Arc<Mutex<Vec<ChunkObserver>>>,
    worker: Option<JoinHandle<()>>,
}

impl Default for ReceiveListener {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveListener {
    /// Create the listener and start its assembly thread
    pub fn new() -> Self {
        let (chunk_tx, chunk_rx) = mpsc::channel::<ChunkEvent>();
        let (reply_tx, reply_rx) = mpsc::channel::<String>();
        let line_break_wait = Arc::new(AtomicBool::new(true));
        let enabled = Arc::new(AtomicBool::new(true));
        let observers: Arc<Mutex<Vec<ChunkObserver>>> = Arc::new(Mutex::new(Vec::new()));

        let worker = {
            let line_break_wait = Arc::clone(&line_break_wait);
            let observers = Arc::clone(&observers);
            thread::Builder::new()
                .name("siggen-rx-assembly".to_string())
                .spawn(move || {
                    assembly_loop(chunk_rx, reply_tx, line_break_wait, observers);
                })
                .ok()
        };

        Self {
            chunk_tx,
            reply_rx: Mutex::new(reply_rx),
            line_break_wait,
            enabled,
            observers,
            worker,
        }
    }

    /// Sink for the transport's receive pump
    pub fn sink(&self) -> ChunkSink {
        ChunkSink {
            tx: self.chunk_tx.clone(),
            enabled: Arc::clone(&self.enabled),
        }
    }

    /// Enqueue one received chunk (see [`ChunkSink::on_chunk`])
    pub fn on_chunk(&self, bytes: &[u8]) {
        self.sink().on_chunk(bytes);
    }

    /// Block up to `timeout` for the next finalized reply
    pub fn poll(&self, timeout: Duration) -> Option<String> {
        match self.reply_rx.lock().recv_timeout(timeout) {
            Ok(reply) => Some(reply),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Discard queued chunks, the accumulation buffer, and queued replies.
    ///
    /// Establishes a clean point before a new request so a stale reply
    /// cannot be mistaken for the new one.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.chunk_tx.send(ChunkEvent::Flush(ack_tx)).is_ok() {
            // Wait until everything queued before the marker has been
            // consumed, then drain whatever it produced.
            let _ = ack_rx.recv_timeout(Duration::from_millis(500));
        }
        let rx = self.reply_rx.lock();
        while rx.try_recv().is_ok() {}
    }

    /// Toggle the reply-finalize policy.
    ///
    /// Enabled (default): a reply is complete when a chunk ends with a line
    /// terminator. Disabled: every non-empty chunk is an immediately-final
    /// reply, used for fixed-length binary acknowledgements.
    pub fn set_line_break_wait(&self, enabled: bool) {
        self.line_break_wait.store(enabled, Ordering::Relaxed);
    }

    /// Disable line-break-wait mode until the guard is dropped
    pub fn binary_mode_guard(&self) -> BinaryModeGuard {
        self.line_break_wait.store(false, Ordering::Relaxed);
        BinaryModeGuard {
            flag: Arc::clone(&self.line_break_wait),
        }
    }

    /// Register a passive observer of raw inbound chunks
    pub fn add_observer(&self, observer: ChunkObserver) {
        self.observers.lock().push(observer);
    }

    /// Remove all registered observers
    pub fn clear_observers(&self) {
        self.observers.lock().clear();
    }

    /// Stop processing; the assembly thread terminates promptly
    pub fn stop(&mut self) {
        self.enabled.store(false, Ordering::Relaxed);
        let _ = self.chunk_tx.send(ChunkEvent::Stop);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        let rx = self.reply_rx.lock();
        while rx.try_recv().is_ok() {}
    }
}

impl Drop for ReceiveListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn assembly_loop(
    chunk_rx: Receiver<ChunkEvent>,
    reply_tx: Sender<String>,
    line_break_wait: Arc<AtomicBool>,
    observers: Arc<Mutex<Vec<ChunkObserver>>>,
) {
    // Accumulation is unbounded: a chunk with no terminator simply waits
    // for the next one to supply it.
    let mut buf = String::new();
    while let Ok(event) = chunk_rx.recv() {
        match event {
            ChunkEvent::Data(chunk) => {
                // Observers run before the reply is queued so that a caller
                // waiting in poll() sees the observer side effect as soon as
                // the reply arrives.
                for observer in observers.lock().iter() {
                    observer(&chunk);
                }
                buf.push_str(&chunk);
                if !line_break_wait.load(Ordering::Relaxed) || chunk.ends_with('\n') {
                    let reply = buf.trim().to_string();
                    buf.clear();
                    if !reply.is_empty() && reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            }
            ChunkEvent::Flush(ack) => {
                buf.clear();
                let _ = ack.send(());
            }
            ChunkEvent::Stop => break,
        }
    }
}
