//! In-memory transport for exercising the protocol stack without hardware
//!
//! A [`MockTransport`] is cloneable; all clones share one buffer set, so a
//! test keeps one clone as a control handle while the session owns the
//! other. Replies are scripted per write: each write to the transport
//! releases the next scripted group of read chunks, which mirrors how the
//! instruments only ever talk when spoken to.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::transport::Transport;

#[derive(Default)]
struct Inner {
    written: Vec<Vec<u8>>,
    scripted: VecDeque<Vec<Vec<u8>>>,
    pending: VecDeque<Vec<u8>>,
    fail_writes: bool,
    closed: bool,
}

/// Scriptable bidirectional transport backed by shared in-memory buffers
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    /// Create an empty, open mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single-chunk reply released by the next unmatched write
    pub fn script_reply(&self, reply: &[u8]) {
        self.script_replies(&[reply]);
    }

    /// Queue a multi-chunk reply released by the next unmatched write.
    ///
    /// Each chunk arrives as a separate read, so a test can model an
    /// acknowledgement byte followed by a completion byte.
    pub fn script_replies(&self, chunks: &[&[u8]]) {
        self.inner
            .lock()
            .scripted
            .push_back(chunks.iter().map(|c| c.to_vec()).collect());
    }

    /// Make bytes readable immediately, independent of any write
    pub fn push_read(&self, data: &[u8]) {
        self.inner.lock().pending.push_back(data.to_vec());
    }

    /// Every write issued so far, one entry per call
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().written.clone()
    }

    /// All written bytes concatenated and decoded as Latin-1
    pub fn written_string(&self) -> String {
        self.inner
            .lock()
            .written
            .iter()
            .flatten()
            .map(|&b| b as char)
            .collect()
    }

    /// Forget recorded writes (keeps scripted replies)
    pub fn clear_writes(&self) {
        self.inner.lock().written.clear();
    }

    /// Make subsequent writes fail with a broken-pipe error
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Mark the transport closed; `is_open` turns false
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut inner = self.inner.lock();
            if let Some(mut chunk) = inner.pending.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    inner.pending.push_front(chunk.split_off(n));
                }
                return Ok(n);
            }
        }
        // Behave like a serial port with a read timeout
        thread::sleep(Duration::from_millis(10));
        Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_writes || inner.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        inner.written.push(buf.to_vec());
        if let Some(group) = inner.scripted.pop_front() {
            inner.pending.extend(group);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.inner.lock().pending.clear();
        Ok(())
    }

    fn clear_output(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.inner.lock().pending.iter().map(|c| c.len() as u32).sum())
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }

    fn is_open(&self) -> bool {
        !self.inner.lock().closed
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scripted_reply_released_by_write() {
        let mock = MockTransport::new();
        mock.script_reply(b"ok\n");
        let mut reader = mock.clone();
        let mut buf = [0u8; 16];
        assert!(reader.read(&mut buf).is_err());
        let mut writer = mock.clone();
        writer.write_all(b":r1a\n").unwrap();
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ok\n");
        assert_eq!(mock.writes(), vec![b":r1a\n".to_vec()]);
    }

    #[test]
    fn multi_chunk_groups_arrive_as_separate_reads() {
        let mock = MockTransport::new();
        mock.script_replies(&[b"H", b"N"]);
        let mut t = mock.clone();
        t.write_all(&[0x01]).unwrap();
        let mut buf = [0u8; 16];
        let n = t.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"H");
        let n = t.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"N");
    }

    #[test]
    fn clear_input_drops_pending_bytes() {
        let mock = MockTransport::new();
        mock.push_read(b"stale");
        let mut t = mock.clone();
        t.clear_input().unwrap();
        assert_eq!(t.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn closed_mock_rejects_writes() {
        let mock = MockTransport::new();
        mock.close();
        assert!(!mock.is_open());
        let mut t = mock.clone();
        assert!(t.write_all(b"x").is_err());
    }
}
