//! Transport abstraction
//!
//! The session talks to an opaque byte endpoint through this trait so the
//! same transaction layer drives a real serial port, the scripted mock, or
//! any future link type.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A byte-oriented endpoint for instrument communication
pub trait Transport: Read + Write + Send {
    /// Set timeout for read operations
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Discard any buffered input
    fn clear_input(&mut self) -> io::Result<()>;

    /// Discard any buffered output
    fn clear_output(&mut self) -> io::Result<()>;

    /// Number of bytes available to read without blocking
    fn bytes_to_read(&mut self) -> io::Result<u32>;

    /// Clone the endpoint for use by the receive pump thread
    fn try_clone(&self) -> io::Result<Box<dyn Transport>>;

    /// Whether the endpoint is currently usable
    fn is_open(&self) -> bool;

    /// Human-readable description ("ttyUSB0 57600 8N1") for status messages
    fn describe(&self) -> String;
}

/// Serial port wrapper implementing [`Transport`]
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    description: String,
}

impl SerialTransport {
    /// Wrap an open serial port; `description` ends up in status messages
    pub fn new(port: Box<dyn SerialPort>, description: String) -> Self {
        Self { port, description }
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_input(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn clear_output(&mut self) -> io::Result<()> {
        self.port
            .clear(serialport::ClearBuffer::Output)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }

    fn try_clone(&self) -> io::Result<Box<dyn Transport>> {
        let port_clone = self
            .port
            .try_clone()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(SerialTransport {
            port: port_clone,
            description: self.description.clone(),
        }))
    }

    fn is_open(&self) -> bool {
        // An opened serialport handle stays open until dropped; a vanished
        // USB adapter shows up as read/write errors instead.
        true
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}
