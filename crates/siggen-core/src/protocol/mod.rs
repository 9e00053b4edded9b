//! Serial protocol plumbing
//!
//! Turns a half-duplex, byte-oriented serial channel into a synchronous
//! request/reply API: port configuration and enumeration, the chunk-to-line
//! receive pipeline, and the session/transaction layer on top of it.

mod error;
mod listener;
pub mod mock;
pub mod serial;
mod session;
mod transport;

pub use error::ProtocolError;
pub use listener::{BinaryModeGuard, ChunkObserver, ReceiveListener};
pub use serial::{list_ports, open_port, FlowControl, Parity, PortInfo, PortSettings};
pub use session::{hex_dump, DeviceSession, OutputObserver, Status, StatusSink};
pub use transport::{SerialTransport, Transport};

use std::time::Duration;

/// Fixed timeout for a single request/reply transaction.
///
/// Not configurable; both device families answer well inside this window
/// or not at all.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout applied to the serial port so the receive pump can poll
/// its stop flag.
pub const PORT_READ_TIMEOUT: Duration = Duration::from_millis(100);
