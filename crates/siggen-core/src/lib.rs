//! # siggen Core Library
//!
//! Core functionality for controlling bench function generators over a
//! serial link.
//!
//! This library provides:
//! - Serial port plumbing and a pluggable [`protocol::Transport`]
//! - An asynchronous-to-synchronous receive pipeline ([`protocol::ReceiveListener`])
//! - Connection lifecycle and the request/reply transaction ([`protocol::DeviceSession`])
//! - The [`device::FuncGen`] capability contract with one codec per device
//!   family, plus an inert stand-in for "no device selected"
//!
//! ## Supported instruments
//!
//! - MHS-5200 series (25 MHz DDS generators)
//! - FY-6900 series (60/100 MHz DDS generators)
//!
//! ## Example
//!
//! ```rust,ignore
//! use siggen_core::device::{DeviceKind, FuncGen};
//!
//! let mut gen = DeviceKind::Mhs5200.build(std::sync::Arc::new(|status, msg| {
//!     println!("{status:?}: {msg}");
//! }));
//! gen.set_port("/dev/ttyUSB0");
//! println!("CH1 frequency: {} Hz", gen.get_frequency(1));
//! ```

#![warn(missing_docs)]

pub mod device;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::device::{
        DeviceKind, FuncGen, IdName, MeasureMode, NullProgress, SweepDirection, SweepObject,
        SweepSource, TransferProgress, WaveType,
    };
    pub use crate::protocol::{
        DeviceSession, FlowControl, Parity, PortSettings, ProtocolError, ReceiveListener, Status,
        Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
