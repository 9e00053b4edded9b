//! Protocol errors
//!
//! Most failures in this core are recovered at the operation boundary and
//! surfaced through return values and the status channel; the variants here
//! cover the few places where a `Result` is the natural shape (opening a
//! port, connecting without a bound port).

use thiserror::Error;

/// Errors that can occur during serial communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    #[error("No port selected")]
    NoPortSelected,
}
