use std::io;
use thiserror::Error;

/// The primary error type for the `velbus-lib` library.
#[derive(Error, Debug)]
pub enum VelbusError {
    #[error("connection to the Velbus gateway failed: {0}")]
    ConnectionFailed(String),

    #[error("invalid connection string: {0}")]
    InvalidDsn(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("timeout while waiting for the bus: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("protocol description error: {0}")]
    ProtocolFile(String),

    #[error("malformed message: {0}")]
    Message(#[from] MessageError),

    #[error("not connected")]
    NotConnected,
}

/// Frame-level decode failure. The reader treats this as a resync signal
/// (drop one byte and retry), it never reaches the public API.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid priority byte {0:#04x}")]
    BadPriority(u8),

    #[error("invalid end byte {0:#04x}")]
    BadEnd(u8),

    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    BadChecksum { expected: u8, actual: u8 },
}

/// Typed-message decode failure: the data bytes do not match the layout the
/// command byte promises. The handler logs and drops the frame.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("expected exactly one channel bit, got {0:#010b}")]
    NotOneChannel(u8),

    #[error("unexpected value {value:#04x} for {field}")]
    BadValue { field: &'static str, value: u8 },
}
