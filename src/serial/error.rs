use std::io;

use thiserror::Error;

/// Errors from an open serial port session.
#[derive(Debug, Error)]
pub enum SerialPortError {
    /// IO related errors.
    #[error("Underlying IO problem")]
    Io(#[from] io::Error),

    /// The byte stream ended, i.e. the device went away.
    #[error("Serial port disconnected")]
    Disconnected,
}
