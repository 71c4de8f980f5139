use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

use crate::error::Error;

/// Serial port related errors.
pub(crate) mod error;

/// Codecs for decoding messages from wire.
pub(crate) mod codecs;

/// Open the port at the given path for async reading.
///
/// The device talks 8N1 without flow control; only the baud rate varies.
pub(crate) fn open(path: &str, baud_rate: u32) -> Result<SerialStream, Error> {
    info!(%path, %baud_rate, "Opening serial port");

    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| Error::DeviceOpen {
            path: path.to_string(),
            problem: format!("{e:#?}"),
        })
}
