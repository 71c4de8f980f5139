use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::serial::error::SerialPortError;

/// Splits a byte stream into trimmed text lines.
///
/// Each yielded line has the delimiter removed and surrounding whitespace
/// stripped, which also takes care of `\r` remnants from devices that
/// print `\r\n`. Lines which are empty after trimming are suppressed.
#[derive(Debug)]
pub struct LinesCodec {
    /// How far we have looked for a newline into the buffer
    cursor: usize,

    /// How to delimit incoming byte streams.
    /// This delimiter is not included in the yielded lines.
    delimiter: u8,
}

impl LinesCodec {
    /// Create a new codec.
    pub fn new(delimiter: u8) -> Self {
        Self {
            cursor: 0,
            delimiter,
        }
    }
}

impl Default for LinesCodec {
    fn default() -> Self {
        Self::new(b'\n')
    }
}

impl Decoder for LinesCodec {
    type Item = String;
    type Error = SerialPortError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let read_to = src.len();

            let look_at = &src[self.cursor..read_to];

            let Some(position) = look_at.iter().position(|&byte| byte == self.delimiter) else {
                // We did not find a full line.
                // The next time we are called the same buffer `src` will be provided to us
                // (same starting point), but possibly with more data.
                // Since our job is to find the delimiter, we don't need to re-read the bytes
                // we have already looked at.
                self.cursor = read_to;

                return Ok(None);
            };

            // Since we might "start late" in the buffer (from the cursor),
            // the "global" position within the buffer has to be calculated.
            let actual_position = self.cursor + position;

            // Next time we need to start over.
            self.cursor = 0;

            // Split at the delimiter, getting the bytes before it.
            let line = src.split_to(actual_position);

            // Discard the delimiter by advancing the source buffer beyond it.
            src.advance(1);

            let text = String::from_utf8_lossy(&line).trim().to_string();

            if text.is_empty() {
                // Empty after trimming: suppressed, keep scanning.
                continue;
            }

            return Ok(Some(text));
        }
    }
}
