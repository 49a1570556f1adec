//! RunLengthDecode implementation.
//!
//! Length byte 0..=127 copies the next N+1 bytes, 129..=255 repeats the next
//! byte 257-N times, and 128 ends the data.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut rest = input;

        while let Some((&length, tail)) = rest.split_first() {
            match length {
                0..=127 => {
                    let count = length as usize + 1;
                    if tail.len() < count {
                        return Err(Error::Decode(format!(
                            "RunLengthDecode: literal run needs {} bytes, {} left",
                            count,
                            tail.len()
                        )));
                    }
                    output.extend_from_slice(&tail[..count]);
                    rest = &tail[count..];
                },
                128 => break,
                _ => {
                    let (&byte, after) = tail.split_first().ok_or_else(|| {
                        Error::Decode("RunLengthDecode: missing byte for run".to_string())
                    })?;
                    output.resize(output.len() + (257 - length as usize), byte);
                    rest = after;
                },
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}
