//! FlateDecode (zlib/deflate) implementation.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
///
/// Damaged streams are common in the wild; the decoder keeps whatever it
/// inflated before the damage and falls back to raw deflate when the zlib
/// wrapper itself is broken.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!(
                    "FlateDecode partial recovery: {} bytes before corruption: {}",
                    output.len(),
                    e
                );
                return Ok(output);
            },
            Err(e) => e,
        };

        // Raw deflate, first as-is, then skipping a damaged 2-byte zlib header.
        for skip in [0usize, 2] {
            if input.len() <= skip {
                break;
            }
            output.clear();
            match DeflateDecoder::new(&input[skip..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::debug!("FlateDecode recovered as raw deflate (skip {})", skip);
                    return Ok(output);
                },
                Err(_) if !output.is_empty() => return Ok(output),
                _ => {},
            }
        }

        Err(Error::Decode(format!("FlateDecode error: {}", zlib_err)))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
