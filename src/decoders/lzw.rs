//! LZWDecode implementation.
//!
//! PDF LZW is MSB-first with 9..=12 bit codes and, by default, the code
//! width grows one code early (`/EarlyChange 1`), which is the TIFF
//! flavour `weezl` implements.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use weezl::{decode::Decoder, BitOrder};

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
        let mut output = Vec::new();
        let result = decoder.into_vec(&mut output).decode(input);
        match result.status {
            Ok(_) => Ok(output),
            Err(e) if !output.is_empty() => {
                log::warn!("LZWDecode stopped after {} bytes: {:?}", output.len(), e);
                Ok(output)
            },
            Err(e) => Err(Error::Decode(format!("LZWDecode error: {:?}", e))),
        }
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weezl::encode::Encoder;

    #[test]
    fn test_decode_encoded_text() {
        let text = b"-----A---B-----A---B-----A---B";
        let encoded = Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
            .encode(text)
            .unwrap();
        assert_eq!(LzwDecoder.decode(&encoded).unwrap(), text.to_vec());
    }

    #[test]
    fn test_garbage_fails() {
        assert!(LzwDecoder.decode(&[0xFF, 0xFF, 0xFF]).is_err());
    }
}
