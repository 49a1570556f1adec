//! ASCIIHexDecode implementation.
//!
//! Pairs of hex digits become bytes; whitespace is ignored, `>` ends the
//! data and a trailing odd digit is completed with an implicit `0`.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut pending: Option<u8> = None;

        for &c in input {
            if c == b'>' {
                break;
            }
            if matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C) {
                continue;
            }
            let nibble = hex_value(c).ok_or_else(|| {
                Error::Decode(format!("ASCIIHexDecode: invalid hex digit '{}'", c as char))
            })?;
            match pending.take() {
                Some(high) => output.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        }

        if let Some(high) = pending {
            output.push(high << 4);
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

/// Numeric value of one ASCII hex digit.
pub(crate) fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_whitespace_and_terminator() {
        let out = AsciiHexDecoder.decode(b"48 65\n6C 6c 6F>ignored").unwrap();
        assert_eq!(out, b"Hello");
    }

    #[test]
    fn test_odd_digit_count_pads_with_zero() {
        assert_eq!(AsciiHexDecoder.decode(b"486").unwrap(), vec![0x48, 0x60]);
    }

    #[test]
    fn test_invalid_digit() {
        assert!(AsciiHexDecoder.decode(b"4G").is_err());
    }
}
