//! Stream decoders for the filters the validation core has to read through.
//!
//! Cross-reference streams, object streams and XMP metadata are the only
//! stream bodies the core decodes. They use:
//! - FlateDecode (zlib/deflate), almost always with a PNG predictor
//! - LZWDecode (older writers)
//! - ASCIIHexDecode / ASCII85Decode (text-safe wrappers)
//! - RunLengthDecode
//!
//! Image-only filters (DCT, CCITT, JBIG2, JPX) are reported as unsupported.

use crate::error::{Error, Result};
use crate::parser_config::ValidationOptions;

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use lzw::LzwDecoder;
pub use predictor::{decode_predictor, DecodeParams};
pub use runlength::RunLengthDecoder;

/// PDF stream filter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// FlateDecode (deflate/zlib compression)
    FlateDecode,
    /// ASCIIHexDecode (hexadecimal encoding)
    ASCIIHexDecode,
    /// ASCII85Decode (base-85 encoding)
    ASCII85Decode,
    /// LZWDecode (Lempel-Ziv-Welch compression)
    LZWDecode,
    /// RunLengthDecode (run-length encoding)
    RunLengthDecode,
}

impl Filter {
    /// Map a filter name (full or abbreviated) to a decodable filter.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" | "Fl" => Some(Filter::FlateDecode),
            "ASCIIHexDecode" | "AHx" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" | "A85" => Some(Filter::ASCII85Decode),
            "LZWDecode" | "LZW" => Some(Filter::LZWDecode),
            "RunLengthDecode" | "RL" => Some(Filter::RunLengthDecode),
            _ => None,
        }
    }

    fn decoder(self) -> Box<dyn StreamDecoder> {
        match self {
            Filter::FlateDecode => Box::new(FlateDecoder),
            Filter::ASCIIHexDecode => Box::new(AsciiHexDecoder),
            Filter::ASCII85Decode => Box::new(Ascii85Decoder),
            Filter::LZWDecode => Box::new(LzwDecoder),
            Filter::RunLengthDecode => Box::new(RunLengthDecoder),
        }
    }
}

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Run `data` through the named filters in order, then undo the predictor.
///
/// Decompression bomb limits come from `options`; a limit of 0 disables
/// that check.
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: &ValidationOptions,
) -> Result<Vec<u8>> {
    let compressed_size = data.len().max(1);
    let mut current = data.to_vec();

    for filter_name in filters {
        let filter = Filter::from_name(filter_name)
            .ok_or_else(|| Error::UnsupportedFilter(filter_name.clone()))?;
        let decoder = filter.decoder();
        current = decoder.decode(&current)?;
        log::trace!("{} produced {} bytes", decoder.name(), current.len());

        let ratio = current.len() / compressed_size;
        if options.max_decompression_ratio > 0 && ratio > options.max_decompression_ratio as usize
        {
            return Err(Error::Decode(format!(
                "decompression ratio {}:1 exceeds limit {}:1",
                ratio, options.max_decompression_ratio
            )));
        }
        if options.max_decompressed_size > 0 && current.len() > options.max_decompressed_size {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                options.max_decompressed_size
            )));
        }
    }

    match params {
        Some(params) if params.predictor != 1 => decode_predictor(&current, params),
        _ => Ok(current),
    }
}
