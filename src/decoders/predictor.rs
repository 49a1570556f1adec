//! Predictor reversal for Flate/LZW streams.
//!
//! Cross-reference streams are nearly always written with the PNG "Up"
//! predictor (`/Predictor 12`). Every PNG-predicted row carries its own
//! algorithm tag byte, so the declared value 10..=15 only says "PNG".

use crate::error::{Error, Result};

/// Decode parameters for stream decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of sample data per row, excluding any PNG tag byte.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete sample, at least one.
    fn bytes_per_pixel(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Undo the predictor named in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(decode_tiff(data, params)),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.pixel_bytes_per_row().max(1);
    let bpp = params.bytes_per_pixel();
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
    }
    output
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.pixel_bytes_per_row();
    if row_len == 0 {
        return Err(Error::Decode("PNG predictor with empty rows".to_string()));
    }
    let bpp = params.bytes_per_pixel();
    let mut output: Vec<u8> = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for encoded in data.chunks(row_len + 1) {
        let (&tag, samples) = match encoded.split_first() {
            Some(split) => split,
            None => break,
        };
        if samples.len() < row_len {
            log::warn!(
                "PNG predictor: truncated last row ({} of {} bytes)",
                samples.len(),
                row_len
            );
        }

        let mut row = vec![0u8; samples.len()];
        for i in 0..samples.len() {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let up_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag)));
                },
            };
            row[i] = samples[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        previous[..row.len()].copy_from_slice(&row);
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (i16::from(a), i16::from(b), i16::from(c));
    let p = ia + ib - ic;
    let (pa, pb, pc) = ((p - ia).abs(), (p - ib).abs(), (p - ic).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
