//! CCITT Group 4 encoding for bilevel images.
//!
//! A 1-bit image with a pure black/white palette can be stored with the
//! CCITTFaxDecode filter instead of raw packed bits. The encoder itself comes from
//! the `fax` crate; this module adapts the packed index plane to its
//! per-pixel color iterator.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.4.6 - CCITTFaxDecode Filter
//! CCITT Spec: ITU-T Recommendation T.6

use fax::encoder::Encoder;
use fax::{Color, VecWriter};

use crate::error::{Error, Result};

/// K parameter for pure two-dimensional (Group 4) encoding.
pub const GROUP_4_K: i32 = -1;

/// Encode byte-aligned, MSB-first packed rows with CCITT Group 4.
///
/// `black_is_one` states which bit value denotes a black pixel in `packed`; the
/// encoded stream always carries the true colors, so it decodes with the default
/// `/BlackIs1 false`.
pub fn encode_group4(packed: &[u8], width: u32, height: u32, black_is_one: bool) -> Result<Vec<u8>> {
    let width16 = u16::try_from(width)
        .map_err(|_| Error::NotImplemented(format!("CCITT encoding of {} pixel wide rows", width)))?;
    if u16::try_from(height).is_err() {
        return Err(Error::NotImplemented(format!(
            "CCITT encoding of {} pixel high images",
            height
        )));
    }

    let bytes_per_row = (width as usize).div_ceil(8);
    if packed.len() < bytes_per_row * height as usize {
        return Err(Error::Image(format!(
            "bilevel plane too short: {} bytes for {}x{}",
            packed.len(),
            width,
            height
        )));
    }

    let mut encoder = Encoder::new(VecWriter::new());
    for row in packed.chunks(bytes_per_row).take(height as usize) {
        let pels = (0..width as usize).map(|x| {
            let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
            if (bit == 1) == black_is_one {
                Color::Black
            } else {
                Color::White
            }
        });
        encoder
            .encode_line(pels, width16)
            .map_err(|_| Error::Image("CCITT encoder rejected a row".to_string()))?;
    }
    let writer = encoder
        .finish()
        .map_err(|_| Error::Image("CCITT encoder failed to terminate".to_string()))?;
    let encoded = writer.finish();

    log::debug!(
        "CCITT Group 4: {}x{} pixels, {} packed bytes -> {} encoded bytes",
        width,
        height,
        bytes_per_row * height as usize,
        encoded.len()
    );
    Ok(encoded)
}
