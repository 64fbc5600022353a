//! Shared helpers for building bitmap planes: palettes, index packing and
//! transparency tracking.

use super::ccitt::{encode_group4, GROUP_4_K};
use super::image_data::{FaxData, ImageDataBitmap, ImageDataOptions, Transparency};

/// Color table of an indexed image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Palette {
    /// R, G, B, A per entry
    entries: Vec<[u8; 4]>,
}

impl Palette {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.entries.push([r, g, b, a]);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Alpha of an entry; indices past the table are opaque black.
    pub(crate) fn alpha(&self, index: usize) -> u8 {
        self.entries.get(index).map(|e| e[3]).unwrap_or(255)
    }

    /// Whether any entry is not fully opaque.
    pub(crate) fn has_transparency(&self) -> bool {
        self.entries.iter().any(|e| e[3] != 255)
    }

    /// RGB triples, alpha dropped.
    pub(crate) fn rgb_table(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|e| [e[0], e[1], e[2]]).collect()
    }

    /// Classify a two-color palette.
    ///
    /// Returns 1 for black/white, -1 for white/black and 0 for anything else.
    pub(crate) fn bitonal(&self) -> i8 {
        if self.entries.len() != 2 {
            return 0;
        }
        let is = |e: &[u8; 4], v: u8| e[0] == v && e[1] == v && e[2] == v;
        match (&self.entries[0], &self.entries[1]) {
            (first, second) if is(first, 0) && is(second, 255) => 1,
            (first, second) if is(first, 255) && is(second, 0) => -1,
            _ => 0,
        }
    }

    /// Whether entry `i` is gray level `i` for all 256 entries.
    pub(crate) fn is_identity_gray_ramp(&self) -> bool {
        self.entries.len() == 256
            && self
                .entries
                .iter()
                .enumerate()
                .all(|(i, e)| e[0] as usize == i && e[1] as usize == i && e[2] as usize == i)
    }
}

/// Bytes per row for `width` samples of `bits` each, rows byte-aligned.
pub(crate) fn packed_stride(width: u32, bits: u32) -> usize {
    (width as usize * bits as usize).div_ceil(8)
}

/// Read the palette index of pixel `x` from a packed row.
pub(crate) fn read_packed_index(row: &[u8], x: usize, bits: u32) -> usize {
    match bits {
        1 => ((row.get(x / 8).copied().unwrap_or(0) >> (7 - (x % 8))) & 0x01) as usize,
        4 => {
            let byte = row.get(x / 2).copied().unwrap_or(0);
            if x % 2 == 0 {
                (byte >> 4) as usize
            } else {
                (byte & 0x0F) as usize
            }
        },
        _ => row.get(x).copied().unwrap_or(0) as usize,
    }
}

/// Collects per-pixel alpha and decides which transparency, if any, is needed.
#[derive(Debug)]
pub(crate) struct AlphaTracker {
    width: u32,
    alpha: Vec<u8>,
    mask: Vec<u8>,
    mask_stride: usize,
    has_mask: bool,
    has_alpha_mask: bool,
}

impl AlphaTracker {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        let mask_stride = packed_stride(width, 1);
        Self {
            width,
            alpha: vec![255; width as usize * height as usize],
            mask: vec![0; mask_stride * height as usize],
            mask_stride,
            has_mask: false,
            has_alpha_mask: false,
        }
    }

    /// Record the alpha of the pixel at (`x`, `y`), `y` counted from the top.
    pub(crate) fn set(&mut self, x: u32, y: u32, alpha: u8) {
        let index = y as usize * self.width as usize + x as usize;
        if let Some(slot) = self.alpha.get_mut(index) {
            *slot = alpha;
        }
        if alpha != 255 {
            self.has_mask = true;
            if alpha != 0 {
                self.has_alpha_mask = true;
            }
            // Partially transparent pixels are left unmasked in the stencil;
            // they are only relevant if the alpha plane is used.
            if alpha == 0 {
                let byte = y as usize * self.mask_stride + x as usize / 8;
                if let Some(slot) = self.mask.get_mut(byte) {
                    *slot |= 0x80 >> (x % 8);
                }
            }
        }
    }

    /// Whether any pixel was not fully opaque.
    pub(crate) fn alpha_used(&self) -> bool {
        self.has_mask
    }

    /// `None` when every pixel is opaque, a stencil mask when alpha is binary,
    /// otherwise the full alpha plane.
    pub(crate) fn finish(self) -> Option<Transparency> {
        if !self.has_mask {
            None
        } else if self.has_alpha_mask {
            Some(Transparency::Alpha(self.alpha))
        } else {
            Some(Transparency::Mask(self.mask))
        }
    }
}

/// Attach a CCITT Group 4 stream to a bitonal bitmap when it is worth it.
pub(crate) fn apply_ccitt(bitmap: &mut ImageDataBitmap, options: &ImageDataOptions) {
    if !options.enable_ccitt_compression || bitmap.is_bitonal == 0 || bitmap.bits_per_component != 1 {
        return;
    }
    // Palette black/white (1) stores black as 0; white/black (-1) stores black as 1.
    let black_is_one = bitmap.is_bitonal < 0;
    match encode_group4(&bitmap.data, bitmap.width, bitmap.height, black_is_one) {
        Ok(encoded) => {
            if options.ccitt_only_if_smaller && encoded.len() > bitmap.data.len() {
                log::debug!(
                    "CCITT stream ({} bytes) larger than packed bits ({} bytes), not used",
                    encoded.len(),
                    bitmap.data.len()
                );
                return;
            }
            bitmap.fax = Some(FaxData {
                data: encoded,
                k: GROUP_4_K,
            });
        },
        Err(e) => {
            log::warn!("CCITT encoding skipped: {}", e);
        },
    }
}
