//! Canonical image data handed to the PDF writer.
//!
//! Every supported source format is normalized into one of two shapes:
//!
//! - **Bitmap**: uncompressed pixel planes (gray, RGB or palette indices) plus
//!   optional transparency and an optional CCITT Group 4 alternative for
//!   bilevel images. The writer compresses these with FlateDecode or embeds
//!   the fax data with CCITTFaxDecode.
//! - **Dct**: JPEG data passed through unchanged for the DCTDecode filter.

/// Options controlling [`ImportedImage::prepare_image_data`](super::ImportedImage::prepare_image_data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDataOptions {
    /// Offer a CCITT Group 4 stream for black/white palette images.
    pub enable_ccitt_compression: bool,
    /// Drop the CCITT stream when it is larger than the packed bits.
    pub ccitt_only_if_smaller: bool,
}

impl Default for ImageDataOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDataOptions {
    /// Create options with CCITT compression enabled.
    pub fn new() -> Self {
        Self {
            enable_ccitt_compression: true,
            ccitt_only_if_smaller: true,
        }
    }

    /// Enable or disable CCITT compression.
    pub fn with_ccitt_compression(mut self, enable: bool) -> Self {
        self.enable_ccitt_compression = enable;
        self
    }

    /// Keep the CCITT stream even when it does not save space.
    pub fn with_ccitt_only_if_smaller(mut self, only_if_smaller: bool) -> Self {
        self.ccitt_only_if_smaller = only_if_smaller;
        self
    }
}

/// Decoded image ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// Uncompressed pixel planes
    Bitmap(ImageDataBitmap),
    /// JPEG pass-through
    Dct(ImageDataDct),
}

impl ImageData {
    /// The bitmap variant, if this is one.
    pub fn as_bitmap(&self) -> Option<&ImageDataBitmap> {
        match self {
            ImageData::Bitmap(bitmap) => Some(bitmap),
            ImageData::Dct(_) => None,
        }
    }

    /// The DCT variant, if this is one.
    pub fn as_dct(&self) -> Option<&ImageDataDct> {
        match self {
            ImageData::Dct(dct) => Some(dct),
            ImageData::Bitmap(_) => None,
        }
    }

    /// Primary data bytes of either variant.
    pub fn data(&self) -> &[u8] {
        match self {
            ImageData::Bitmap(bitmap) => &bitmap.data,
            ImageData::Dct(dct) => &dct.data,
        }
    }
}

/// JPEG data embedded as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDataDct {
    /// The complete JPEG file
    pub data: Vec<u8>,
    /// Number of color components in the frame
    pub components: u8,
    /// Four-component data written with Adobe's inverted CMYK convention
    pub inverted_cmyk: bool,
}

/// Color layout of a bitmap plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapColor {
    /// One gray sample per pixel
    Gray,
    /// Three samples per pixel, R G B
    Rgb,
    /// Palette indices; the palette is in [`ImageDataBitmap::palette`]
    Indexed,
}

impl BitmapColor {
    /// Samples per pixel in the data plane.
    pub fn components(&self) -> u8 {
        match self {
            BitmapColor::Gray | BitmapColor::Indexed => 1,
            BitmapColor::Rgb => 3,
        }
    }
}

/// Transparency attached to a bitmap.
///
/// A source either has no visible transparency (no value at all), binary
/// transparency expressible as a stencil mask, or real alpha blending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transparency {
    /// 1 bit per pixel, rows byte-aligned, MSB first; bit 1 marks a transparent pixel
    Mask(Vec<u8>),
    /// One alpha byte per pixel (0 = transparent, 255 = opaque)
    Alpha(Vec<u8>),
}

/// CCITT encoded alternative for a bilevel plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaxData {
    /// Encoded stream
    pub data: Vec<u8>,
    /// CCITT K parameter (-1 for Group 4)
    pub k: i32,
}

/// Uncompressed bitmap planes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDataBitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel plane, top row first, each row byte-aligned
    pub data: Vec<u8>,
    /// Bits per sample in `data` (1, 4 or 8)
    pub bits_per_component: u8,
    /// Meaning of the samples in `data`
    pub color: BitmapColor,
    /// RGB triples for indexed data
    pub palette: Option<Vec<u8>>,
    /// Data holds gray values
    pub is_gray: bool,
    /// 0: not bitonal, 1: black on white (index 0 black), -1: white on black (index 0 white)
    pub is_bitonal: i8,
    /// Optional CCITT alternative to `data`
    pub fax: Option<FaxData>,
    /// Optional transparency
    pub transparency: Option<Transparency>,
    /// Transparency was derived from a color key rather than alpha samples
    pub segmented_color_mask: bool,
}

impl ImageDataBitmap {
    /// Create a bitmap with no palette, fax data or transparency.
    pub fn new(width: u32, height: u32, color: BitmapColor, bits_per_component: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            bits_per_component,
            color,
            palette: None,
            is_gray: color == BitmapColor::Gray,
            is_bitonal: 0,
            fax: None,
            transparency: None,
            segmented_color_mask: false,
        }
    }

    /// Per-pixel alpha plane, when the image needs real alpha blending.
    pub fn alpha_mask(&self) -> Option<&[u8]> {
        match &self.transparency {
            Some(Transparency::Alpha(alpha)) => Some(alpha),
            _ => None,
        }
    }

    /// 1-bit stencil mask, when transparency is binary.
    pub fn bitmap_mask(&self) -> Option<&[u8]> {
        match &self.transparency {
            Some(Transparency::Mask(mask)) => Some(mask),
            _ => None,
        }
    }

    /// Bytes per row of the data plane.
    pub fn stride(&self) -> usize {
        (self.width as usize * self.color.components() as usize * self.bits_per_component as usize)
            .div_ceil(8)
    }

    /// Number of palette entries.
    pub fn palette_len(&self) -> usize {
        self.palette.as_ref().map(|p| p.len() / 3).unwrap_or(0)
    }
}
