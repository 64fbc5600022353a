//! PNG detection and conversion.
//!
//! Header validation is done here; inflating and defiltering the IDAT stream is
//! left to the `png` crate, configured to return samples untransformed so that
//! palette images keep their packed indices.

use std::io::Cursor;
use std::sync::Arc;

use super::bitmap::{apply_ccitt, packed_stride, read_packed_index, AlphaTracker, Palette};
use super::image_data::{BitmapColor, ImageDataBitmap, ImageDataOptions};
use super::imported::{ImagePrivateData, ImportedImage};
use super::information::{ImageFormat, ImageInformation};
use super::stream_reader::StreamReaderHelper;
use super::ImageDetector;
use crate::error::{Error, Result};

/// PNG signature followed by the IHDR chunk length and tag.
const PNG_HEADER: [u8; 16] = [
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

/// PNG source bytes.
#[derive(Debug, Clone)]
pub struct PngPrivateData {
    data: Arc<[u8]>,
    color_type: u8,
    bit_depth: u8,
}

impl PngPrivateData {
    /// The complete PNG file.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// IHDR color type.
    pub fn color_type(&self) -> u8 {
        self.color_type
    }

    /// IHDR bit depth.
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub(crate) fn prepare(&self, info: &ImageInformation, options: &ImageDataOptions) -> Result<ImageDataBitmap> {
        let decoded = DecodedPng::decode(&self.data)?;
        if decoded.width != info.width || decoded.height != info.height {
            return Err(Error::Image(format!(
                "PNG frame is {}x{}, header said {}x{}",
                decoded.width, decoded.height, info.width, info.height
            )));
        }
        match (decoded.color_type, decoded.bit_depth) {
            (png::ColorType::Indexed, 1 | 4 | 8) => Ok(convert_indexed(&decoded, options)),
            (png::ColorType::Grayscale, 8) => Ok(convert_true_color(&decoded, BitmapColor::Gray)),
            (png::ColorType::GrayscaleAlpha, 8) => Ok(convert_true_color(&decoded, BitmapColor::Gray)),
            (png::ColorType::Rgb, 8) => Ok(convert_true_color(&decoded, BitmapColor::Rgb)),
            (png::ColorType::Rgba, 8) => Ok(convert_true_color(&decoded, BitmapColor::Rgb)),
            (color_type, depth) => Err(Error::NotImplemented(format!(
                "PNG {:?} with {} bits per sample",
                color_type, depth
            ))),
        }
    }
}

/// Fully decoded frame with per-pixel accessors.
struct DecodedPng {
    width: u32,
    height: u32,
    color_type: png::ColorType,
    bit_depth: u32,
    line_size: usize,
    pixels: Vec<u8>,
    palette: Vec<u8>,
    trns: Vec<u8>,
}

impl DecodedPng {
    fn decode(data: &[u8]) -> Result<Self> {
        let mut decoder = png::Decoder::new(Cursor::new(data));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder
            .read_info()
            .map_err(|e| Error::Image(format!("PNG header: {}", e)))?;
        let mut pixels = vec![0u8; reader.output_buffer_size()];
        let frame = reader
            .next_frame(&mut pixels)
            .map_err(|e| Error::Image(format!("PNG data: {}", e)))?;

        let info = reader.info();
        Ok(Self {
            width: frame.width,
            height: frame.height,
            color_type: frame.color_type,
            bit_depth: frame.bit_depth as u32,
            line_size: frame.line_size,
            pixels,
            palette: info.palette.as_ref().map(|p| p.to_vec()).unwrap_or_default(),
            trns: info.trns.as_ref().map(|t| t.to_vec()).unwrap_or_default(),
        })
    }

    fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.line_size;
        self.pixels.get(start..start + self.line_size).unwrap_or_default()
    }

    /// Palette index of an indexed pixel.
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        read_packed_index(self.row(y), x as usize, self.bit_depth)
    }

    /// Color table with tRNS alpha; entries without tRNS data are opaque.
    fn palette(&self) -> Palette {
        let mut palette = Palette::new();
        for (i, rgb) in self.palette.chunks_exact(3).enumerate() {
            palette.push(rgb[0], rgb[1], rgb[2], self.trns.get(i).copied().unwrap_or(255));
        }
        palette
    }

    /// 8-bit color key from a gray or RGB tRNS chunk.
    fn color_key(&self) -> Option<[u8; 3]> {
        // The decoder narrows 8-bit samples to one byte each; the raw chunk keeps
        // 16-bit big-endian values.
        let t = &self.trns;
        match (self.color_type, t.len()) {
            (png::ColorType::Grayscale, 1) => Some([t[0]; 3]),
            (png::ColorType::Grayscale, 2) => Some([t[1]; 3]),
            (png::ColorType::Rgb, 3) => Some([t[0], t[1], t[2]]),
            (png::ColorType::Rgb, 6) => Some([t[1], t[3], t[5]]),
            _ => None,
        }
    }

    /// RGBA value of a non-indexed pixel.
    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let row = self.row(y);
        let x = x as usize;
        let at = |i: usize| row.get(i).copied().unwrap_or(0);
        match self.color_type {
            png::ColorType::Grayscale => {
                let g = at(x);
                [g, g, g, 255]
            },
            png::ColorType::GrayscaleAlpha => {
                let g = at(2 * x);
                [g, g, g, at(2 * x + 1)]
            },
            png::ColorType::Rgb => [at(3 * x), at(3 * x + 1), at(3 * x + 2), 255],
            png::ColorType::Rgba => [at(4 * x), at(4 * x + 1), at(4 * x + 2), at(4 * x + 3)],
            png::ColorType::Indexed => {
                let index = self.pixel_index(x as u32, y);
                let p = self.palette.get(3 * index..3 * index + 3).unwrap_or(&[0, 0, 0]);
                [p[0], p[1], p[2], self.trns.get(index).copied().unwrap_or(255)]
            },
        }
    }
}

fn convert_true_color(decoded: &DecodedPng, color: BitmapColor) -> ImageDataBitmap {
    let width = decoded.width;
    let height = decoded.height;
    let components = color.components() as usize;
    let key = decoded.color_key();

    let mut plane = Vec::with_capacity(width as usize * height as usize * components);
    let mut alpha = AlphaTracker::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let [r, g, b, a] = decoded.pixel(x, y);
            if components == 1 {
                plane.push(r);
            } else {
                plane.extend_from_slice(&[r, g, b]);
            }
            let a = match key {
                Some(k) if (components == 1 && r == k[0]) || (components == 3 && [r, g, b] == k) => 0,
                _ => a,
            };
            alpha.set(x, y, a);
        }
    }

    let mut bitmap = ImageDataBitmap::new(width, height, color, 8, plane);
    if !alpha.alpha_used() {
        log::debug!("PNG: alpha never used, mask discarded");
    }
    bitmap.transparency = alpha.finish();
    bitmap.segmented_color_mask = key.is_some() && bitmap.transparency.is_some();
    bitmap
}

fn convert_indexed(decoded: &DecodedPng, options: &ImageDataOptions) -> ImageDataBitmap {
    let width = decoded.width;
    let height = decoded.height;
    let bits = decoded.bit_depth;
    let stride = packed_stride(width, bits);
    let palette = decoded.palette();

    let mut plane = Vec::with_capacity(stride * height as usize);
    for y in 0..height {
        let row = decoded.row(y);
        plane.extend_from_slice(&row[..stride.min(row.len())]);
        plane.resize((y as usize + 1) * stride, 0);
    }

    let transparency = if palette.has_transparency() {
        let mut alpha = AlphaTracker::new(width, height);
        for y in 0..height {
            for x in 0..width {
                alpha.set(x, y, palette.alpha(decoded.pixel_index(x, y)));
            }
        }
        alpha.finish()
    } else {
        None
    };

    let mut bitmap = if bits == 8 && palette.is_identity_gray_ramp() {
        ImageDataBitmap::new(width, height, BitmapColor::Gray, 8, plane)
    } else {
        let mut bitmap = ImageDataBitmap::new(width, height, BitmapColor::Indexed, bits as u8, plane);
        bitmap.palette = Some(palette.rgb_table());
        if bits == 1 {
            bitmap.is_bitonal = palette.bitonal();
        }
        bitmap
    };
    bitmap.transparency = transparency;
    if bitmap.transparency.is_none() {
        apply_ccitt(&mut bitmap, options);
    }
    bitmap
}

/// Detector for PNG files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngImporter;

impl PngImporter {
    /// Create the detector.
    pub fn new() -> Self {
        Self
    }
}

impl ImageDetector for PngImporter {
    fn name(&self) -> &'static str {
        "PNG"
    }

    fn import_image(&self, stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
        let start = stream.current_offset();
        let image = detect_png(stream);
        stream.set_current_offset(start);
        if image.is_none() {
            log::trace!("PNG: not recognized");
        }
        image
    }
}

fn detect_png(stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
    if !stream.matches(0, &PNG_HEADER) {
        return None;
    }
    let width = stream.get_dword(16, true);
    let height = stream.get_dword(20, true);
    let bit_depth = stream.get_byte(24);
    let color_type = stream.get_byte(25);
    if width == 0 || height == 0 {
        return None;
    }

    let image_format = match (color_type, bit_depth) {
        (0, 8) => ImageFormat::Grayscale8,
        (2, 8) => ImageFormat::Rgb24,
        (3, 1) => ImageFormat::Palette1,
        (3, 4) => ImageFormat::Palette4,
        (3, 8) => ImageFormat::Palette8,
        (4, 8) | (6, 8) => ImageFormat::Argb32,
        (color_type, bit_depth) => {
            log::debug!("PNG: color type {} with bit depth {} not supported", color_type, bit_depth);
            return None;
        },
    };

    // The header pass of the decoder reads every chunk before the first IDAT,
    // which is where pHYs and PLTE live.
    let mut decoder = png::Decoder::new(Cursor::new(stream.data()));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let reader = match decoder.read_info() {
        Ok(reader) => reader,
        Err(e) => {
            log::debug!("PNG: header chunks unreadable: {}", e);
            return None;
        },
    };
    let png_info = reader.info();

    let channels: u32 = match color_type {
        0 | 3 => 1,
        2 => 3,
        4 => 2,
        _ => 4,
    };
    let mut information = ImageInformation {
        image_format,
        width,
        height,
        bit_count: bit_depth as u32 * channels,
        colors_used: png_info.palette.as_ref().map(|p| (p.len() / 3) as u32).unwrap_or(0),
        default_dpi: 96.0,
        ..Default::default()
    };
    if let Some(dims) = png_info.pixel_dims.filter(|d| d.xppu > 0 && d.yppu > 0) {
        match dims.unit {
            png::Unit::Meter => {
                information.horizontal_dpm = dims.xppu as f64;
                information.vertical_dpm = dims.yppu as f64;
            },
            png::Unit::Unspecified => {
                information.horizontal_aspect_ratio = dims.xppu as f64;
                information.vertical_aspect_ratio = dims.yppu as f64;
            },
        }
    }

    log::debug!("PNG: {}x{} {:?}, bit depth {}", width, height, image_format, bit_depth);

    let private_data = PngPrivateData {
        data: stream.shared_data(),
        color_type,
        bit_depth,
    };
    Some(ImportedImage::new(information, ImagePrivateData::Png(private_data)))
}
