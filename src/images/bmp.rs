//! Windows bitmap (BMP) detection and conversion.
//!
//! Supported layouts: 1/4/8-bit palette, 24-bit BGR, 32-bit BGRX and 32-bit BGRA
//! (`BI_BITFIELDS` with an alpha mask). Run-length compressed bitmaps are not
//! recognized.

use std::sync::Arc;

use super::bitmap::{apply_ccitt, packed_stride, AlphaTracker, Palette};
use super::image_data::{BitmapColor, ImageDataBitmap, ImageDataOptions};
use super::imported::{ImagePrivateData, ImportedImage};
use super::information::{ImageFormat, ImageInformation};
use super::stream_reader::StreamReaderHelper;
use super::ImageDetector;
use crate::error::{Error, Result};

const FILE_HEADER_SIZE: usize = 14;
const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

// Channel masks as read big-endian from the file, i.e. little-endian B, G, R, A bytes.
const RED_MASK_BE: u32 = 0x0000_FF00;
const GREEN_MASK_BE: u32 = 0x00FF_0000;
const BLUE_MASK_BE: u32 = 0xFF00_0000;
const ALPHA_MASK_BE: u32 = 0x0000_00FF;

/// Bitmap source data and the header fields needed to decode it.
#[derive(Debug, Clone)]
pub struct BmpPrivateData {
    data: Arc<[u8]>,
    pixel_offset: usize,
    palette_offset: usize,
    palette_colors: u32,
    bits_per_pixel: u16,
    planes: u16,
    has_alpha: bool,
    flipped: bool,
}

impl BmpPrivateData {
    /// The complete source file.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether rows are stored top-down (negative height).
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    fn source_stride(&self, width: u32) -> usize {
        (width as usize * self.bits_per_pixel as usize).div_ceil(32) * 4
    }

    pub(crate) fn prepare(&self, info: &ImageInformation, options: &ImageDataOptions) -> Result<ImageDataBitmap> {
        if self.planes != 1 {
            return Err(Error::NotImplemented(format!("BMP with {} planes", self.planes)));
        }
        match self.bits_per_pixel {
            24 | 32 => Ok(self.copy_true_color(info)),
            1 | 4 | 8 => Ok(self.copy_indexed(info, options)),
            bits => Err(Error::NotImplemented(format!("BMP with {} bits per pixel", bits))),
        }
    }

    /// Destination row for source row `y`; bottom-up files are written in reverse.
    fn target_row(&self, y: u32, height: u32) -> u32 {
        if self.flipped {
            y
        } else {
            height - 1 - y
        }
    }

    fn copy_true_color(&self, info: &ImageInformation) -> ImageDataBitmap {
        let width = info.width;
        let height = info.height;
        let bytes_per_pixel = self.bits_per_pixel as usize / 8;
        let stride = self.source_stride(width);
        let reader = StreamReaderHelper::from_shared(Arc::clone(&self.data));

        let mut rgb = vec![0u8; width as usize * height as usize * 3];
        let mut alpha = self.has_alpha.then(|| AlphaTracker::new(width, height));

        for y in 0..height {
            let target = self.target_row(y, height) as usize;
            let mut offset_write = target * width as usize * 3;
            let mut offset_read = self.pixel_offset + y as usize * stride;
            for x in 0..width {
                rgb[offset_write] = reader.get_byte(offset_read + 2);
                rgb[offset_write + 1] = reader.get_byte(offset_read + 1);
                rgb[offset_write + 2] = reader.get_byte(offset_read);
                offset_write += 3;
                offset_read += bytes_per_pixel;
                if let Some(tracker) = alpha.as_mut() {
                    // Expected BGRA, but found ARGB: the alpha sample is the byte
                    // just before the advanced read position.
                    tracker.set(x, target as u32, reader.get_byte(offset_read - 1));
                }
            }
        }

        let mut bitmap = ImageDataBitmap::new(width, height, BitmapColor::Rgb, 8, rgb);
        if let Some(tracker) = alpha {
            if !tracker.alpha_used() {
                log::debug!("BMP alpha channel is fully opaque, no mask emitted");
            }
            bitmap.transparency = tracker.finish();
        }
        bitmap
    }

    fn read_palette(&self) -> Palette {
        let reader = StreamReaderHelper::from_shared(Arc::clone(&self.data));
        let mut palette = Palette::new();
        for i in 0..self.palette_colors as usize {
            let entry = self.palette_offset + 4 * i;
            // The fourth byte is reserved in BMP palettes, not alpha.
            palette.push(reader.get_byte(entry + 2), reader.get_byte(entry + 1), reader.get_byte(entry), 255);
        }
        palette
    }

    fn copy_indexed(&self, info: &ImageInformation, options: &ImageDataOptions) -> ImageDataBitmap {
        let width = info.width;
        let height = info.height;
        let bits = self.bits_per_pixel as u32;
        let source_stride = self.source_stride(width);
        let target_stride = packed_stride(width, bits);
        let palette = self.read_palette();

        let mut plane = vec![0u8; target_stride * height as usize];
        for y in 0..height {
            let target = self.target_row(y, height) as usize * target_stride;
            let source = self.pixel_offset + y as usize * source_stride;
            let row = self.data.get(source..source + target_stride).unwrap_or_default();
            plane[target..target + row.len()].copy_from_slice(row);
        }

        if bits == 8 && palette.is_identity_gray_ramp() {
            return ImageDataBitmap::new(width, height, BitmapColor::Gray, 8, plane);
        }

        let mut bitmap = ImageDataBitmap::new(width, height, BitmapColor::Indexed, bits as u8, plane);
        bitmap.palette = Some(palette.rgb_table());
        if bits == 1 {
            bitmap.is_bitonal = palette.bitonal();
        }
        apply_ccitt(&mut bitmap, options);
        bitmap
    }
}

/// Detector for Windows bitmaps.
#[derive(Debug, Default, Clone, Copy)]
pub struct BmpImporter;

impl BmpImporter {
    /// Create the detector.
    pub fn new() -> Self {
        Self
    }
}

impl ImageDetector for BmpImporter {
    fn name(&self) -> &'static str {
        "BMP"
    }

    fn import_image(&self, stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
        let start = stream.current_offset();
        let image = detect_bmp(stream);
        stream.set_current_offset(start);
        if image.is_none() {
            log::trace!("BMP: not recognized");
        }
        image
    }
}

fn detect_bmp(stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
    // BITMAPFILEHEADER
    if stream.get_word(0, false) != 0x4D42 {
        return None;
    }
    let file_size = stream.get_dword(2, false) as usize;
    if file_size < stream.len() {
        log::debug!("BMP: declared file size {} below stream length {}", file_size, stream.len());
        return None;
    }
    let pixel_offset = stream.get_dword(10, false) as usize;

    // BITMAPINFOHEADER / V4 / V5
    stream.set_current_offset(FILE_HEADER_SIZE);
    let header_size = stream.get_dword(0, false);
    if !matches!(header_size, 40 | 108 | 124) {
        log::debug!("BMP: unsupported info header size {}", header_size);
        return None;
    }
    let width = stream.get_dword(4, false);
    let raw_height = stream.get_dword(8, false) as i32;
    let planes = stream.get_word(12, false);
    let bits_per_pixel = stream.get_word(14, false);
    let compression = stream.get_dword(16, false);
    let x_pels_per_meter = stream.get_dword(24, false) as i32;
    let y_pels_per_meter = stream.get_dword(28, false) as i32;
    let colors_used = stream.get_dword(32, false);

    if width == 0 || raw_height == 0 || raw_height == i32::MIN {
        return None;
    }
    let height = raw_height.unsigned_abs();
    let flipped = raw_height < 0;

    let mut has_alpha = false;
    let image_format = match (bits_per_pixel, compression) {
        (24, BI_RGB) => ImageFormat::Rgb24,
        (32, BI_RGB) => ImageFormat::Rgb24,
        (32, BI_BITFIELDS) => {
            let red = stream.get_dword(40, true);
            let green = stream.get_dword(44, true);
            let blue = stream.get_dword(48, true);
            // Only V4/V5 headers carry an alpha mask.
            let alpha = if header_size >= 108 {
                stream.get_dword(52, true)
            } else {
                0
            };
            if red != RED_MASK_BE || green != GREEN_MASK_BE || blue != BLUE_MASK_BE {
                log::debug!(
                    "BMP: unsupported channel masks {:08X}/{:08X}/{:08X}",
                    red,
                    green,
                    blue
                );
                return None;
            }
            if alpha == ALPHA_MASK_BE {
                has_alpha = true;
                ImageFormat::Argb32
            } else {
                ImageFormat::Rgb24
            }
        },
        (8, BI_RGB) => ImageFormat::Palette8,
        (4, BI_RGB) => ImageFormat::Palette4,
        (1, BI_RGB) => ImageFormat::Palette1,
        (_, BI_RGB) | (16, BI_BITFIELDS) => ImageFormat::Undefined,
        (_, other) => {
            log::debug!("BMP: compression {} not supported", other);
            return None;
        },
    };

    let palette_colors = if image_format.is_indexed() {
        let max_colors = 1u32 << bits_per_pixel;
        match colors_used {
            0 => max_colors,
            n if n <= max_colors => n,
            _ => return None,
        }
    } else {
        0
    };
    let palette_offset = FILE_HEADER_SIZE + header_size as usize;
    if palette_offset + 4 * palette_colors as usize > stream.len() {
        return None;
    }

    // The pixel array must be present in full.
    let stride = (width as u64 * bits_per_pixel as u64).div_ceil(32) * 4;
    let required = pixel_offset as u64 + stride * height as u64;
    if pixel_offset < palette_offset || required > stream.len() as u64 {
        log::debug!("BMP: pixel data truncated ({} bytes needed, {} available)", required, stream.len());
        return None;
    }

    let mut information = ImageInformation {
        image_format,
        width,
        height,
        bit_count: bits_per_pixel as u32,
        colors_used: palette_colors,
        default_dpi: 96.0,
        ..Default::default()
    };
    if x_pels_per_meter > 0 && y_pels_per_meter > 0 {
        information.horizontal_dpm = x_pels_per_meter as f64;
        information.vertical_dpm = y_pels_per_meter as f64;
    }

    log::debug!(
        "BMP: {}x{} {:?}, {} bpp, flipped={}",
        width,
        height,
        image_format,
        bits_per_pixel,
        flipped
    );

    let private_data = BmpPrivateData {
        data: stream.shared_data(),
        pixel_offset,
        palette_offset,
        palette_colors,
        bits_per_pixel,
        planes,
        has_alpha,
        flipped,
    };
    Some(ImportedImage::new(information, ImagePrivateData::Bmp(private_data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::image_data::Transparency;

    /// Build a BMP with a 40, 108 or 124 byte info header. `rows` are unpadded and in file order.
    fn build_bmp(
        width: u32,
        height: i32,
        bits: u16,
        compression: u32,
        header_size: u32,
        palette: &[[u8; 4]],
        rows: &[Vec<u8>],
    ) -> Vec<u8> {
        let stride = (width as usize * bits as usize).div_ceil(32) * 4;
        let pixel_offset = 14 + header_size as usize + palette.len() * 4;
        let file_size = pixel_offset + stride * rows.len();

        let mut out = Vec::new();
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(file_size as u32).to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&(pixel_offset as u32).to_le_bytes());

        let mut header = vec![0u8; header_size as usize];
        header[0..4].copy_from_slice(&header_size.to_le_bytes());
        header[4..8].copy_from_slice(&width.to_le_bytes());
        header[8..12].copy_from_slice(&height.to_le_bytes());
        header[12..14].copy_from_slice(&1u16.to_le_bytes());
        header[14..16].copy_from_slice(&bits.to_le_bytes());
        header[16..20].copy_from_slice(&compression.to_le_bytes());
        header[24..28].copy_from_slice(&3780u32.to_le_bytes());
        header[28..32].copy_from_slice(&3780u32.to_le_bytes());
        header[32..36].copy_from_slice(&(palette.len() as u32).to_le_bytes());
        if header_size >= 108 && compression == BI_BITFIELDS {
            header[40..44].copy_from_slice(&0x00FF_0000u32.to_le_bytes());
            header[44..48].copy_from_slice(&0x0000_FF00u32.to_le_bytes());
            header[48..52].copy_from_slice(&0x0000_00FFu32.to_le_bytes());
            header[52..56].copy_from_slice(&0xFF00_0000u32.to_le_bytes());
        }
        out.extend_from_slice(&header);

        for entry in palette {
            out.extend_from_slice(entry);
        }
        for row in rows {
            let mut padded = row.clone();
            padded.resize(stride, 0);
            out.extend_from_slice(&padded);
        }
        out
    }

    fn import(data: &[u8]) -> Option<ImportedImage> {
        BmpImporter.import_image(&mut StreamReaderHelper::new(data))
    }

    fn bitmap(image: &ImportedImage) -> ImageDataBitmap {
        image
            .prepare_image_data(&ImageDataOptions::new())
            .unwrap()
            .as_bitmap()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_rgb24_dimensions_and_row_order() {
        // 2x2, bottom-up: first file row is the bottom row.
        let rows = vec![
            vec![255, 0, 0, 0, 255, 0],  // blue, green
            vec![0, 0, 255, 255, 255, 255], // red, white
        ];
        let data = build_bmp(2, 2, 24, BI_RGB, 40, &[], &rows);
        let image = import(&data).unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Rgb24);
        assert_eq!(image.information().horizontal_dpm, 3780.0);

        let bitmap = bitmap(&image);
        assert_eq!(bitmap.color, BitmapColor::Rgb);
        assert_eq!(
            bitmap.data,
            vec![255, 0, 0, 255, 255, 255, 0, 0, 255, 0, 255, 0]
        );
        assert!(bitmap.transparency.is_none());
    }

    #[test]
    fn test_top_down_rows_are_kept() {
        let rows = vec![vec![0, 0, 255], vec![255, 0, 0]];
        let data = build_bmp(1, -2, 24, BI_RGB, 40, &[], &rows);
        let image = import(&data).unwrap();
        assert_eq!(image.height(), 2);
        let bitmap = bitmap(&image);
        assert_eq!(bitmap.data, vec![255, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_argb32_opaque_has_no_mask() {
        let rows = vec![vec![10, 20, 30, 255, 40, 50, 60, 255]; 3];
        let data = build_bmp(2, 3, 32, BI_BITFIELDS, 108, &[], &rows);
        let image = import(&data).unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Argb32);
        let bitmap = bitmap(&image);
        assert!(bitmap.alpha_mask().is_none());
        assert!(bitmap.bitmap_mask().is_none());
        assert_eq!(&bitmap.data[0..6], &[30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn test_argb32_partial_alpha_keeps_alpha_plane() {
        let rows = vec![vec![0, 0, 0, 128, 0, 0, 0, 255]];
        let data = build_bmp(2, 1, 32, BI_BITFIELDS, 108, &[], &rows);
        let bitmap = bitmap(&import(&data).unwrap());
        assert_eq!(bitmap.transparency, Some(Transparency::Alpha(vec![128, 255])));
    }

    #[test]
    fn test_argb32_binary_alpha_becomes_mask() {
        let rows = vec![vec![0, 0, 0, 0, 0, 0, 0, 255]];
        let data = build_bmp(2, 1, 32, BI_BITFIELDS, 108, &[], &rows);
        let bitmap = bitmap(&import(&data).unwrap());
        assert_eq!(bitmap.bitmap_mask(), Some(&[0x80u8][..]));
    }

    #[test]
    fn test_32bit_bi_rgb_ignores_fourth_byte() {
        let rows = vec![vec![1, 2, 3, 0]];
        let data = build_bmp(1, 1, 32, BI_RGB, 40, &[], &rows);
        let image = import(&data).unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Rgb24);
        assert_eq!(image.information().bit_count, 32);
        let bitmap = bitmap(&image);
        assert_eq!(bitmap.data, vec![3, 2, 1]);
        assert!(bitmap.transparency.is_none());
    }

    #[test]
    fn test_palette1_bitonal_classification() {
        let black_white = [[0, 0, 0, 0], [255, 255, 255, 0]];
        let white_black = [[255, 255, 255, 0], [0, 0, 0, 0]];
        let red_blue = [[0, 0, 255, 0], [255, 0, 0, 0]];
        let rows = vec![vec![0b1010_0000]; 2];

        let cases: [(&[[u8; 4]], i8); 3] = [(&black_white, 1), (&white_black, -1), (&red_blue, 0)];
        for (palette, expected) in cases {
            let data = build_bmp(3, 2, 1, BI_RGB, 40, palette, &rows);
            let image = import(&data).unwrap();
            assert_eq!(image.information().image_format, ImageFormat::Palette1);
            assert_eq!(bitmap(&image).is_bitonal, expected);
        }
    }

    #[test]
    fn test_palette4_packs_nibbles_and_palette() {
        let palette = [[0, 0, 255, 0], [0, 255, 0, 0], [255, 0, 0, 0]];
        let rows = vec![vec![0x01, 0x20]];
        let data = build_bmp(3, 1, 4, BI_RGB, 40, &palette, &rows);
        let image = import(&data).unwrap();
        assert_eq!(image.information().colors_used, 3);
        let bitmap = bitmap(&image);
        assert_eq!(bitmap.bits_per_component, 4);
        assert_eq!(bitmap.data, vec![0x01, 0x20]);
        assert_eq!(bitmap.palette.as_deref(), Some(&[255, 0, 0, 0, 255, 0, 0, 0, 255][..]));
        assert_eq!(bitmap.is_bitonal, 0);
        assert!(bitmap.fax.is_none());
    }

    #[test]
    fn test_palette8_gray_ramp_becomes_gray_plane() {
        let palette: Vec<[u8; 4]> = (0..=255u8).map(|i| [i, i, i, 0]).collect();
        let rows = vec![vec![0, 128, 255]];
        let data = build_bmp(3, 1, 8, BI_RGB, 40, &palette, &rows);
        let bitmap = bitmap(&import(&data).unwrap());
        assert!(bitmap.is_gray);
        assert_eq!(bitmap.color, BitmapColor::Gray);
        assert!(bitmap.palette.is_none());
        assert_eq!(bitmap.data, vec![0, 128, 255]);
    }

    #[test]
    fn test_rejects_bad_magic_and_header_size() {
        let mut data = build_bmp(1, 1, 24, BI_RGB, 40, &[], &[vec![0, 0, 0]]);
        data[0] = b'X';
        assert!(import(&data).is_none());

        let mut data = build_bmp(1, 1, 24, BI_RGB, 40, &[], &[vec![0, 0, 0]]);
        data[14] = 12; // OS/2 core header
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_rejects_rle() {
        let data = build_bmp(1, 1, 8, 1, 40, &[[0, 0, 0, 0]], &[vec![0]]);
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_rejects_file_size_below_stream_length() {
        let mut data = build_bmp(1, 1, 24, BI_RGB, 40, &[], &[vec![0, 0, 0]]);
        data[2..6].copy_from_slice(&10u32.to_le_bytes());
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_truncated_pixel_data_is_not_recognized() {
        let data = build_bmp(4, 4, 24, BI_RGB, 40, &[], &vec![vec![0; 12]; 4]);
        let truncated = &data[..data.len() - 20];
        assert!(import(truncated).is_none());
    }

    #[test]
    fn test_16bit_is_recognized_but_not_implemented() {
        let data = build_bmp(2, 1, 16, BI_RGB, 40, &[], &[vec![0; 4]]);
        let image = import(&data).unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Undefined);
        let result = image.prepare_image_data(&ImageDataOptions::new());
        assert!(matches!(result, Err(Error::NotImplemented(_))));
    }

    #[test]
    fn test_v5_header_is_recognized() {
        let rows = vec![vec![10, 20, 30, 255]];
        let data = build_bmp(1, 1, 32, BI_BITFIELDS, 124, &[], &rows);
        let image = import(&data).unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Argb32);
        assert_eq!(bitmap(&image).data, vec![30, 20, 10]);

        let data = build_bmp(2, 1, 24, BI_RGB, 124, &[], &[vec![1, 2, 3, 4, 5, 6]]);
        let image = import(&data).unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Rgb24);
        assert_eq!(bitmap(&image).data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_unknown_header_size_is_rejected() {
        let data = build_bmp(1, 1, 24, BI_RGB, 64, &[], &[vec![0, 0, 0]]);
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_argb32_alpha_follows_row_order() {
        // File rows: first row alpha 0/255, second row alpha 128/255.
        let rows = vec![vec![0, 0, 0, 0, 9, 9, 9, 255], vec![0, 0, 0, 128, 7, 7, 7, 255]];

        let top_down = build_bmp(2, -2, 32, BI_BITFIELDS, 108, &[], &rows);
        let bitmap_top_down = bitmap(&import(&top_down).unwrap());
        assert_eq!(bitmap_top_down.transparency, Some(Transparency::Alpha(vec![0, 255, 128, 255])));
        assert_eq!(&bitmap_top_down.data[3..6], &[9, 9, 9]);

        let bottom_up = build_bmp(2, 2, 32, BI_BITFIELDS, 124, &[], &rows);
        let bitmap_bottom_up = bitmap(&import(&bottom_up).unwrap());
        assert_eq!(bitmap_bottom_up.transparency, Some(Transparency::Alpha(vec![128, 255, 0, 255])));
        assert_eq!(&bitmap_bottom_up.data[3..6], &[7, 7, 7]);
    }

    #[test]
    fn test_failed_detection_leaves_cursor_alone() {
        let mut data = build_bmp(4, 4, 24, BI_RGB, 40, &[], &vec![vec![0; 12]; 4]);
        data.truncate(60);
        let mut stream = StreamReaderHelper::new(&data);
        assert!(BmpImporter.import_image(&mut stream).is_none());
        assert_eq!(stream.current_offset(), 0);
    }
}
