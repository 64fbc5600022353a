//! JPEG detection.
//!
//! JPEG data is never decoded: PDF embeds it with the DCTDecode filter, so the
//! detector only walks the marker segments to find the frame size, the
//! component count and the density, and conversion returns the bytes as-is.

use std::sync::Arc;

use super::image_data::ImageDataDct;
use super::imported::{ImagePrivateData, ImportedImage};
use super::information::{ImageFormat, ImageInformation};
use super::stream_reader::StreamReaderHelper;
use super::ImageDetector;

const SOI: u16 = 0xFFD8;
const EOI: u16 = 0xFFD9;
const SOS: u16 = 0xFFDA;
const APP0: u16 = 0xFFE0;
const APP1: u16 = 0xFFE1;
const APP2: u16 = 0xFFE2;
const APP13: u16 = 0xFFED;
const APP14: u16 = 0xFFEE;

/// JPEG source bytes.
#[derive(Debug, Clone)]
pub struct JpegPrivateData {
    data: Arc<[u8]>,
    components: u8,
    adobe: bool,
}

impl JpegPrivateData {
    /// The complete JPEG stream.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of components in the first scan.
    pub fn components(&self) -> u8 {
        self.components
    }

    pub(crate) fn prepare(&self) -> ImageDataDct {
        ImageDataDct {
            data: self.data.to_vec(),
            components: self.components,
            inverted_cmyk: self.components == 4 && self.adobe,
        }
    }
}

/// Detector for JFIF, Exif, ICC and Photoshop flavored JPEG files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegImporter;

impl JpegImporter {
    /// Create the detector.
    pub fn new() -> Self {
        Self
    }
}

impl ImageDetector for JpegImporter {
    fn name(&self) -> &'static str {
        "JPEG"
    }

    fn import_image(&self, stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
        let start = stream.current_offset();
        let image = detect_jpeg(stream);
        stream.set_current_offset(start);
        if image.is_none() {
            log::trace!("JPEG: not recognized");
        }
        image
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    precision: u8,
    height: u16,
    width: u16,
}

#[derive(Debug, Clone, Copy)]
struct Density {
    units: u8,
    x: u16,
    y: u16,
}

fn is_sof(marker: u16) -> bool {
    matches!(marker, 0xFFC0..=0xFFC3 | 0xFFC9..=0xFFCB)
}

/// Step over the segment at the current offset.
///
/// Standalone markers have no length field. Returns `false` when the length is
/// invalid or the next segment would start past the end of the buffer.
fn move_to_next_header(stream: &mut StreamReaderHelper) -> bool {
    let marker = stream.get_word(0, true);
    if marker == 0xFF01 || (0xFFD0..=0xFFD7).contains(&marker) {
        stream.advance(2);
        return stream.remaining() > 0;
    }
    let length = stream.get_word(2, true) as usize;
    if length < 2 {
        return false;
    }
    stream.advance(2 + length);
    stream.remaining() > 0
}

fn detect_jpeg(stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
    if stream.get_word(0, true) != SOI {
        return None;
    }
    stream.set_current_offset(2);

    let mut recognized_flavor = false;
    let mut adobe = false;
    let mut frame: Option<Frame> = None;
    let mut scan_components: Option<u8> = None;
    let mut density: Option<Density> = None;

    loop {
        if stream.remaining() < 2 {
            return None;
        }
        let marker = stream.get_word(0, true);
        if marker & 0xFF00 != 0xFF00 {
            log::debug!("JPEG: expected marker at offset {}, found {:04X}", stream.current_offset(), marker);
            return None;
        }
        if marker == 0xFFFF {
            // Fill byte before a marker.
            stream.advance(1);
            continue;
        }
        log::trace!("JPEG: segment {:04X} at offset {}", marker, stream.current_offset());

        match marker {
            EOI => break,
            APP0 => {
                if stream.matches(4, b"JFIF\0") {
                    recognized_flavor = true;
                    density = Some(Density {
                        units: stream.get_byte(11),
                        x: stream.get_word(12, true),
                        y: stream.get_word(14, true),
                    });
                }
            },
            APP1 => recognized_flavor |= stream.matches(4, b"Exif\0"),
            APP2 => recognized_flavor |= stream.matches(4, b"ICC_PROFILE\0"),
            APP13 => {
                recognized_flavor |= stream.matches(4, b"Photoshop 3.0\0") && stream.matches(18, b"8BIM")
            },
            APP14 => adobe |= stream.matches(4, b"Adobe"),
            SOS => scan_components = Some(stream.get_byte(4)),
            m if is_sof(m) => {
                frame = Some(Frame {
                    precision: stream.get_byte(4),
                    height: stream.get_word(5, true),
                    width: stream.get_word(7, true),
                });
            },
            _ => {},
        }

        if frame.is_some() && scan_components.is_some() {
            break;
        }
        if !move_to_next_header(stream) {
            return None;
        }
    }

    if !recognized_flavor {
        log::debug!("JPEG: no JFIF, Exif, ICC or Photoshop segment");
        return None;
    }
    let frame = frame?;
    let components = scan_components?;
    let image_format = match components {
        1 => ImageFormat::JpegGray,
        3 => ImageFormat::Jpeg,
        4 if adobe => ImageFormat::JpegCmyk,
        4 => ImageFormat::JpegRgbw,
        n => {
            log::debug!("JPEG: invalid component count {}", n);
            return None;
        },
    };
    if frame.width == 0 || frame.height == 0 {
        return None;
    }

    let mut information = ImageInformation {
        image_format,
        width: frame.width as u32,
        height: frame.height as u32,
        bit_count: frame.precision as u32 * components as u32,
        default_dpi: 72.0,
        ..Default::default()
    };
    if let Some(density) = density.filter(|d| d.x > 0 && d.y > 0) {
        match density.units {
            1 => {
                information.horizontal_dpi = density.x as f64;
                information.vertical_dpi = density.y as f64;
            },
            2 => {
                information.horizontal_dpm = density.x as f64 * 100.0;
                information.vertical_dpm = density.y as f64 * 100.0;
            },
            _ => {
                information.horizontal_aspect_ratio = density.x as f64;
                information.vertical_aspect_ratio = density.y as f64;
            },
        }
    }

    log::debug!(
        "JPEG: {}x{} {:?}, {} components",
        information.width,
        information.height,
        image_format,
        components
    );

    let private_data = JpegPrivateData {
        data: stream.shared_data(),
        components,
        adobe,
    };
    Some(ImportedImage::new(information, ImagePrivateData::Jpeg(private_data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::image_data::{ImageData, ImageDataOptions};

    fn segment(marker: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = marker.to_be_bytes().to_vec();
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn jfif(units: u8, x: u16, y: u16) -> Vec<u8> {
        let mut payload = b"JFIF\0\x01\x02".to_vec();
        payload.push(units);
        payload.extend_from_slice(&x.to_be_bytes());
        payload.extend_from_slice(&y.to_be_bytes());
        payload.extend_from_slice(&[0, 0]);
        segment(APP0, &payload)
    }

    fn build_jpeg(width: u16, height: u16, components: u8, app: &[Vec<u8>]) -> Vec<u8> {
        let mut out = SOI.to_be_bytes().to_vec();
        for segment in app {
            out.extend_from_slice(segment);
        }
        let mut sof = vec![8];
        sof.extend_from_slice(&height.to_be_bytes());
        sof.extend_from_slice(&width.to_be_bytes());
        sof.push(components);
        for c in 0..components {
            sof.extend_from_slice(&[c + 1, 0x11, 0]);
        }
        out.extend_from_slice(&segment(0xFFC0, &sof));
        let mut sos = vec![components];
        for c in 0..components {
            sos.extend_from_slice(&[c + 1, 0]);
        }
        sos.extend_from_slice(&[0, 63, 0]);
        out.extend_from_slice(&segment(SOS, &sos));
        out.extend_from_slice(&[0x12, 0x34, 0x56]);
        out.extend_from_slice(&EOI.to_be_bytes());
        out
    }

    fn import(data: &[u8]) -> Option<ImportedImage> {
        JpegImporter.import_image(&mut StreamReaderHelper::new(data))
    }

    #[test]
    fn test_jfif_dimensions_and_density() {
        let data = build_jpeg(37, 19, 3, &[jfif(1, 300, 150)]);
        let image = import(&data).unwrap();
        let info = image.information();
        assert_eq!((info.width, info.height), (37, 19));
        assert_eq!(info.image_format, ImageFormat::Jpeg);
        assert_eq!(info.horizontal_dpi, 300.0);
        assert_eq!(info.vertical_dpi, 150.0);
        assert_eq!(info.bit_count, 24);
    }

    #[test]
    fn test_density_in_dots_per_cm() {
        let data = build_jpeg(8, 8, 1, &[jfif(2, 40, 40)]);
        let info = import(&data).unwrap().information().clone();
        assert_eq!(info.image_format, ImageFormat::JpegGray);
        assert_eq!(info.horizontal_dpm, 4000.0);
        assert_eq!(info.horizontal_dpi, 0.0);
    }

    #[test]
    fn test_density_aspect_ratio_only() {
        let data = build_jpeg(8, 8, 3, &[jfif(0, 2, 1)]);
        let info = import(&data).unwrap().information().clone();
        assert_eq!(info.horizontal_aspect_ratio, 2.0);
        assert_eq!(info.vertical_aspect_ratio, 1.0);
        assert_eq!(info.horizontal_dpi, 0.0);
    }

    #[test]
    fn test_exif_icc_and_photoshop_flavors() {
        let exif = segment(APP1, b"Exif\0\0MM\0*");
        assert!(import(&build_jpeg(4, 4, 3, &[exif])).is_some());

        let icc = segment(APP2, b"ICC_PROFILE\0\x01\x01");
        assert!(import(&build_jpeg(4, 4, 3, &[icc])).is_some());

        let photoshop = segment(APP13, b"Photoshop 3.0\08BIM\x04\x04");
        assert!(import(&build_jpeg(4, 4, 3, &[photoshop])).is_some());
    }

    #[test]
    fn test_plain_jpeg_without_flavor_is_rejected() {
        let data = build_jpeg(4, 4, 3, &[]);
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_component_counts() {
        let adobe = segment(APP14, b"Adobe\0\x64\0\0\0\0\x02");
        let cmyk = build_jpeg(4, 4, 4, &[jfif(0, 1, 1), adobe]);
        assert_eq!(import(&cmyk).unwrap().information().image_format, ImageFormat::JpegCmyk);

        let rgbw = build_jpeg(4, 4, 4, &[jfif(0, 1, 1)]);
        assert_eq!(import(&rgbw).unwrap().information().image_format, ImageFormat::JpegRgbw);

        let two = build_jpeg(4, 4, 2, &[jfif(0, 1, 1)]);
        assert!(import(&two).is_none());
    }

    #[test]
    fn test_standalone_markers_are_skipped() {
        let mut data = SOI.to_be_bytes().to_vec();
        data.extend_from_slice(&jfif(1, 72, 72));
        data.extend_from_slice(&[0xFF, 0xD0]); // RST0, no length
        data.extend_from_slice(&build_jpeg(5, 6, 1, &[])[2..]);
        let image = import(&data).unwrap();
        assert_eq!((image.width(), image.height()), (5, 6));
    }

    #[test]
    fn test_eoi_before_frame_is_rejected() {
        let mut data = SOI.to_be_bytes().to_vec();
        data.extend_from_slice(&jfif(1, 72, 72));
        data.extend_from_slice(&EOI.to_be_bytes());
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_truncated_segment_is_rejected() {
        let data = build_jpeg(4, 4, 3, &[jfif(1, 72, 72)]);
        assert!(import(&data[..24]).is_none());
    }

    #[test]
    fn test_failed_detection_leaves_cursor_alone() {
        let data = build_jpeg(4, 4, 3, &[]);
        let mut stream = StreamReaderHelper::new(&data);
        assert!(JpegImporter.import_image(&mut stream).is_none());
        assert_eq!(stream.current_offset(), 0);
    }

    #[test]
    fn test_invalid_segment_length_is_rejected() {
        let mut data = SOI.to_be_bytes().to_vec();
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x01]);
        data.extend_from_slice(&build_jpeg(4, 4, 3, &[])[2..]);
        assert!(import(&data).is_none());
    }

    #[test]
    fn test_prepare_passes_bytes_through() {
        let data = build_jpeg(4, 4, 3, &[jfif(1, 72, 72)]);
        let image = import(&data).unwrap();
        match image.prepare_image_data(&ImageDataOptions::new()).unwrap() {
            ImageData::Dct(dct) => {
                assert_eq!(dct.data, data);
                assert_eq!(dct.components, 3);
                assert!(!dct.inverted_cmyk);
            },
            other => panic!("expected DCT data, got {:?}", other),
        }
    }
}
