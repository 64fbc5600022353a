//! Image import for PDF generation.
//!
//! This module recognizes BMP, JPEG and PNG files and converts them into the
//! canonical planes a PDF image XObject needs.
//!
//! ## Architecture
//!
//! ```text
//! bytes / Read + Seek
//!     ↓
//! [ImageImporter] (length check, one detector at a time)
//!     ↓
//! [ImageDetector] (JPEG → PNG → BMP, header parsing only)
//!     ↓
//! [ImportedImage] (ImageInformation + undecoded source)
//!     ↓  prepare_image_data()
//! [ImageData] (Dct passthrough or Bitmap planes + masks + optional CCITT G4)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use pdf_assets::images::{ImageDataOptions, ImageImporter};
//!
//! let importer = ImageImporter::new();
//! if let Some(image) = importer.import_image_from_file("photo.png")? {
//!     println!("{}x{}", image.width(), image.height());
//!     let data = image.prepare_image_data(&ImageDataOptions::new())?;
//! }
//! ```

mod bitmap;
mod bmp;
mod ccitt;
mod image_data;
mod imported;
mod information;
mod jpeg;
mod png;
mod stream_reader;

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

pub use bmp::{BmpImporter, BmpPrivateData};
pub use ccitt::{encode_group4, GROUP_4_K};
pub use image_data::{
    BitmapColor, FaxData, ImageData, ImageDataBitmap, ImageDataDct, ImageDataOptions, Transparency,
};
pub use imported::{ImagePrivateData, ImportedImage};
pub use information::{ImageFormat, ImageInformation};
pub use jpeg::{JpegImporter, JpegPrivateData};
pub use png::{PngImporter, PngPrivateData};
pub use stream_reader::StreamReaderHelper;

use crate::error::{Error, Result};

/// Recognizes one image format from its header bytes.
///
/// Implementations must not fail loudly: anything that is not their format,
/// including truncated or inconsistent headers, yields `None`. The reader is
/// reset by the caller before each detector runs.
pub trait ImageDetector: Send + Sync {
    /// Short format name used in log output.
    fn name(&self) -> &'static str;

    /// Parse the header at the start of `stream`.
    fn import_image(&self, stream: &mut StreamReaderHelper) -> Option<ImportedImage>;
}

/// Largest accepted image stream, in bytes.
pub const DEFAULT_MAX_STREAM_LENGTH: u64 = i32::MAX as u64;

/// Options for [`ImageImporter`].
#[derive(Debug, Clone)]
pub struct ImageImportOptions {
    /// Streams longer than this are rejected before any byte is read.
    pub max_stream_length: u64,

    /// Register the JPEG detector.
    pub jpeg: bool,

    /// Register the PNG detector.
    pub png: bool,

    /// Register the BMP detector.
    pub bmp: bool,
}

impl Default for ImageImportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageImportOptions {
    /// All detectors enabled, `i32::MAX` byte limit.
    pub fn new() -> Self {
        Self {
            max_stream_length: DEFAULT_MAX_STREAM_LENGTH,
            jpeg: true,
            png: true,
            bmp: true,
        }
    }

    /// Set the stream length limit.
    pub fn with_max_stream_length(mut self, max: u64) -> Self {
        self.max_stream_length = max;
        self
    }

    /// Enable or disable JPEG recognition.
    pub fn with_jpeg(mut self, enable: bool) -> Self {
        self.jpeg = enable;
        self
    }

    /// Enable or disable PNG recognition.
    pub fn with_png(mut self, enable: bool) -> Self {
        self.png = enable;
        self
    }

    /// Enable or disable BMP recognition.
    pub fn with_bmp(mut self, enable: bool) -> Self {
        self.bmp = enable;
        self
    }
}

/// Runs the registered detectors over an image stream.
pub struct ImageImporter {
    detectors: Vec<Box<dyn ImageDetector>>,
    max_stream_length: u64,
}

impl std::fmt::Debug for ImageImporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageImporter")
            .field("detectors", &self.detectors.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("max_stream_length", &self.max_stream_length)
            .finish()
    }
}

impl Default for ImageImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageImporter {
    /// Importer with the JPEG, PNG and BMP detectors.
    pub fn new() -> Self {
        Self::with_options(ImageImportOptions::new())
    }

    /// Importer with the detectors enabled in `options`.
    pub fn with_options(options: ImageImportOptions) -> Self {
        let mut detectors: Vec<Box<dyn ImageDetector>> = Vec::new();
        if options.jpeg {
            detectors.push(Box::new(JpegImporter::new()));
        }
        if options.png {
            detectors.push(Box::new(PngImporter::new()));
        }
        if options.bmp {
            detectors.push(Box::new(BmpImporter::new()));
        }
        Self {
            detectors,
            max_stream_length: options.max_stream_length,
        }
    }

    /// Append a detector; it runs after the built-in ones.
    pub fn register(&mut self, detector: Box<dyn ImageDetector>) {
        self.detectors.push(detector);
    }

    /// Names of the registered detectors in probing order.
    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Import an in-memory image.
    ///
    /// Returns `Ok(None)` when no detector recognizes the data.
    pub fn import_image(&self, data: &[u8]) -> Result<Option<ImportedImage>> {
        self.check_length(data.len() as u64)?;
        Ok(self.detect(StreamReaderHelper::new(data)))
    }

    /// Import an image from a seekable stream, starting at its current position.
    ///
    /// The remaining length is taken from the stream by seeking; a stream longer than
    /// the configured limit fails with [`Error::ImageTooLarge`] before any byte is read.
    pub fn import_image_from_stream<R: Read + Seek>(&self, reader: &mut R) -> Result<Option<ImportedImage>> {
        let stream = match stream_length(reader) {
            Some(length) => {
                self.check_length(length)?;
                StreamReaderHelper::from_reader(reader, length as usize)?
            },
            None => {
                log::debug!("Stream length unknown, reading with a {} byte cap", self.max_stream_length);
                let mut buffer = Vec::new();
                reader
                    .take(self.max_stream_length.saturating_add(1))
                    .read_to_end(&mut buffer)?;
                self.check_length(buffer.len() as u64)?;
                StreamReaderHelper::from_shared(buffer.into())
            },
        };
        Ok(self.detect(stream))
    }

    /// Import an image file.
    pub fn import_image_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Option<ImportedImage>> {
        let mut file = std::fs::File::open(path.as_ref())?;
        self.import_image_from_stream(&mut file)
    }

    fn check_length(&self, length: u64) -> Result<()> {
        if length > self.max_stream_length {
            return Err(Error::ImageTooLarge {
                length,
                max: self.max_stream_length,
            });
        }
        Ok(())
    }

    fn detect(&self, mut stream: StreamReaderHelper) -> Option<ImportedImage> {
        for detector in &self.detectors {
            stream.reset();
            if let Some(image) = detector.import_image(&mut stream) {
                log::debug!(
                    "{} detector recognized a {}x{} image",
                    detector.name(),
                    image.width(),
                    image.height()
                );
                return Some(image);
            }
        }
        log::debug!("No detector recognized the image ({} bytes)", stream.len());
        None
    }
}

/// Bytes between the current position and the end, restoring the position.
fn stream_length<S: Seek>(stream: &mut S) -> Option<u64> {
    let start = stream.stream_position().ok()?;
    let end = stream.seek(SeekFrom::End(0)).ok()?;
    stream.seek(SeekFrom::Start(start)).ok()?;
    Some(end.saturating_sub(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct NeverImporter;

    impl ImageDetector for NeverImporter {
        fn name(&self) -> &'static str {
            "NEVER"
        }

        fn import_image(&self, stream: &mut StreamReaderHelper) -> Option<ImportedImage> {
            stream.advance(5);
            None
        }
    }

    fn tiny_bmp() -> Vec<u8> {
        // 1x1 24-bit bitmap, one padded row
        let mut data = vec![0u8; 58];
        data[0..2].copy_from_slice(b"BM");
        data[2..6].copy_from_slice(&58u32.to_le_bytes());
        data[10..14].copy_from_slice(&54u32.to_le_bytes());
        data[14..18].copy_from_slice(&40u32.to_le_bytes());
        data[18..22].copy_from_slice(&1u32.to_le_bytes());
        data[22..26].copy_from_slice(&1i32.to_le_bytes());
        data[26..28].copy_from_slice(&1u16.to_le_bytes());
        data[28..30].copy_from_slice(&24u16.to_le_bytes());
        data[54..57].copy_from_slice(&[3, 2, 1]);
        data
    }

    #[test]
    fn test_default_detector_order() {
        assert_eq!(ImageImporter::new().detector_names(), vec!["JPEG", "PNG", "BMP"]);
    }

    #[test]
    fn test_disabled_detector_is_skipped() {
        let importer = ImageImporter::with_options(ImageImportOptions::new().with_bmp(false));
        assert_eq!(importer.detector_names(), vec!["JPEG", "PNG"]);
        assert!(importer.import_image(&tiny_bmp()).unwrap().is_none());
    }

    #[test]
    fn test_reader_is_reset_between_detectors() {
        let mut importer = ImageImporter::with_options(ImageImportOptions::new().with_bmp(false));
        importer.register(Box::new(NeverImporter));
        importer.register(Box::new(BmpImporter::new()));
        let image = importer.import_image(&tiny_bmp()).unwrap().unwrap();
        assert_eq!(image.information().image_format, ImageFormat::Rgb24);
    }

    #[test]
    fn test_unknown_data_is_none() {
        let importer = ImageImporter::new();
        assert!(importer.import_image(b"GIF89a").unwrap().is_none());
        assert!(importer.import_image(&[]).unwrap().is_none());
    }

    #[test]
    fn test_in_memory_limit() {
        let importer = ImageImporter::with_options(ImageImportOptions::new().with_max_stream_length(10));
        let err = importer.import_image(&tiny_bmp()).unwrap_err();
        assert!(matches!(err, Error::ImageTooLarge { length: 58, max: 10 }));
    }

    #[test]
    fn test_stream_import_starts_at_current_position() {
        let mut data = vec![0xAA; 7];
        data.extend_from_slice(&tiny_bmp());
        let mut cursor = Cursor::new(data);
        cursor.seek(SeekFrom::Start(7)).unwrap();
        let image = ImageImporter::new().import_image_from_stream(&mut cursor).unwrap().unwrap();
        assert_eq!((image.width(), image.height()), (1, 1));
    }

    #[test]
    fn test_stream_length_restores_position() {
        let mut cursor = Cursor::new(vec![0u8; 20]);
        cursor.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(stream_length(&mut cursor), Some(16));
        assert_eq!(cursor.position(), 4);
    }
}
