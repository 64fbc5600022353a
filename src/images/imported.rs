//! Imported image handle: cheap metadata now, pixel data on request.

use super::bmp::BmpPrivateData;
use super::image_data::{ImageData, ImageDataOptions};
use super::information::ImageInformation;
use super::jpeg::JpegPrivateData;
use super::png::PngPrivateData;
use crate::error::Result;

/// Format-specific raw data kept by an [`ImportedImage`] until conversion.
#[derive(Debug, Clone)]
pub enum ImagePrivateData {
    /// Windows bitmap
    Bmp(BmpPrivateData),
    /// JPEG
    Jpeg(JpegPrivateData),
    /// PNG
    Png(PngPrivateData),
}

impl ImagePrivateData {
    /// Length of the source buffer.
    pub fn source_len(&self) -> usize {
        match self {
            ImagePrivateData::Bmp(bmp) => bmp.data().len(),
            ImagePrivateData::Jpeg(jpeg) => jpeg.data().len(),
            ImagePrivateData::Png(png) => png.data().len(),
        }
    }
}

/// An image recognized by one of the detectors.
///
/// Holds the parsed [`ImageInformation`] and the undecoded source bytes.
/// [`prepare_image_data`](Self::prepare_image_data) derives the canonical planes
/// each time it is called; cache the result if it is needed more than once.
#[derive(Debug, Clone)]
pub struct ImportedImage {
    information: ImageInformation,
    private_data: ImagePrivateData,
}

impl ImportedImage {
    pub(crate) fn new(information: ImageInformation, private_data: ImagePrivateData) -> Self {
        Self {
            information,
            private_data,
        }
    }

    /// Dimensions, format and resolution.
    pub fn information(&self) -> &ImageInformation {
        &self.information
    }

    /// Format-specific source data.
    pub fn private_data(&self) -> &ImagePrivateData {
        &self.private_data
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.information.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.information.height
    }

    /// Convert the source into canonical image data.
    ///
    /// JPEG sources yield [`ImageData::Dct`]; BMP and PNG sources yield
    /// [`ImageData::Bitmap`]. Pixel layouts without a converter fail with
    /// [`Error::NotImplemented`](crate::Error::NotImplemented).
    pub fn prepare_image_data(&self, options: &ImageDataOptions) -> Result<ImageData> {
        log::debug!(
            "Preparing {:?} image data ({}x{})",
            self.information.image_format,
            self.information.width,
            self.information.height
        );
        match &self.private_data {
            ImagePrivateData::Bmp(bmp) => bmp.prepare(&self.information, options).map(ImageData::Bitmap),
            ImagePrivateData::Jpeg(jpeg) => Ok(ImageData::Dct(jpeg.prepare())),
            ImagePrivateData::Png(png) => png.prepare(&self.information, options).map(ImageData::Bitmap),
        }
    }
}
