//! Image metadata gathered by the format detectors.

/// Logical pixel format of an imported image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// Unknown or not yet determined
    #[default]
    Undefined,
    /// JPEG, three components (YCbCr/RGB)
    Jpeg,
    /// JPEG, one component
    JpegGray,
    /// JPEG, four components without an Adobe marker
    JpegRgbw,
    /// JPEG, four components written by Adobe software (inverted CMYK)
    JpegCmyk,
    /// 1 bit per pixel, indexed
    Palette1,
    /// 4 bits per pixel, indexed
    Palette4,
    /// 8 bits per pixel, indexed
    Palette8,
    /// 8-bit grayscale
    Grayscale8,
    /// 24-bit true color
    Rgb24,
    /// 32-bit true color with alpha
    Argb32,
}

impl ImageFormat {
    /// Whether the image is embedded as DCT (JPEG) data.
    pub fn is_jpeg(&self) -> bool {
        matches!(
            self,
            ImageFormat::Jpeg | ImageFormat::JpegGray | ImageFormat::JpegRgbw | ImageFormat::JpegCmyk
        )
    }

    /// Whether the image stores palette indices.
    pub fn is_indexed(&self) -> bool {
        matches!(self, ImageFormat::Palette1 | ImageFormat::Palette4 | ImageFormat::Palette8)
    }
}

/// Dimensions, depth and resolution of an imported image.
///
/// At most one of the resolution groups (DPI, DPM, aspect ratio) is set; a value of 0
/// means "unknown".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInformation {
    /// Logical pixel format
    pub image_format: ImageFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Horizontal dots per inch
    pub horizontal_dpi: f64,
    /// Vertical dots per inch
    pub vertical_dpi: f64,
    /// Horizontal dots per meter
    pub horizontal_dpm: f64,
    /// Vertical dots per meter
    pub vertical_dpm: f64,
    /// Horizontal pixel aspect ratio
    pub horizontal_aspect_ratio: f64,
    /// Vertical pixel aspect ratio
    pub vertical_aspect_ratio: f64,
    /// Bits per pixel as stored in the source
    pub bit_count: u32,
    /// Palette entries in use (indexed formats)
    pub colors_used: u32,
    /// Resolution assumed when the source carries none
    pub default_dpi: f64,
}

impl ImageInformation {
    /// Whether both dimensions are known.
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Resolution in dots per inch, derived from whichever group is populated.
    pub fn effective_dpi(&self) -> (f64, f64) {
        if self.horizontal_dpi > 0.0 && self.vertical_dpi > 0.0 {
            return (self.horizontal_dpi, self.vertical_dpi);
        }
        if self.horizontal_dpm > 0.0 && self.vertical_dpm > 0.0 {
            return (self.horizontal_dpm * 0.0254, self.vertical_dpm * 0.0254);
        }
        if self.horizontal_aspect_ratio > 0.0 && self.vertical_aspect_ratio > 0.0 {
            // Keep the default resolution on the shorter axis.
            let ratio = self.horizontal_aspect_ratio / self.vertical_aspect_ratio;
            return if ratio >= 1.0 {
                (self.default_dpi * ratio, self.default_dpi)
            } else {
                (self.default_dpi, self.default_dpi / ratio)
            };
        }
        (self.default_dpi, self.default_dpi)
    }

    /// Size in points (1/72 inch) at the effective resolution.
    pub fn size_in_points(&self) -> (f64, f64) {
        let (dpi_x, dpi_y) = self.effective_dpi();
        if dpi_x <= 0.0 || dpi_y <= 0.0 {
            return (self.width as f64, self.height as f64);
        }
        (self.width as f64 * 72.0 / dpi_x, self.height as f64 * 72.0 / dpi_y)
    }
}
