// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

//! # PDF Assets
//!
//! Image import and font resolution for PDF generation.
//!
//! ## Core Features
//!
//! ### Images
//! - **Format Detection**: BMP, JPEG and PNG recognized from their headers, never by file name
//! - **Lazy Conversion**: header parsing on import, pixel work only in `prepare_image_data`
//! - **Canonical Planes**: RGB/gray planes, packed palette indices, 1-bit stencil or alpha masks
//! - **JPEG Passthrough**: DCT data is embedded unchanged
//! - **CCITT Group 4**: bilevel images get a fax-encoded alternative when it is smaller
//!
//! ### Fonts
//! - **Pluggable Resolvers**: primary, fallback and platform resolvers
//! - **Deduplication**: one resolver info per face and style simulation, one font program per SHA-256
//! - **Thread Safety**: a single font factory lock, resolvers called once per typeface
//! - **Metrics**: font descriptors parsed with `ttf-parser`
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use pdf_assets::fonts::{FontFactory, FontSettings, InMemoryFontResolver};
//! use pdf_assets::images::{ImageDataOptions, ImageImporter};
//!
//! # fn main() -> pdf_assets::Result<()> {
//! let importer = ImageImporter::new();
//! if let Some(image) = importer.import_image_from_file("logo.png")? {
//!     let data = image.prepare_image_data(&ImageDataOptions::new())?;
//! }
//!
//! let resolver = InMemoryFontResolver::new()
//!     .with_face("Body", false, false, "Body-Regular", std::fs::read("Body-Regular.ttf")?);
//! let factory = FontFactory::new(FontSettings::new().with_resolver(Arc::new(resolver)));
//! let info = factory.resolve_typeface_or_error("Body", false, true)?;
//! let descriptor = factory.get_font_descriptor(&info)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fonts;
pub mod images;

pub use error::{Error, Result};
pub use fonts::{FontFactory, FontResolver, FontResolverInfo, FontSettings};
pub use images::{ImageData, ImageDataOptions, ImageImporter, ImportedImage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
