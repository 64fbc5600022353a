//! Error types for image import and font resolution.
//!
//! Recognition failures (an unknown image format, a resolver that has no face for a
//! family) are not errors: they surface as `None`. The variants below cover the cases
//! where the caller cannot proceed: resource limits, unsupported pixel layouts and
//! misuse of the font configuration.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while importing images or resolving fonts.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image stream is larger than the supported maximum
    #[error("Image stream too large: {length} bytes (max: {max})")]
    ImageTooLarge {
        /// Length reported by the stream
        length: u64,
        /// Configured maximum
        max: u64,
    },

    /// Valid image describing a pixel layout the converter does not implement
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Image data error found while preparing pixel data
    #[error("Image error: {0}")]
    Image(String),

    /// Font configuration misuse
    #[error("Invalid font configuration: {0}")]
    Configuration(String),

    /// A resolver returned a face name but no font bytes for it
    #[error("Font resolver returned no data for face '{face_name}'")]
    MissingFontData {
        /// Face name the resolver could not back with data
        face_name: String,
    },

    /// No resolver could provide a face for the requested family and style
    #[error("No font found for family '{family}' (bold: {bold}, italic: {italic})")]
    FontNotFound {
        /// Requested family name
        family: String,
        /// Requested bold flag
        bold: bool,
        /// Requested italic flag
        italic: bool,
    },

    /// The platform resolver was entered again while already resolving
    #[error("Platform font resolver cannot be re-entered from within itself")]
    ReentrantPlatformResolution,

    /// A resolver called a font factory method while the factory was waiting on it
    #[error("Font factory called from inside one of its resolvers; use the resolution context instead")]
    ReentrantFactoryCall,

    /// Font program could not be parsed
    #[error("Font error: {0}")]
    Font(String),
}
