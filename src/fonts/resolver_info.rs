//! Face identity returned by font resolvers.

use crate::error::{Error, Result};

/// Style simulation a renderer has to apply for a resolved face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontSimulations {
    /// The face matches the requested style.
    #[default]
    None,
    /// Embolden the regular face.
    BoldSimulation,
    /// Slant the upright face.
    ItalicSimulation,
    /// Both.
    BoldItalicSimulation,
}

impl FontSimulations {
    /// Build from the two simulation flags.
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => FontSimulations::None,
            (true, false) => FontSimulations::BoldSimulation,
            (false, true) => FontSimulations::ItalicSimulation,
            (true, true) => FontSimulations::BoldItalicSimulation,
        }
    }

    /// Bold has to be synthesized.
    pub fn is_bold(&self) -> bool {
        matches!(self, FontSimulations::BoldSimulation | FontSimulations::BoldItalicSimulation)
    }

    /// Italic has to be synthesized.
    pub fn is_italic(&self) -> bool {
        matches!(self, FontSimulations::ItalicSimulation | FontSimulations::BoldItalicSimulation)
    }
}

/// Resolver answer for a (family, bold, italic) request.
///
/// `face_name` identifies one physical font program and is chosen by the
/// resolver; it is not a family name. Two requests whose answers share the
/// same [`key`](Self::key) are served by one cached instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontResolverInfo {
    face_name: String,
    must_simulate_bold: bool,
    must_simulate_italic: bool,
    collection_number: u32,
}

impl FontResolverInfo {
    /// A face used as is.
    pub fn new(face_name: impl Into<String>) -> Self {
        Self::with_simulation(face_name, false, false)
    }

    /// A face with explicit simulation flags.
    pub fn with_simulation(face_name: impl Into<String>, must_simulate_bold: bool, must_simulate_italic: bool) -> Self {
        Self {
            face_name: face_name.into(),
            must_simulate_bold,
            must_simulate_italic,
            collection_number: 0,
        }
    }

    /// A face with simulations given as [`FontSimulations`].
    pub fn with_style_simulations(face_name: impl Into<String>, simulations: FontSimulations) -> Self {
        Self::with_simulation(face_name, simulations.is_bold(), simulations.is_italic())
    }

    /// Select a face inside a font collection.
    ///
    /// Collections are not supported; any index other than 0 is rejected.
    pub fn try_with_collection_number(mut self, collection_number: u32) -> Result<Self> {
        if collection_number != 0 {
            return Err(Error::Configuration(format!(
                "face '{}': font collections are not supported (collection number {})",
                self.face_name, collection_number
            )));
        }
        self.collection_number = collection_number;
        Ok(self)
    }

    /// Resolver-assigned face name.
    pub fn face_name(&self) -> &str {
        &self.face_name
    }

    /// Bold has to be synthesized.
    pub fn must_simulate_bold(&self) -> bool {
        self.must_simulate_bold
    }

    /// Italic has to be synthesized.
    pub fn must_simulate_italic(&self) -> bool {
        self.must_simulate_italic
    }

    /// Simulation flags as an enum.
    pub fn style_simulations(&self) -> FontSimulations {
        FontSimulations::from_flags(self.must_simulate_bold, self.must_simulate_italic)
    }

    /// Index in a font collection, always 0.
    pub fn collection_number(&self) -> u32 {
        self.collection_number
    }

    /// Cache key: lowercased face name plus simulation flags.
    pub fn key(&self) -> String {
        format!(
            "{}/{}{}:frik",
            self.face_name.to_lowercase(),
            if self.must_simulate_bold { 'b' } else { '-' },
            if self.must_simulate_italic { 'i' } else { '-' }
        )
    }
}

/// Cache key of a (family, bold, italic) request.
pub fn typeface_key(family_name: &str, bold: bool, italic: bool) -> String {
    format!(
        "{}/{}{}",
        family_name.to_lowercase(),
        if bold { 'b' } else { '-' },
        if italic { 'i' } else { '-' }
    )
}
