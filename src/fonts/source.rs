//! Font programs held by the factory, addressed by face name and content hash.

use std::fmt;
use std::sync::{Arc, OnceLock};

use sha2::{Digest, Sha256};
use ttf_parser::Face;

use crate::error::{Error, Result};

/// SHA-256 of a font program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FontHash([u8; 32]);

impl FontHash {
    /// Hash `data`.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex of the first eight bytes.
    pub fn short_hex(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for FontHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontHash({})", self)
    }
}

impl fmt::Display for FontHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Face-level data read from the font tables.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceSummary {
    /// Typographic or legacy family name
    pub family_name: Option<String>,
    /// PostScript name
    pub postscript_name: Option<String>,
    /// Design units per em
    pub units_per_em: u16,
    /// Ascender in design units
    pub ascender: i16,
    /// Descender in design units (negative below the baseline)
    pub descender: i16,
    /// Line gap in design units
    pub line_gap: i16,
    /// Cap height in design units, if the OS/2 table has it
    pub cap_height: Option<i16>,
    /// Number of glyphs
    pub glyph_count: u16,
    /// OS/2 or head bold flag
    pub is_bold: bool,
    /// OS/2 or head italic flag
    pub is_italic: bool,
}

impl FontFaceSummary {
    /// Parse face `index` of a font program.
    pub fn parse(data: &[u8], index: u32) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Font("font data is empty".to_string()));
        }
        let face = Face::parse(data, index).map_err(|e| Error::Font(e.to_string()))?;
        Ok(Self {
            family_name: find_name(&face, ttf_parser::name_id::TYPOGRAPHIC_FAMILY)
                .or_else(|| find_name(&face, ttf_parser::name_id::FAMILY)),
            postscript_name: find_name(&face, ttf_parser::name_id::POST_SCRIPT_NAME),
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            cap_height: face.capital_height(),
            glyph_count: face.number_of_glyphs(),
            is_bold: face.is_bold(),
            is_italic: face.is_italic(),
        })
    }
}

fn find_name(face: &Face<'_>, name_id: u16) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|name| name.name_id == name_id)
        .find_map(|name| name.to_string())
}

/// One font program and its lazily parsed face tables.
///
/// Shared through `Arc`; every face name and typeface key whose bytes hash to
/// the same [`FontHash`] maps to the same instance.
pub struct FontSource {
    face_name: String,
    data: Arc<[u8]>,
    hash: FontHash,
    summary: OnceLock<std::result::Result<FontFaceSummary, String>>,
}

impl FontSource {
    /// Wrap a font program.
    pub fn new(face_name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        Self {
            face_name: face_name.into(),
            hash: FontHash::of(&data),
            data,
            summary: OnceLock::new(),
        }
    }

    /// Face name the source was first created for.
    pub fn face_name(&self) -> &str {
        &self.face_name
    }

    /// Font program bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the font program.
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Content hash.
    pub fn hash(&self) -> FontHash {
        self.hash
    }

    /// Face tables, parsed on first access.
    pub fn parsed(&self) -> Result<&FontFaceSummary> {
        self.summary
            .get_or_init(|| FontFaceSummary::parse(&self.data, 0).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| Error::Font(format!("face '{}': {}", self.face_name, e)))
    }
}

impl fmt::Debug for FontSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontSource")
            .field("face_name", &self.face_name)
            .field("len", &self.data.len())
            .field("hash", &self.hash)
            .finish()
    }
}
