//! Cached font metrics for one font program.

use super::source::{FontHash, FontSource};
use crate::error::Result;

/// Metrics a PDF font descriptor is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescriptor {
    /// Face name of the source the descriptor was built from
    pub face_name: String,
    /// Content hash of the font program
    pub hash: FontHash,
    /// Family name from the name table
    pub family_name: Option<String>,
    /// PostScript name from the name table
    pub postscript_name: Option<String>,
    /// Design units per em
    pub units_per_em: u16,
    /// Ascender in design units
    pub ascender: i16,
    /// Descender in design units
    pub descender: i16,
    /// Line gap in design units
    pub line_gap: i16,
    /// Cap height in design units; the ascender when the font has none
    pub cap_height: i16,
    /// Glyph count
    pub glyph_count: u16,
    /// Native bold face
    pub is_bold: bool,
    /// Native italic face
    pub is_italic: bool,
}

impl FontDescriptor {
    /// Build the descriptor from a source's face tables.
    pub fn from_source(source: &FontSource) -> Result<Self> {
        let summary = source.parsed()?;
        Ok(Self {
            face_name: source.face_name().to_string(),
            hash: source.hash(),
            family_name: summary.family_name.clone(),
            postscript_name: summary.postscript_name.clone(),
            units_per_em: summary.units_per_em,
            ascender: summary.ascender,
            descender: summary.descender,
            line_gap: summary.line_gap,
            cap_height: summary.cap_height.unwrap_or(summary.ascender),
            glyph_count: summary.glyph_count,
            is_bold: summary.is_bold,
            is_italic: summary.is_italic,
        })
    }

    /// Ascender minus descender plus line gap, in design units.
    pub fn line_spacing(&self) -> i32 {
        self.ascender as i32 - self.descender as i32 + self.line_gap as i32
    }

    /// Convert design units to the 1/1000 em units PDF uses.
    pub fn to_pdf_units(&self, value: i16) -> i32 {
        if self.units_per_em == 0 {
            return 0;
        }
        (value as i32 * 1000) / self.units_per_em as i32
    }

    /// Convert design units to points at `font_size`.
    pub fn to_points(&self, value: i16, font_size: f64) -> f64 {
        if self.units_per_em == 0 {
            return 0.0;
        }
        value as f64 * font_size / self.units_per_em as f64
    }
}
