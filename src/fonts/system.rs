//! Platform font resolver over the system font directories.

use std::fmt;

use super::resolver::{FontResolver, ResolutionContext};
use super::resolver_info::FontResolverInfo;

/// Resolves families against the fonts installed on the system.
///
/// Face names are PostScript names. When the family has no native bold or
/// italic face, the closest face is returned with the matching simulation.
pub struct SystemFontResolver {
    db: fontdb::Database,
}

impl Default for SystemFontResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemFontResolver {
    /// Scan the system font directories.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        log::debug!("Loaded {} system font faces", db.len());
        Self { db }
    }

    /// Use a prepared font database.
    pub fn from_database(db: fontdb::Database) -> Self {
        Self { db }
    }

    /// The underlying database.
    pub fn database(&self) -> &fontdb::Database {
        &self.db
    }

    /// Number of known faces.
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    fn find_face(&self, face_name: &str) -> Option<fontdb::ID> {
        self.db
            .faces()
            .find(|face| face.post_script_name.eq_ignore_ascii_case(face_name))
            .map(|face| face.id)
    }
}

impl fmt::Debug for SystemFontResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemFontResolver")
            .field("faces", &self.db.len())
            .finish()
    }
}

impl FontResolver for SystemFontResolver {
    fn resolve_typeface(
        &self,
        family_name: &str,
        bold: bool,
        italic: bool,
        _ctx: &ResolutionContext<'_>,
    ) -> Option<FontResolverInfo> {
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(family_name)],
            weight: if bold { fontdb::Weight::BOLD } else { fontdb::Weight::NORMAL },
            style: if italic { fontdb::Style::Italic } else { fontdb::Style::Normal },
            ..Default::default()
        };
        let face = self.db.query(&query).and_then(|id| self.db.face(id))?;
        if face.index != 0 {
            log::debug!(
                "System face '{}' is in a font collection (index {}), skipped",
                face.post_script_name,
                face.index
            );
            return None;
        }

        let native_bold = face.weight.0 >= fontdb::Weight::SEMIBOLD.0;
        let native_italic = face.style != fontdb::Style::Normal;
        log::trace!("System font '{}' matched face '{}'", family_name, face.post_script_name);
        Some(FontResolverInfo::with_simulation(
            face.post_script_name.clone(),
            bold && !native_bold,
            italic && !native_italic,
        ))
    }

    fn get_font(&self, face_name: &str) -> Option<Vec<u8>> {
        let id = self.find_face(face_name)?;
        self.db.with_face_data(id, |data, _index| data.to_vec())
    }
}
