//! Font family objects shared by every request for the same family name.

use std::sync::{Arc, PoisonError, RwLock};

use super::resolver_info::FontResolverInfo;

/// A font family, identified case-insensitively by name.
///
/// Records the faces that were resolved for requests in this family.
#[derive(Debug)]
pub struct FontFamilyInternal {
    name: String,
    faces: RwLock<Vec<Arc<FontResolverInfo>>>,
}

impl FontFamilyInternal {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            faces: RwLock::new(Vec::new()),
        }
    }

    /// Name as first requested.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased name used as the cache key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Faces resolved for this family so far.
    pub fn faces(&self) -> Vec<Arc<FontResolverInfo>> {
        self.faces.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn add_face(&self, info: &Arc<FontResolverInfo>) {
        let mut faces = self.faces.write().unwrap_or_else(PoisonError::into_inner);
        if !faces.iter().any(|f| Arc::ptr_eq(f, info)) {
            faces.push(Arc::clone(info));
        }
    }
}
