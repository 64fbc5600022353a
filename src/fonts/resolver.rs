//! Resolver contract and the call context handed to resolvers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use super::factory::FontTables;
use super::resolver_info::{typeface_key, FontResolverInfo};
use super::source::FontSource;
use crate::error::{Error, Result};

/// Maps font requests to faces and faces to font programs.
///
/// Implemented by applications (the primary and fallback resolvers) and by the
/// platform resolver. Returning `None` from either method means the request
/// cannot be satisfied; it is not an error.
///
/// Resolvers run while the font factory lock is held. Factory calls made from
/// inside a resolver fail with [`Error::ReentrantFactoryCall`]; the
/// [`ResolutionContext`] offers the table operations a resolver may need and
/// the only route to the platform resolver.
///
/// [`Error::ReentrantFactoryCall`]: crate::Error::ReentrantFactoryCall
pub trait FontResolver: Send + Sync {
    /// Pick a face for `family_name` in the requested style.
    fn resolve_typeface(
        &self,
        family_name: &str,
        bold: bool,
        italic: bool,
        ctx: &ResolutionContext<'_>,
    ) -> Option<FontResolverInfo>;

    /// Font program for a face name returned by [`resolve_typeface`](Self::resolve_typeface).
    fn get_font(&self, face_name: &str) -> Option<Vec<u8>>;
}

/// Capability token passed through one resolution.
///
/// Created by the font factory only. It grants access to the platform
/// resolver and to the font tables the factory has locked. A platform
/// resolver entered again from within itself fails the resolution with
/// [`Error::ReentrantPlatformResolution`].
pub struct ResolutionContext<'a> {
    platform: Option<&'a dyn FontResolver>,
    tables: &'a RefCell<FontTables>,
    platform_active: Cell<bool>,
    reentered: Cell<bool>,
    platform_faces: RefCell<Vec<String>>,
}

impl<'a> ResolutionContext<'a> {
    pub(crate) fn new(platform: Option<&'a dyn FontResolver>, tables: &'a RefCell<FontTables>) -> Self {
        Self {
            platform,
            tables,
            platform_active: Cell::new(false),
            reentered: Cell::new(false),
            platform_faces: RefCell::new(Vec::new()),
        }
    }

    /// Whether a platform resolver is configured.
    pub fn has_platform_resolver(&self) -> bool {
        self.platform.is_some()
    }

    /// Ask the platform resolver.
    ///
    /// Returns `None` when no platform resolver is configured or when called
    /// from inside the platform resolver itself.
    pub fn resolve_with_platform(&self, family_name: &str, bold: bool, italic: bool) -> Option<FontResolverInfo> {
        let platform = self.platform?;
        if self.platform_active.replace(true) {
            log::warn!("Platform font resolver re-entered while resolving '{}'", family_name);
            self.reentered.set(true);
            return None;
        }
        let info = platform.resolve_typeface(family_name, bold, italic, self);
        self.platform_active.set(false);
        if let Some(info) = &info {
            self.platform_faces.borrow_mut().push(info.face_name().to_lowercase());
        }
        info
    }

    /// Register a font program with the factory running this resolution.
    ///
    /// Same naming rules as [`FontFactory::register_font_face`]. Returning an
    /// info with the registered face name serves it without `get_font`.
    ///
    /// [`FontFactory::register_font_face`]: super::FontFactory::register_font_face
    pub fn register_font_face(&self, data: impl Into<Arc<[u8]>>) -> Result<Arc<FontSource>> {
        self.tables.borrow_mut().register_face(data.into())
    }

    /// Font source already cached for `face_name`.
    pub fn get_font_source_by_face_name(&self, face_name: &str) -> Option<Arc<FontSource>> {
        self.tables.borrow().source_by_face_name(face_name)
    }

    pub(crate) fn platform(&self) -> Option<&'a dyn FontResolver> {
        self.platform
    }

    /// Whether `face_name` was produced by the platform resolver.
    pub(crate) fn resolved_by_platform(&self, face_name: &str) -> bool {
        let face_name = face_name.to_lowercase();
        self.platform_faces.borrow().iter().any(|f| *f == face_name)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.reentered.get() {
            return Err(Error::ReentrantPlatformResolution);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ResolutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("has_platform_resolver", &self.platform.is_some())
            .field("platform_active", &self.platform_active.get())
            .finish()
    }
}

/// Resolver over font programs registered in memory.
///
/// Missing bold or italic variants are served by the closest registered face
/// with the corresponding style simulation.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFontResolver {
    faces: HashMap<String, String>,
    fonts: HashMap<String, Arc<[u8]>>,
}

impl InMemoryFontResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` as face `face_name` for one family style.
    pub fn add_face(
        &mut self,
        family_name: &str,
        bold: bool,
        italic: bool,
        face_name: &str,
        data: impl Into<Arc<[u8]>>,
    ) -> &mut Self {
        self.faces
            .insert(typeface_key(family_name, bold, italic), face_name.to_string());
        self.fonts.insert(face_name.to_lowercase(), data.into());
        self
    }

    /// Builder form of [`add_face`](Self::add_face).
    pub fn with_face(
        mut self,
        family_name: &str,
        bold: bool,
        italic: bool,
        face_name: &str,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        self.add_face(family_name, bold, italic, face_name, data);
        self
    }

    /// Number of registered faces.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Whether no face is registered.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl FontResolver for InMemoryFontResolver {
    fn resolve_typeface(
        &self,
        family_name: &str,
        bold: bool,
        italic: bool,
        _ctx: &ResolutionContext<'_>,
    ) -> Option<FontResolverInfo> {
        // Exact style first, then drop italic, then bold, then both.
        let candidates = [(bold, italic), (bold, false), (false, italic), (false, false)];
        candidates.iter().find_map(|&(b, i)| {
            self.faces.get(&typeface_key(family_name, b, i)).map(|face_name| {
                FontResolverInfo::with_simulation(face_name.clone(), bold && !b, italic && !i)
            })
        })
    }

    fn get_font(&self, face_name: &str) -> Option<Vec<u8>> {
        self.fonts.get(&face_name.to_lowercase()).map(|data| data.to_vec())
    }
}
