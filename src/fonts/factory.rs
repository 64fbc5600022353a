//! The font factory: resolver dispatch and the lock-guarded font tables.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use super::descriptor::FontDescriptor;
use super::family::FontFamilyInternal;
use super::resolver::{FontResolver, ResolutionContext};
use super::resolver_info::{typeface_key, FontResolverInfo};
use super::settings::{same_resolver, FontEncoding, FontSettings};
use super::source::{FontFaceSummary, FontHash, FontSource};
use crate::error::{Error, Result};

/// Entry counts of the font tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FontCacheStatistics {
    /// Resolved (family, bold, italic) requests
    pub typeface_keys: usize,
    /// Distinct resolver infos
    pub resolver_infos: usize,
    /// Face names with a font source
    pub face_names: usize,
    /// Distinct font programs
    pub font_sources: usize,
    /// Font families
    pub families: usize,
    /// Font descriptors
    pub descriptors: usize,
}

#[derive(Debug, Default)]
pub(crate) struct FontTables {
    /// Typeface key to the shared info.
    typeface_infos: HashMap<String, Arc<FontResolverInfo>>,
    /// Info key to the shared info.
    resolver_infos: HashMap<String, Arc<FontResolverInfo>>,
    /// Lowercased face name.
    sources_by_face_name: HashMap<String, Arc<FontSource>>,
    sources_by_typeface_key: HashMap<String, Arc<FontSource>>,
    sources_by_hash: HashMap<FontHash, Arc<FontSource>>,
    /// Lowercased family name.
    families: HashMap<String, Arc<FontFamilyInternal>>,
    descriptors: HashMap<FontHash, Arc<FontDescriptor>>,
}

impl FontTables {
    /// Font source for `face_name`, asking `resolver` for the bytes if it is new.
    fn materialize_source(&mut self, face_name: &str, resolver: Option<&dyn FontResolver>) -> Result<Arc<FontSource>> {
        if let Some(source) = self.source_by_face_name(face_name) {
            return Ok(source);
        }
        log::debug!("Loading font data for face '{}'", face_name);
        let data = resolver
            .and_then(|r| r.get_font(face_name))
            .filter(|data| !data.is_empty())
            .ok_or_else(|| Error::MissingFontData {
                face_name: face_name.to_string(),
            })?;
        Ok(self.insert_source(FontSource::new(face_name, data)))
    }

    /// Index a new source by face name and content hash.
    ///
    /// Byte-identical programs collapse onto the source registered first.
    fn insert_source(&mut self, source: FontSource) -> Arc<FontSource> {
        let name_key = source.face_name().to_lowercase();
        let source = match self.sources_by_hash.get(&source.hash()) {
            Some(existing) => {
                log::debug!(
                    "Face '{}' has the same font data as '{}' ({})",
                    source.face_name(),
                    existing.face_name(),
                    existing.hash().short_hex()
                );
                Arc::clone(existing)
            },
            None => {
                let source = Arc::new(source);
                self.sources_by_hash.insert(source.hash(), Arc::clone(&source));
                source
            },
        };
        self.sources_by_face_name.insert(name_key, Arc::clone(&source));
        source
    }

    pub(crate) fn source_by_face_name(&self, face_name: &str) -> Option<Arc<FontSource>> {
        self.sources_by_face_name.get(&face_name.to_lowercase()).cloned()
    }

    /// Register a font program under a name taken from its own tables.
    pub(crate) fn register_face(&mut self, data: Arc<[u8]>) -> Result<Arc<FontSource>> {
        let hash = FontHash::of(&data);
        if let Some(existing) = self.sources_by_hash.get(&hash) {
            return Ok(Arc::clone(existing));
        }

        let summary = FontFaceSummary::parse(&data, 0)?;
        let mut face_name = summary
            .postscript_name
            .or(summary.family_name)
            .unwrap_or_else(|| format!("font-{}", hash.short_hex()));
        if self.sources_by_face_name.contains_key(&face_name.to_lowercase()) {
            face_name = format!("{}-{}", face_name, hash.short_hex());
        }

        log::debug!("Registered font face '{}' ({} bytes)", face_name, data.len());
        Ok(self.insert_source(FontSource::new(face_name, data)))
    }

    fn family(&mut self, family_name: &str) -> Arc<FontFamilyInternal> {
        Arc::clone(
            self.families
                .entry(family_name.to_lowercase())
                .or_insert_with(|| Arc::new(FontFamilyInternal::new(family_name))),
        )
    }

    fn statistics(&self) -> FontCacheStatistics {
        FontCacheStatistics {
            typeface_keys: self.typeface_infos.len(),
            resolver_infos: self.resolver_infos.len(),
            face_names: self.sources_by_face_name.len(),
            font_sources: self.sources_by_hash.len(),
            families: self.families.len(),
            descriptors: self.descriptors.len(),
        }
    }
}

struct FontState {
    settings: FontSettings,
    tables: RefCell<FontTables>,
}

/// Records the thread that runs resolver code under the font factory lock.
struct ResolvingThread<'a>(&'a Mutex<Option<ThreadId>>);

impl<'a> ResolvingThread<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Self(slot)
    }
}

impl Drop for ResolvingThread<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Resolves font requests and caches faces, font programs and metrics.
///
/// All table access goes through one mutex, the font factory lock. Resolvers
/// are called with the lock held, so concurrent requests for the same
/// typeface are answered by a single resolver call.
///
/// A resolver reaches the tables through its [`ResolutionContext`]. Calling a
/// factory method from inside a resolver fails with
/// [`Error::ReentrantFactoryCall`] (or yields `None` for lookups).
///
/// ```ignore
/// use std::sync::Arc;
/// use pdf_assets::fonts::{FontFactory, FontSettings, InMemoryFontResolver};
///
/// let resolver = InMemoryFontResolver::new().with_face("Body", false, false, "Body-Regular", bytes);
/// let factory = FontFactory::new(FontSettings::new().with_resolver(Arc::new(resolver)));
/// let info = factory.resolve_typeface_or_error("Body", true, false)?;
/// assert!(info.must_simulate_bold());
/// ```
pub struct FontFactory {
    state: Mutex<FontState>,
    resolution_started: AtomicBool,
    resolving_thread: Mutex<Option<ThreadId>>,
}

impl Default for FontFactory {
    fn default() -> Self {
        Self::new(FontSettings::default())
    }
}

impl fmt::Debug for FontFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("FontFactory");
        s.field("resolution_started", &self.has_resolved_fonts());
        if let Ok(mut state) = self.lock() {
            let statistics = state.tables.get_mut().statistics();
            s.field("settings", &state.settings).field("statistics", &statistics);
        }
        s.finish()
    }
}

impl FontFactory {
    /// Create a factory with empty tables.
    pub fn new(settings: FontSettings) -> Self {
        Self {
            state: Mutex::new(FontState {
                settings,
                tables: RefCell::new(FontTables::default()),
            }),
            resolution_started: AtomicBool::new(false),
            resolving_thread: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, FontState>> {
        let resolving = *self.resolving_thread.lock().unwrap_or_else(PoisonError::into_inner);
        if resolving == Some(thread::current().id()) {
            log::warn!("Font factory called from inside one of its resolvers");
            return Err(Error::ReentrantFactoryCall);
        }
        // A resolver that panicked cannot leave the tables half-updated:
        // entries are only inserted after every fallible step succeeded.
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Resolve a (family, bold, italic) request.
    ///
    /// Returns the cached info for a known request. Otherwise the primary
    /// resolver, then the fallback resolver are asked; when neither is
    /// installed the platform resolver is. `Ok(None)` means nobody had a face,
    /// and nothing is cached so a later call tries again.
    ///
    /// A face name without font data fails with [`Error::MissingFontData`].
    pub fn resolve_typeface(&self, family_name: &str, bold: bool, italic: bool) -> Result<Option<Arc<FontResolverInfo>>> {
        let key = typeface_key(family_name, bold, italic);
        let mut guard = self.lock()?;
        if let Some(info) = guard.tables.get_mut().typeface_infos.get(&key) {
            return Ok(Some(Arc::clone(info)));
        }
        self.resolution_started.store(true, Ordering::SeqCst);
        let _resolving = ResolvingThread::enter(&self.resolving_thread);

        let state: &FontState = &guard;
        let ctx = ResolutionContext::new(state.settings.platform_resolver.as_deref(), &state.tables);
        let answer = query_resolvers(&state.settings, &ctx, family_name, bold, italic);
        ctx.check()?;
        let Some((info, resolver)) = answer else {
            log::debug!("No face found for typeface '{}'", key);
            return Ok(None);
        };

        let data_resolver = if ctx.resolved_by_platform(info.face_name()) {
            ctx.platform()
        } else {
            Some(resolver)
        };

        let mut tables = state.tables.borrow_mut();
        let tables = &mut *tables;
        let info_key = info.key();
        let info = match tables.resolver_infos.get(&info_key) {
            Some(existing) => {
                log::debug!("Typeface '{}' shares resolved face '{}'", key, info_key);
                Arc::clone(existing)
            },
            None => {
                tables.materialize_source(info.face_name(), data_resolver)?;
                let info = Arc::new(info);
                tables.resolver_infos.insert(info_key, Arc::clone(&info));
                info
            },
        };

        tables.typeface_infos.insert(key.clone(), Arc::clone(&info));
        if let Some(source) = tables.source_by_face_name(info.face_name()) {
            tables.sources_by_typeface_key.insert(key.clone(), source);
        }
        tables.family(family_name).add_face(&info);

        log::debug!(
            "Resolved typeface '{}' to face '{}' (simulate bold: {}, italic: {})",
            key,
            info.face_name(),
            info.must_simulate_bold(),
            info.must_simulate_italic()
        );
        Ok(Some(info))
    }

    /// Like [`resolve_typeface`](Self::resolve_typeface), with a missing face
    /// reported as [`Error::FontNotFound`].
    pub fn resolve_typeface_or_error(&self, family_name: &str, bold: bool, italic: bool) -> Result<Arc<FontResolverInfo>> {
        self.resolve_typeface(family_name, bold, italic)?
            .ok_or_else(|| Error::FontNotFound {
                family: family_name.to_string(),
                bold,
                italic,
            })
    }

    /// Cached source for a face name.
    pub fn get_font_source_by_face_name(&self, face_name: &str) -> Option<Arc<FontSource>> {
        self.lock().ok()?.tables.get_mut().source_by_face_name(face_name)
    }

    /// Cached source for a resolved typeface key.
    pub fn get_font_source_by_typeface_key(&self, typeface_key: &str) -> Option<Arc<FontSource>> {
        self.lock()
            .ok()?
            .tables
            .get_mut()
            .sources_by_typeface_key
            .get(&typeface_key.to_lowercase())
            .cloned()
    }

    /// Cached source for a content hash.
    pub fn get_font_source_by_hash(&self, hash: &FontHash) -> Option<Arc<FontSource>> {
        self.lock().ok()?.tables.get_mut().sources_by_hash.get(hash).cloned()
    }

    /// Cached source behind a resolver info.
    pub fn get_font_source(&self, info: &FontResolverInfo) -> Option<Arc<FontSource>> {
        self.get_font_source_by_face_name(info.face_name())
    }

    /// Register a font program directly.
    ///
    /// The face name is the font's PostScript name, its family name, or a
    /// name derived from the content hash, in that order. A later resolver
    /// answer with that face name is served without calling `get_font`.
    pub fn register_font_face(&self, data: impl Into<Arc<[u8]>>) -> Result<Arc<FontSource>> {
        self.lock()?.tables.get_mut().register_face(data.into())
    }

    /// Family object for `family_name`, created on first use.
    pub fn get_or_create_font_family(&self, family_name: &str) -> Result<Arc<FontFamilyInternal>> {
        Ok(self.lock()?.tables.get_mut().family(family_name))
    }

    /// Family object for `family_name`, if it exists.
    pub fn get_font_family(&self, family_name: &str) -> Option<Arc<FontFamilyInternal>> {
        self.lock()
            .ok()?
            .tables
            .get_mut()
            .families
            .get(&family_name.to_lowercase())
            .cloned()
    }

    /// Metrics of the font program behind `info`, computed once per program.
    pub fn get_font_descriptor(&self, info: &FontResolverInfo) -> Result<Arc<FontDescriptor>> {
        let mut state = self.lock()?;
        let tables = state.tables.get_mut();
        let source = tables
            .source_by_face_name(info.face_name())
            .ok_or_else(|| Error::MissingFontData {
                face_name: info.face_name().to_string(),
            })?;
        if let Some(descriptor) = tables.descriptors.get(&source.hash()) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(FontDescriptor::from_source(&source)?);
        tables.descriptors.insert(source.hash(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Replace the primary resolver.
    ///
    /// Once a font has been resolved only the installed instance may be set again.
    pub fn set_resolver(&self, resolver: Arc<dyn FontResolver>) -> Result<()> {
        let mut state = self.lock()?;
        let resolver = Some(resolver);
        if self.has_resolved_fonts() && !same_resolver(&state.settings.resolver, &resolver) {
            return Err(Error::Configuration(
                "the font resolver cannot be changed after fonts have been resolved".to_string(),
            ));
        }
        state.settings.resolver = resolver;
        Ok(())
    }

    /// Replace the default encoding, with the same rule as [`set_resolver`](Self::set_resolver).
    pub fn set_default_encoding(&self, encoding: FontEncoding) -> Result<()> {
        let mut state = self.lock()?;
        if self.has_resolved_fonts() && state.settings.default_encoding != encoding {
            return Err(Error::Configuration(
                "the default font encoding cannot be changed after fonts have been resolved".to_string(),
            ));
        }
        state.settings.default_encoding = encoding;
        Ok(())
    }

    /// Current default encoding.
    pub fn default_encoding(&self) -> Result<FontEncoding> {
        Ok(self.lock()?.settings.default_encoding)
    }

    /// Whether any resolution has been attempted since creation or the last reset.
    pub fn has_resolved_fonts(&self) -> bool {
        self.resolution_started.load(Ordering::SeqCst)
    }

    /// Drop every cached entry. Settings are kept and may be changed again.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock()?;
        let tables = state.tables.get_mut();
        log::info!("Resetting font factory ({:?})", tables.statistics());
        *tables = FontTables::default();
        self.resolution_started.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Entry counts of the font tables.
    pub fn statistics(&self) -> Result<FontCacheStatistics> {
        Ok(self.lock()?.tables.get_mut().statistics())
    }
}

/// Ask the configured resolvers in order and return the answer with the resolver that gave it.
fn query_resolvers<'s>(
    settings: &'s FontSettings,
    ctx: &ResolutionContext<'s>,
    family_name: &str,
    bold: bool,
    italic: bool,
) -> Option<(FontResolverInfo, &'s dyn FontResolver)> {
    let custom: Vec<&'s dyn FontResolver> = [settings.resolver.as_deref(), settings.fallback_resolver.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if custom.is_empty() {
        let platform = ctx.platform()?;
        return ctx
            .resolve_with_platform(family_name, bold, italic)
            .map(|info| (info, platform));
    }
    custom
        .into_iter()
        .find_map(|resolver| resolver.resolve_typeface(family_name, bold, italic, ctx).map(|info| (info, resolver)))
}
