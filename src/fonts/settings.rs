//! Configuration for [`FontFactory`](super::FontFactory).

use std::fmt;
use std::sync::Arc;

use super::resolver::FontResolver;

/// Encoding used for text in fonts that do not specify one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontEncoding {
    /// Single-byte WinAnsiEncoding.
    #[default]
    WinAnsi,
    /// Identity-H encoded CID fonts with a ToUnicode map.
    Unicode,
}

/// Resolvers and defaults for a font factory.
#[derive(Clone, Default)]
pub struct FontSettings {
    /// Primary resolver.
    pub resolver: Option<Arc<dyn FontResolver>>,

    /// Consulted when the primary resolver has no answer.
    pub fallback_resolver: Option<Arc<dyn FontResolver>>,

    /// Platform resolver, used when no other resolver is installed and
    /// reachable from custom resolvers through the resolution context.
    pub platform_resolver: Option<Arc<dyn FontResolver>>,

    /// Default text encoding.
    pub default_encoding: FontEncoding,
}

impl FontSettings {
    /// No resolvers, WinAnsi encoding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn FontResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the fallback resolver.
    pub fn with_fallback_resolver(mut self, resolver: Arc<dyn FontResolver>) -> Self {
        self.fallback_resolver = Some(resolver);
        self
    }

    /// Set the platform resolver.
    pub fn with_platform_resolver(mut self, resolver: Arc<dyn FontResolver>) -> Self {
        self.platform_resolver = Some(resolver);
        self
    }

    /// Use the system font directories as platform resolver.
    #[cfg(feature = "system-fonts")]
    pub fn with_system_fonts(self) -> Self {
        self.with_platform_resolver(Arc::new(super::system::SystemFontResolver::new()))
    }

    /// Set the default encoding.
    pub fn with_default_encoding(mut self, encoding: FontEncoding) -> Self {
        self.default_encoding = encoding;
        self
    }
}

impl fmt::Debug for FontSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontSettings")
            .field("resolver", &self.resolver.is_some())
            .field("fallback_resolver", &self.fallback_resolver.is_some())
            .field("platform_resolver", &self.platform_resolver.is_some())
            .field("default_encoding", &self.default_encoding)
            .finish()
    }
}

/// Whether two resolver handles point at the same instance.
pub(crate) fn same_resolver(a: &Option<Arc<dyn FontResolver>>, b: &Option<Arc<dyn FontResolver>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::InMemoryFontResolver;

    #[test]
    fn test_defaults() {
        let settings = FontSettings::new();
        assert!(settings.resolver.is_none());
        assert!(settings.fallback_resolver.is_none());
        assert!(settings.platform_resolver.is_none());
        assert_eq!(settings.default_encoding, FontEncoding::WinAnsi);
    }

    #[test]
    fn test_builder() {
        let resolver: Arc<dyn FontResolver> = Arc::new(InMemoryFontResolver::new());
        let settings = FontSettings::new()
            .with_resolver(Arc::clone(&resolver))
            .with_default_encoding(FontEncoding::Unicode);
        assert!(same_resolver(&settings.resolver, &Some(resolver)));
        assert_eq!(settings.default_encoding, FontEncoding::Unicode);
        assert!(format!("{:?}", settings).contains("resolver: true"));
    }

    #[test]
    fn test_same_resolver_is_identity() {
        let a: Arc<dyn FontResolver> = Arc::new(InMemoryFontResolver::new());
        let b: Arc<dyn FontResolver> = Arc::new(InMemoryFontResolver::new());
        assert!(same_resolver(&Some(Arc::clone(&a)), &Some(Arc::clone(&a))));
        assert!(!same_resolver(&Some(a), &Some(b)));
        assert!(same_resolver(&None, &None));
    }
}
