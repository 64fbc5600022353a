//! Font resolution and caching.
//!
//! Maps (family, bold, italic) requests to physical font programs through
//! pluggable resolvers and caches the answers in a [`FontFactory`].
//!
//! ## Architecture
//!
//! ```text
//! (family, bold, italic)
//!     ↓
//! [FontFactory] (font factory lock, typeface key lookup)
//!     ↓ miss
//! [FontResolver] primary → fallback, or platform when neither is installed
//!     ↓
//! [FontResolverInfo] (face name + style simulation, deduplicated by key)
//!     ↓
//! [FontSource] (font program, deduplicated by SHA-256)
//!     ↓
//! [FontDescriptor] (metrics, one per font program)
//! ```

mod descriptor;
mod factory;
mod family;
mod resolver;
mod resolver_info;
mod settings;
mod source;
#[cfg(feature = "system-fonts")]
mod system;

pub use descriptor::FontDescriptor;
pub use factory::{FontCacheStatistics, FontFactory};
pub use family::FontFamilyInternal;
pub use resolver::{FontResolver, InMemoryFontResolver, ResolutionContext};
pub use resolver_info::{typeface_key, FontResolverInfo, FontSimulations};
pub use settings::{FontEncoding, FontSettings};
pub use source::{FontFaceSummary, FontHash, FontSource};
#[cfg(feature = "system-fonts")]
pub use system::SystemFontResolver;
