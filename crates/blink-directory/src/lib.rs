//! Creation, lookup and deletion of short URL mappings.
//!
//! [`LinkDirectory`] derives identifiers with a [`Generator`], persists them
//! through a [`LinkStore`] and serves reads cache-aside through a [`UrlCache`].
//!
//! [`Generator`]: blink_generator::Generator
//! [`LinkStore`]: blink_core::LinkStore
//! [`UrlCache`]: blink_core::UrlCache

pub mod config;
pub mod directory;

pub use config::DirectoryConfig;
pub use directory::LinkDirectory;
