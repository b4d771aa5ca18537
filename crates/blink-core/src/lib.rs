//! Core types and traits for the Blink URL shortener.
//!
//! This crate provides the shared vocabulary of the workspace: the short code
//! type, the link and visit metrics records, the collaborator traits the link
//! directory and the metrics aggregator are written against, and the error
//! taxonomy they report through.

pub mod cache;
pub mod error;
pub mod metrics;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use cache::UrlCache;
pub use error::{BackendError, CacheError, ConfigError, LinkError, MetricsError, StorageError};
pub use metrics::{MetricsSnapshot, MetricsStore, VisitCounts, VisitEvent, VisitTracker};
pub use repository::{LinkRecord, LinkStore};
pub use shortcode::ShortCode;
pub use shortener::Shortener;
