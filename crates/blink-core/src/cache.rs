use crate::error::CacheError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

/// An ephemeral, TTL based cache of long URLs keyed by short code.
///
/// Implementations must be safe for concurrent use. The cache is never the
/// source of truth: entries may be stale or missing at any time.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get the cached long URL.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Store a long URL that expires after `ttl`.
    async fn set_url(&self, code: &ShortCode, long_url: &str, ttl: Duration) -> Result<()>;

    /// Remove a cached long URL.
    ///
    /// It is not an error if the key does not exist.
    async fn del(&self, code: &ShortCode) -> Result<()>;
}
