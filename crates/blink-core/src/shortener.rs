use crate::error::LinkError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, LinkError>;

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates (or finds) the short code for a long URL.
    ///
    /// Shortening the same long URL twice returns the same code.
    async fn shorten(&self, long_url: &str) -> Result<ShortCode>;

    /// Resolves a short code to its long URL.
    /// Returns `Err(LinkError::NotFound)` if the code does not exist.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;

    /// Deletes a shortened URL by its short code.
    async fn delete(&self, code: &ShortCode) -> Result<()>;
}
