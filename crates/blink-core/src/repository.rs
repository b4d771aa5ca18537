use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored mapping from a short code to its long URL.
///
/// Records are never updated in place; a link is either absent or present
/// with a fixed long URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// The short code, primary key of the record.
    pub id: ShortCode,
    /// The original URL that was shortened.
    pub long_url: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LinkRecord {
    pub fn new(id: ShortCode, long_url: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            long_url: long_url.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Durable storage for short code to long URL mappings.
///
/// The store enforces uniqueness of the short code only; several codes may
/// point at the same long URL.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Inserts a new mapping.
    ///
    /// Inserting a mapping that already exists with the same long URL
    /// succeeds. Returns `Err(StorageError::Conflict)` if the code is already
    /// taken by a different long URL.
    async fn create_link(&self, code: &ShortCode, long_url: &str) -> Result<()>;

    /// Deletes the mapping for a given short code.
    /// Deleting a code that does not exist is not an error.
    async fn delete_link(&self, code: &ShortCode) -> Result<()>;

    /// Retrieves the long URL for a given short code.
    /// Returns `None` if the code does not exist.
    async fn get_long_url(&self, code: &ShortCode) -> Result<Option<String>>;
}
