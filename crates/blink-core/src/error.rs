use thiserror::Error;

/// Errors reported by persistent store implementations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code already maps to a different url: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors reported by cache implementations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

/// The collaborator a [`LinkError::Unavailable`] originated from.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors surfaced by link creation, lookup and deletion.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    #[error("invalid long url: {0}")]
    InvalidInput(String),
    #[error("short url not found: {0}")]
    NotFound(String),
    /// Raised while probing when the candidate slot already holds the same
    /// long URL. Link creation turns it into a successful result.
    #[error("short url already exists: {0}")]
    AlreadyExists(String),
    #[error("failed to generate a unique short url after {attempts} attempts")]
    GenerationExhausted { attempts: u32 },
    #[error("{context}: {source}")]
    Unavailable {
        context: &'static str,
        #[source]
        source: BackendError,
    },
}

impl LinkError {
    pub fn storage(context: &'static str, source: StorageError) -> Self {
        Self::Unavailable {
            context,
            source: source.into(),
        }
    }

    pub fn cache(context: &'static str, source: CacheError) -> Self {
        Self::Unavailable {
            context,
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

/// Errors surfaced when reading visit metrics.
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    #[error("{context}: {source}")]
    Unavailable {
        context: &'static str,
        #[source]
        source: StorageError,
    },
}

/// A configuration value rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
