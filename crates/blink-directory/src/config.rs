use blink_core::ConfigError;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_IDENTIFIER_RETRIES: u32 = 10;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Settings for a [`LinkDirectory`](crate::LinkDirectory).
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct DirectoryConfig {
    /// How many probe offsets `create` tries before giving up.
    #[builder(default = DEFAULT_MAX_IDENTIFIER_RETRIES)]
    pub max_identifier_retries: u32,

    /// Lifetime of cache entries written after a store hit.
    #[builder(default = DEFAULT_CACHE_TTL)]
    pub cache_ttl: Duration,
}

impl DirectoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identifier_retries == 0 {
            return Err(ConfigError::invalid(
                "max_identifier_retries",
                "must be greater than 0",
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::invalid("cache_ttl", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
