use crate::config::DirectoryConfig;
use async_trait::async_trait;
use blink_core::{ConfigError, LinkError, LinkStore, ShortCode, Shortener, StorageError, UrlCache};
use blink_generator::{Generator, HashProbeGenerator};
use std::sync::Arc;
use tracing::{debug, trace, warn};

type Result<T> = std::result::Result<T, LinkError>;

const URL_SCHEME_PREFIX: &str = "https://";

/// Orchestrates short URL creation, lookup and deletion.
///
/// The store is the source of truth. The cache is filled after store hits
/// and may be stale or empty at any time; its failures never fail a lookup.
#[derive(Debug)]
pub struct LinkDirectory<S, C, G = HashProbeGenerator> {
    store: Arc<S>,
    cache: Arc<C>,
    generator: Arc<G>,
    config: DirectoryConfig,
}

impl<S, C, G> Clone for LinkDirectory<S, C, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            generator: Arc::clone(&self.generator),
            config: self.config.clone(),
        }
    }
}

impl<S: LinkStore, C: UrlCache> LinkDirectory<S, C> {
    /// Creates a directory using the hash probing generator.
    pub fn new(
        store: S,
        cache: C,
        config: DirectoryConfig,
    ) -> std::result::Result<Self, ConfigError> {
        Self::with_generator(store, cache, HashProbeGenerator::new(), config)
    }
}

impl<S: LinkStore, C: UrlCache, G: Generator> LinkDirectory<S, C, G> {
    /// Creates a directory with a custom identifier generator.
    pub fn with_generator(
        store: S,
        cache: C,
        generator: G,
        config: DirectoryConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(store),
            cache: Arc::new(cache),
            generator: Arc::new(generator),
            config,
        })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Returns the short code for `long_url`, creating the mapping if needed.
    ///
    /// Candidates are probed in order; a slot holding a different long URL
    /// is skipped, a slot holding the same long URL is returned as is.
    pub async fn create(&self, long_url: &str) -> Result<ShortCode> {
        validate_long_url(long_url)?;

        let attempts = self.config.max_identifier_retries;
        for offset in 0..attempts {
            let candidate = self.generator.generate(long_url, offset);
            match self.try_claim(&candidate, long_url).await {
                Ok(true) => {
                    debug!(code = %candidate, offset, "created short url");
                    return Ok(candidate);
                }
                Ok(false) => {
                    debug!(code = %candidate, offset, "short code collision, probing next offset");
                }
                Err(LinkError::AlreadyExists(_)) => {
                    debug!(code = %candidate, "long url already shortened");
                    return Ok(candidate);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(attempts, "exhausted short code candidates");
        Err(LinkError::GenerationExhausted { attempts })
    }

    /// Resolves a short code, reading through the cache.
    pub async fn get(&self, code: &ShortCode) -> Result<String> {
        match self.cache.get_url(code).await {
            Ok(Some(long_url)) => {
                trace!(code = %code, "resolved short url from cache");
                return Ok(long_url);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(code = %code, error = %e, "cache lookup failed, falling back to storage");
            }
        }

        let long_url = self
            .store
            .get_long_url(code)
            .await
            .map_err(|e| LinkError::storage("failed to get short url from storage", e))?
            .ok_or_else(|| LinkError::NotFound(code.to_string()))?;

        self.fill_cache(code.clone(), long_url.clone());
        Ok(long_url)
    }

    /// Removes a mapping from the store, then from the cache.
    ///
    /// A cache failure is reported even though the store row is already gone.
    pub async fn delete(&self, code: &ShortCode) -> Result<()> {
        self.store
            .delete_link(code)
            .await
            .map_err(|e| LinkError::storage("failed to delete short url from storage", e))?;

        self.cache
            .del(code)
            .await
            .map_err(|e| LinkError::cache("failed to delete short url from cache", e))?;

        debug!(code = %code, "deleted short url");
        Ok(())
    }

    /// `Ok(true)` when the slot was written, `Ok(false)` when it belongs to a
    /// different long URL and `Err(AlreadyExists)` when it already maps to
    /// `long_url`.
    async fn try_claim(&self, candidate: &ShortCode, long_url: &str) -> Result<bool> {
        loop {
            if let Some(existing) = self.lookup(candidate).await? {
                return Self::resolve_occupied(candidate, &existing, long_url);
            }

            match self.store.create_link(candidate, long_url).await {
                Ok(()) => return Ok(true),
                Err(StorageError::Conflict(_)) => {
                    // Another writer touched the slot between lookup and insert;
                    // if it is free again the same candidate is retried.
                    trace!(code = %candidate, "lost insert race, re-reading slot");
                }
                Err(e) => {
                    return Err(LinkError::storage(
                        "failed to create short url in storage",
                        e,
                    ))
                }
            }
        }
    }

    async fn lookup(&self, candidate: &ShortCode) -> Result<Option<String>> {
        self.store
            .get_long_url(candidate)
            .await
            .map_err(|e| LinkError::storage("failed to look up short url in storage", e))
    }

    fn resolve_occupied(candidate: &ShortCode, existing: &str, long_url: &str) -> Result<bool> {
        if existing == long_url {
            Err(LinkError::AlreadyExists(candidate.to_string()))
        } else {
            Ok(false)
        }
    }

    /// Populates the cache on a detached task so the caller never waits on it.
    fn fill_cache(&self, code: ShortCode, long_url: String) {
        let cache = Arc::clone(&self.cache);
        let ttl = self.config.cache_ttl;

        tokio::spawn(async move {
            match cache.set_url(&code, &long_url, ttl).await {
                Ok(()) => trace!(code = %code, "cached short url"),
                Err(e) => warn!(code = %code, error = %e, "failed to cache short url"),
            }
        });
    }
}

fn validate_long_url(long_url: &str) -> Result<()> {
    if long_url.is_empty() {
        return Err(LinkError::InvalidInput("long url cannot be empty".to_string()));
    }
    if !long_url.starts_with(URL_SCHEME_PREFIX) {
        return Err(LinkError::InvalidInput(format!(
            "long url must start with {URL_SCHEME_PREFIX}: {long_url}"
        )));
    }
    Ok(())
}

#[async_trait]
impl<S: LinkStore, C: UrlCache, G: Generator> Shortener for LinkDirectory<S, C, G> {
    async fn shorten(&self, long_url: &str) -> Result<ShortCode> {
        self.create(long_url).await
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String> {
        self.get(code).await
    }

    async fn delete(&self, code: &ShortCode) -> Result<()> {
        LinkDirectory::delete(self, code).await
    }
}
