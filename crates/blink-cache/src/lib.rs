//! Cache implementations for resolved short links.

pub mod moka;
pub mod redis;

pub use self::moka::{CacheConfig, MokaUrlCache};
pub use self::redis::RedisUrlCache;
pub use blink_core::{CacheError, UrlCache};
