pub mod hash_probe;

pub use hash_probe::HashProbeGenerator;

use blink_core::ShortCode;

/// Trait for deriving short code candidates from a long URL.
///
/// Implementations are pure functions of their inputs and never interact
/// with storage: the same `(long_url, offset)` pair always yields the same
/// candidate. Callers resolve collisions by retrying with increasing offsets.
pub trait Generator: Send + Sync + 'static {
    /// Returns the candidate short code for `long_url` at probe `offset`.
    fn generate(&self, long_url: &str, offset: u32) -> ShortCode;
}
