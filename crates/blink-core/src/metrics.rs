use crate::error::{MetricsError, StorageError};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single successful redirect, on its way to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitEvent {
    pub code: ShortCode,
    /// Identifies the visitor for unique counting (e.g. the client address).
    pub visitor: String,
}

/// Visit totals for one short code over one flush interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitCounts {
    pub visits: u64,
    pub unique_visits: u64,
}

/// Aggregated visit metrics for a short code over a time range.
///
/// `unique_visits` never exceeds `visits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub code: ShortCode,
    pub visits: u64,
    pub unique_visits: u64,
    pub from: Timestamp,
    pub to: Timestamp,
}

impl MetricsSnapshot {
    /// A snapshot with no recorded activity.
    pub fn empty(code: ShortCode, from: Timestamp, to: Timestamp) -> Self {
        Self {
            code,
            visits: 0,
            unique_visits: 0,
            from,
            to,
        }
    }
}

/// Durable storage for flushed visit aggregates.
#[async_trait]
pub trait MetricsStore: Send + Sync + 'static {
    /// Persists one row per short code for the interval that just ended.
    ///
    /// An empty batch is a successful no-op.
    async fn create_metrics_batch(
        &self,
        batch: &HashMap<ShortCode, VisitCounts>,
    ) -> Result<(), StorageError>;

    /// Sums the persisted rows for `code` recorded within `[from, to]`.
    ///
    /// Returns `None` if no row falls within the range.
    async fn get_metrics(
        &self,
        code: &ShortCode,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Option<MetricsSnapshot>, StorageError>;
}

/// The visit tracking surface used by request handlers.
#[async_trait]
pub trait VisitTracker: Send + Sync + 'static {
    /// Records a visit without blocking the caller.
    fn record_async(&self, code: ShortCode, visitor: String);

    /// Reads the flushed metrics for `code` within `[from, to]`.
    ///
    /// A code without recorded activity yields a zero valued snapshot.
    async fn snapshot(
        &self,
        code: &ShortCode,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<MetricsSnapshot, MetricsError>;
}
