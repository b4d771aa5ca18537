//! Visit metrics aggregation.
//!
//! A single task owns the per short code [`VisitCollector`]s. Visits reach
//! it through a bounded queue and are flushed to a [`MetricsStore`] in one
//! batch per interval.
//!
//! [`MetricsStore`]: blink_core::MetricsStore

pub mod aggregator;
pub mod collector;
pub mod config;

pub use aggregator::{MetricsAggregator, RecordOutcome};
pub use collector::VisitCollector;
pub use config::AggregatorConfig;
