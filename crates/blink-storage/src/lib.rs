//! Store implementations for short links and flushed visit metrics.

pub mod memory;
pub mod mysql;

pub use blink_core::{LinkStore, MetricsStore, StorageError};
pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
