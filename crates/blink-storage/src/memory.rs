use async_trait::async_trait;
use blink_core::{
    LinkRecord, LinkStore, MetricsSnapshot, MetricsStore, ShortCode, StorageError, VisitCounts,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use std::collections::HashMap;
use std::sync::Arc;

type Result<T> = std::result::Result<T, StorageError>;

/// One flushed aggregate, as a database row would hold it.
#[derive(Debug, Clone, Copy)]
struct MetricsRow {
    counts: VisitCounts,
    recorded_at: Timestamp,
}

/// In-memory implementation of the store contracts using DashMap.
///
/// Cloning is cheap and every clone shares the same underlying maps, so one
/// instance can back both the link directory and the metrics aggregator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    links: Arc<DashMap<String, LinkRecord>>,
    metrics: Arc<DashMap<String, Vec<MetricsRow>>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Returns the full record for a short code, if present.
    pub fn link(&self, code: &ShortCode) -> Option<LinkRecord> {
        self.links.get(code.as_str()).map(|entry| entry.clone())
    }

    /// Persists a metrics batch as if it had been flushed at `recorded_at`.
    pub fn create_metrics_batch_at(
        &self,
        batch: &HashMap<ShortCode, VisitCounts>,
        recorded_at: Timestamp,
    ) {
        for (code, counts) in batch {
            self.metrics
                .entry(code.as_str().to_owned())
                .or_default()
                .push(MetricsRow {
                    counts: *counts,
                    recorded_at,
                });
        }
    }
}

#[async_trait]
impl LinkStore for InMemoryStore {
    async fn create_link(&self, code: &ShortCode, long_url: &str) -> Result<()> {
        match self.links.entry(code.as_str().to_owned()) {
            Entry::Occupied(existing) if existing.get().long_url == long_url => Ok(()),
            Entry::Occupied(_) => Err(StorageError::Conflict(code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(LinkRecord::new(code.clone(), long_url));
                Ok(())
            }
        }
    }

    async fn delete_link(&self, code: &ShortCode) -> Result<()> {
        self.links.remove(code.as_str());
        Ok(())
    }

    async fn get_long_url(&self, code: &ShortCode) -> Result<Option<String>> {
        Ok(self
            .links
            .get(code.as_str())
            .map(|entry| entry.long_url.clone()))
    }
}

#[async_trait]
impl MetricsStore for InMemoryStore {
    async fn create_metrics_batch(&self, batch: &HashMap<ShortCode, VisitCounts>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        self.create_metrics_batch_at(batch, Timestamp::now());
        Ok(())
    }

    async fn get_metrics(
        &self,
        code: &ShortCode,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Option<MetricsSnapshot>> {
        let Some(rows) = self.metrics.get(code.as_str()) else {
            return Ok(None);
        };

        let mut matched = rows
            .iter()
            .filter(|row| row.recorded_at >= from && row.recorded_at <= to)
            .peekable();

        if matched.peek().is_none() {
            return Ok(None);
        }

        let totals = matched.fold(VisitCounts::default(), |acc, row| VisitCounts {
            visits: acc.visits + row.counts.visits,
            unique_visits: acc.unique_visits + row.counts.unique_visits,
        });

        Ok(Some(MetricsSnapshot {
            code: code.clone(),
            visits: totals.visits,
            unique_visits: totals.unique_visits,
            from,
            to,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn counts(visits: u64, unique_visits: u64) -> VisitCounts {
        VisitCounts {
            visits,
            unique_visits,
        }
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = InMemoryStore::new();

        store
            .create_link(&code("aabbcc"), "https://example.com")
            .await
            .unwrap();

        let result = store.get_long_url(&code("aabbcc")).await.unwrap();
        assert_eq!(result.as_deref(), Some("https://example.com"));

        let record = store.link(&code("aabbcc")).unwrap();
        assert_eq!(record.id, code("aabbcc"));
        assert_eq!(record.created_at, record.updated_at);
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let store = InMemoryStore::new();

        let result = store.get_long_url(&code("nope00")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn create_same_url_twice_is_idempotent() {
        let store = InMemoryStore::new();

        store
            .create_link(&code("aabbcc"), "https://example.com")
            .await
            .unwrap();
        store
            .create_link(&code("aabbcc"), "https://example.com")
            .await
            .unwrap();

        assert_eq!(store.link_count(), 1);
    }

    #[tokio::test]
    async fn create_conflict() {
        let store = InMemoryStore::new();

        store
            .create_link(&code("aabbcc"), "https://example.com")
            .await
            .unwrap();

        let err = store
            .create_link(&code("aabbcc"), "https://other.com")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(
            store.get_long_url(&code("aabbcc")).await.unwrap().as_deref(),
            Some("https://example.com")
        );
    }

    #[tokio::test]
    async fn delete_existing_and_nonexistent() {
        let store = InMemoryStore::new();

        store
            .create_link(&code("aabbcc"), "https://example.com")
            .await
            .unwrap();

        store.delete_link(&code("aabbcc")).await.unwrap();
        assert!(store.get_long_url(&code("aabbcc")).await.unwrap().is_none());

        store.delete_link(&code("aabbcc")).await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        store
            .create_link(&code("aabbcc"), "https://example.com")
            .await
            .unwrap();

        assert!(clone.get_long_url(&code("aabbcc")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn metrics_sum_rows_in_range() {
        let store = InMemoryStore::new();
        let now = Timestamp::now();
        let a = code("AABBCC");

        let batch = HashMap::from([(a.clone(), counts(3, 2))]);
        store.create_metrics_batch_at(&batch, now - SignedDuration::from_mins(30));
        store.create_metrics_batch_at(&batch, now - SignedDuration::from_mins(10));
        // Outside the queried range.
        store.create_metrics_batch_at(&batch, now - SignedDuration::from_hours(3));

        let snapshot = store
            .get_metrics(&a, now - SignedDuration::from_hours(1), now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.code, a);
        assert_eq!(snapshot.visits, 6);
        assert_eq!(snapshot.unique_visits, 4);
    }

    #[tokio::test]
    async fn metrics_range_is_closed() {
        let store = InMemoryStore::new();
        let at = Timestamp::now();
        let a = code("AABBCC");

        store.create_metrics_batch_at(&HashMap::from([(a.clone(), counts(1, 1))]), at);

        let snapshot = store.get_metrics(&a, at, at).await.unwrap().unwrap();
        assert_eq!(snapshot.visits, 1);
    }

    #[tokio::test]
    async fn metrics_not_found() {
        let store = InMemoryStore::new();
        let now = Timestamp::now();
        let a = code("AABBCC");

        assert!(store
            .get_metrics(&a, now - SignedDuration::from_hours(24), now)
            .await
            .unwrap()
            .is_none());

        store.create_metrics_batch_at(
            &HashMap::from([(a.clone(), counts(1, 1))]),
            now - SignedDuration::from_hours(48),
        );

        assert!(store
            .get_metrics(&a, now - SignedDuration::from_hours(24), now)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn batch_insert_records_every_code() {
        let store = InMemoryStore::new();
        let batch = HashMap::from([
            (code("AABBCC"), counts(3, 2)),
            (code("DDEEFF"), counts(1, 1)),
        ]);

        store.create_metrics_batch(&batch).await.unwrap();

        let from = Timestamp::now() - SignedDuration::from_hours(1);
        let to = Timestamp::now() + SignedDuration::from_hours(1);
        let a = store
            .get_metrics(&code("AABBCC"), from, to)
            .await
            .unwrap()
            .unwrap();
        let b = store
            .get_metrics(&code("DDEEFF"), from, to)
            .await
            .unwrap()
            .unwrap();

        assert_eq!((a.visits, a.unique_visits), (3, 2));
        assert_eq!((b.visits, b.unique_visits), (1, 1));
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let store = InMemoryStore::new();
        store.create_metrics_batch(&HashMap::new()).await.unwrap();
        assert!(store.metrics.is_empty());
    }

    #[tokio::test]
    async fn concurrent_access() {
        let store = InMemoryStore::new();
        let mut handles = vec![];

        for i in 0..10u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let c = ShortCode::new_unchecked(format!("code{:02}", i));
                store
                    .create_link(&c, &format!("https://example{}.com", i))
                    .await
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..10u64 {
            let c = ShortCode::new_unchecked(format!("code{:02}", i));
            let result = store.get_long_url(&c).await.unwrap().unwrap();
            assert_eq!(result, format!("https://example{}.com", i));
        }
    }
}
