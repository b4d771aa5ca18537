use crate::collector::VisitCollector;
use crate::config::AggregatorConfig;
use async_trait::async_trait;
use blink_core::{
    ConfigError, MetricsError, MetricsSnapshot, MetricsStore, ShortCode, VisitCounts, VisitEvent,
    VisitTracker,
};
use jiff::Timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// What happened to a visit handed to [`MetricsAggregator::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The visit is queued and will be part of a future flush.
    Enqueued,
    /// The queue stayed full for the whole record timeout; the visit was dropped.
    TimedOut,
    /// The aggregator is stopped; the visit was dropped.
    Stopped,
}

struct Lifecycle {
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the visit aggregation task.
///
/// All handles feed the same task through a bounded queue. The task is the
/// only owner of the per short code collectors: it folds incoming visits
/// into them and, once per flush interval, writes them to the store as one
/// batch and starts over from empty, whether or not the write succeeded.
///
/// Stopping performs one last flush and is permanent. Dropping every handle
/// has the same effect as calling [`stop`](Self::stop).
pub struct MetricsAggregator<S> {
    events: mpsc::Sender<VisitEvent>,
    lifecycle: Arc<Lifecycle>,
    store: Arc<S>,
    record_timeout: Duration,
}

impl<S> Clone for MetricsAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            lifecycle: Arc::clone(&self.lifecycle),
            store: Arc::clone(&self.store),
            record_timeout: self.record_timeout,
        }
    }
}

impl<S> std::fmt::Debug for MetricsAggregator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("stopped", &*self.lifecycle.stop.borrow())
            .field("record_timeout", &self.record_timeout)
            .finish_non_exhaustive()
    }
}

impl<S: MetricsStore> MetricsAggregator<S> {
    /// Validates `config` and spawns the aggregation task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: AggregatorConfig, store: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Arc::new(store);
        let (events_tx, events_rx) = mpsc::channel(config.queue_capacity);
        let (stop_tx, stop_rx) = watch::channel(false);

        let worker = tokio::spawn(run(
            Arc::clone(&store),
            events_rx,
            stop_rx,
            config.flush_interval,
        ));

        info!(
            flush_interval = ?config.flush_interval,
            queue_capacity = config.queue_capacity,
            "metrics aggregator started"
        );

        Ok(Self {
            events: events_tx,
            lifecycle: Arc::new(Lifecycle {
                stop: stop_tx,
                worker: Mutex::new(Some(worker)),
            }),
            store,
            record_timeout: config.record_timeout,
        })
    }

    /// Queues a visit, waiting at most the configured record timeout for space.
    pub async fn record(&self, code: ShortCode, visitor: String) -> RecordOutcome {
        if self.is_stopped() {
            debug!(code = %code, "metrics aggregator stopped, dropping visit");
            return RecordOutcome::Stopped;
        }

        let event = VisitEvent { code, visitor };
        match self.events.send_timeout(event, self.record_timeout).await {
            Ok(()) => RecordOutcome::Enqueued,
            Err(SendTimeoutError::Timeout(event)) => {
                warn!(
                    code = %event.code,
                    timeout = ?self.record_timeout,
                    "metrics queue full, dropping visit"
                );
                RecordOutcome::TimedOut
            }
            Err(SendTimeoutError::Closed(event)) => {
                debug!(code = %event.code, "metrics queue closed, dropping visit");
                RecordOutcome::Stopped
            }
        }
    }

    /// Queues a visit from a spawned task so the caller never waits.
    pub fn record_async(&self, code: ShortCode, visitor: String) {
        let aggregator = self.clone();
        tokio::spawn(async move {
            aggregator.record(code, visitor).await;
        });
    }

    /// Sums the flushed metrics for `code` within `[from, to]`.
    ///
    /// A code without flushed activity in the range yields zero counts.
    pub async fn snapshot(
        &self,
        code: &ShortCode,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<MetricsSnapshot, MetricsError> {
        let snapshot = self
            .store
            .get_metrics(code, from, to)
            .await
            .map_err(|source| MetricsError::Unavailable {
                context: "failed to get metrics from storage",
                source,
            })?;

        Ok(snapshot.unwrap_or_else(|| MetricsSnapshot::empty(code.clone(), from, to)))
    }

    pub fn is_stopped(&self) -> bool {
        *self.lifecycle.stop.borrow()
    }

    /// Signals the task to flush one last time and exit. Later calls are no-ops.
    pub fn stop(&self) {
        if !self.lifecycle.stop.send_replace(true) {
            info!("stopping metrics aggregator");
        }
    }

    /// Stops the task and waits for the final flush to complete.
    pub async fn shutdown(&self) {
        self.stop();

        let worker = self.lifecycle.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "metrics aggregator task failed");
            }
        }
    }
}

async fn run<S: MetricsStore>(
    store: Arc<S>,
    mut events: mpsc::Receiver<VisitEvent>,
    mut stop: watch::Receiver<bool>,
    flush_interval: Duration,
) {
    let mut collectors: HashMap<ShortCode, VisitCollector> = HashMap::new();
    let mut ticker = time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush(store.as_ref(), &mut collectors).await;
            }
            event = events.recv() => match event {
                Some(event) => aggregate(&mut collectors, event),
                None => {
                    debug!("all metrics aggregator handles dropped");
                    break;
                }
            },
            _ = stopped(&mut stop) => {
                debug!("metrics aggregator received stop signal");
                break;
            }
        }
    }

    // Visits accepted before the stop are still counted.
    events.close();
    while let Ok(event) = events.try_recv() {
        aggregate(&mut collectors, event);
    }

    flush(store.as_ref(), &mut collectors).await;
    info!("metrics aggregator stopped");
}

/// Resolves once stop is requested or every handle is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    // The borrowed value is a lock guard and must not outlive this call.
    let _ = stop.wait_for(|stopped| *stopped).await;
}

fn aggregate(collectors: &mut HashMap<ShortCode, VisitCollector>, event: VisitEvent) {
    trace!(code = %event.code, "aggregating visit");
    collectors
        .entry(event.code)
        .or_insert_with_key(|code| VisitCollector::new(code.clone()))
        .record(event.visitor);
}

/// Writes every collector as one batch and clears them, even on failure.
async fn flush<S: MetricsStore>(store: &S, collectors: &mut HashMap<ShortCode, VisitCollector>) {
    if collectors.is_empty() {
        trace!("no visits to flush");
        return;
    }

    let batch: HashMap<ShortCode, VisitCounts> = collectors
        .drain()
        .map(|(code, collector)| (code, collector.counts()))
        .collect();

    match store.create_metrics_batch(&batch).await {
        Ok(()) => debug!(codes = batch.len(), "flushed visit metrics"),
        Err(e) => error!(
            codes = batch.len(),
            error = %e,
            "failed to flush visit metrics, dropping interval"
        ),
    }
}

#[async_trait]
impl<S: MetricsStore> VisitTracker for MetricsAggregator<S> {
    fn record_async(&self, code: ShortCode, visitor: String) {
        MetricsAggregator::record_async(self, code, visitor);
    }

    async fn snapshot(
        &self,
        code: &ShortCode,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<MetricsSnapshot, MetricsError> {
        MetricsAggregator::snapshot(self, code, from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blink_core::StorageError;
    use blink_storage::InMemoryStore;
    use jiff::SignedDuration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const HOUR: Duration = Duration::from_secs(3600);

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn counts(visits: u64, unique_visits: u64) -> VisitCounts {
        VisitCounts {
            visits,
            unique_visits,
        }
    }

    fn config(flush_interval: Duration) -> AggregatorConfig {
        AggregatorConfig::builder()
            .flush_interval(flush_interval)
            .build()
    }

    /// Remembers every batch it is handed.
    #[derive(Clone, Default)]
    struct RecordingStore {
        batches: Arc<std::sync::Mutex<Vec<HashMap<ShortCode, VisitCounts>>>>,
        fail: Arc<AtomicBool>,
    }

    impl RecordingStore {
        fn failing() -> Self {
            let store = Self::default();
            store.fail.store(true, Ordering::SeqCst);
            store
        }

        fn batches(&self) -> Vec<HashMap<ShortCode, VisitCounts>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetricsStore for RecordingStore {
        async fn create_metrics_batch(
            &self,
            batch: &HashMap<ShortCode, VisitCounts>,
        ) -> Result<(), StorageError> {
            self.batches.lock().unwrap().push(batch.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }

        async fn get_metrics(
            &self,
            _code: &ShortCode,
            _from: Timestamp,
            _to: Timestamp,
        ) -> Result<Option<MetricsSnapshot>, StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("connection refused".to_string()));
            }
            Ok(None)
        }
    }

    /// Blocks every batch write until the test hands out permits.
    #[derive(Clone)]
    struct GatedStore {
        inner: RecordingStore,
        gate: Arc<Semaphore>,
        entered: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MetricsStore for GatedStore {
        async fn create_metrics_batch(
            &self,
            batch: &HashMap<ShortCode, VisitCounts>,
        ) -> Result<(), StorageError> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| StorageError::Operation(e.to_string()))?;
            self.inner.create_metrics_batch(batch).await
        }

        async fn get_metrics(
            &self,
            code: &ShortCode,
            from: Timestamp,
            to: Timestamp,
        ) -> Result<Option<MetricsSnapshot>, StorageError> {
            self.inner.get_metrics(code, from, to).await
        }
    }

    fn total_visits(batches: &[HashMap<ShortCode, VisitCounts>], c: &ShortCode) -> u64 {
        batches
            .iter()
            .filter_map(|batch| batch.get(c))
            .map(|counts| counts.visits)
            .sum()
    }

    #[tokio::test]
    async fn aggregates_visits_per_code() {
        let store = RecordingStore::default();
        let aggregator = MetricsAggregator::start(config(HOUR), store.clone()).unwrap();

        for (c, visitor) in [
            ("AAAAAA", "host1"),
            ("AAAAAA", "host2"),
            ("AAAAAA", "host1"),
            ("BBBBBB", "host2"),
        ] {
            let outcome = aggregator.record(code(c), visitor.to_string()).await;
            assert_eq!(outcome, RecordOutcome::Enqueued);
        }
        aggregator.shutdown().await;

        let batches = store.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            HashMap::from([
                (code("AAAAAA"), counts(3, 2)),
                (code("BBBBBB"), counts(1, 1)),
            ])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn flushes_periodically() {
        let store = RecordingStore::default();
        let aggregator =
            MetricsAggregator::start(config(Duration::from_millis(20)), store.clone()).unwrap();

        aggregator.record(code("AAAAAA"), "host1".to_string()).await;

        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
            .until_async(|| async { !store.batches().is_empty() })
            .await;

        assert_eq!(store.batches()[0], HashMap::from([(code("AAAAAA"), counts(1, 1))]));
        aggregator.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn flush_clears_state_even_when_store_fails() {
        let store = RecordingStore::failing();
        let aggregator =
            MetricsAggregator::start(config(Duration::from_millis(20)), store.clone()).unwrap();

        aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
            .until_async(|| async { store.batches().len() == 1 })
            .await;

        aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        aggregator.shutdown().await;

        let batches = store.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], HashMap::from([(code("AAAAAA"), counts(1, 1))]));
    }

    #[tokio::test]
    async fn empty_intervals_are_not_written() {
        let store = RecordingStore::default();
        let aggregator =
            MetricsAggregator::start(config(Duration::from_millis(10)), store.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        aggregator.shutdown().await;

        assert!(store.batches().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_queue_drops_visit_after_timeout() {
        let store = GatedStore {
            inner: RecordingStore::default(),
            gate: Arc::new(Semaphore::new(0)),
            entered: Arc::new(AtomicUsize::new(0)),
        };
        let config = AggregatorConfig::builder()
            .flush_interval(Duration::from_millis(20))
            .queue_capacity(1)
            .record_timeout(Duration::from_millis(50))
            .build();
        let aggregator = MetricsAggregator::start(config, store.clone()).unwrap();

        // Park the task inside a flush so nothing drains the queue.
        aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(5))
            .until_async(|| async { store.entered.load(Ordering::SeqCst) == 1 })
            .await;

        let queued = aggregator.record(code("BBBBBB"), "host1".to_string()).await;
        let dropped = aggregator.record(code("CCCCCC"), "host1".to_string()).await;

        assert_eq!(queued, RecordOutcome::Enqueued);
        assert_eq!(dropped, RecordOutcome::TimedOut);

        store.gate.add_permits(16);
        aggregator.shutdown().await;

        let batches = store.inner.batches();
        assert_eq!(total_visits(&batches, &code("AAAAAA")), 1);
        assert_eq!(total_visits(&batches, &code("BBBBBB")), 1);
        assert_eq!(total_visits(&batches, &code("CCCCCC")), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_all_counted() {
        let store = RecordingStore::default();
        let config = AggregatorConfig::builder()
            .flush_interval(Duration::from_millis(5))
            .queue_capacity(8)
            .record_timeout(Duration::from_secs(5))
            .build();
        let aggregator = MetricsAggregator::start(config, store.clone()).unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|task| {
                let aggregator = aggregator.clone();
                tokio::spawn(async move {
                    let mut enqueued = 0;
                    for _ in 0..50 {
                        let outcome = aggregator
                            .record(code("AAAAAA"), format!("host{task}"))
                            .await;
                        if outcome == RecordOutcome::Enqueued {
                            enqueued += 1;
                        }
                    }
                    enqueued
                })
            })
            .collect();

        let mut enqueued = 0;
        for task in tasks {
            enqueued += task.await.unwrap();
        }
        aggregator.shutdown().await;

        assert_eq!(enqueued, 1600);
        assert_eq!(total_visits(&store.batches(), &code("AAAAAA")), 1600);
    }

    #[tokio::test]
    async fn record_after_stop_is_rejected() {
        let store = RecordingStore::default();
        let aggregator = MetricsAggregator::start(config(HOUR), store.clone()).unwrap();

        aggregator.stop();
        aggregator.stop();
        assert!(aggregator.is_stopped());

        let outcome = aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        assert_eq!(outcome, RecordOutcome::Stopped);

        aggregator.shutdown().await;
        aggregator.shutdown().await;
        assert!(store.batches().is_empty());
    }

    #[tokio::test]
    async fn stop_keeps_visits_accepted_before_it() {
        let store = RecordingStore::default();
        let aggregator = MetricsAggregator::start(config(HOUR), store.clone()).unwrap();

        for _ in 0..100 {
            aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        }
        aggregator.shutdown().await;

        assert_eq!(total_visits(&store.batches(), &code("AAAAAA")), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_every_handle_flushes() {
        let store = RecordingStore::default();
        let aggregator = MetricsAggregator::start(config(HOUR), store.clone()).unwrap();
        let clone = aggregator.clone();

        aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        drop(aggregator);
        drop(clone);

        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
            .until_async(|| async { store.batches().len() == 1 })
            .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn record_async_reaches_the_store() {
        let store = RecordingStore::default();
        let aggregator =
            MetricsAggregator::start(config(Duration::from_millis(20)), store.clone()).unwrap();
        let tracker: Arc<dyn VisitTracker> = Arc::new(aggregator.clone());

        tracker.record_async(code("AAAAAA"), "host1".to_string());

        awaitility::at_most(Duration::from_secs(2))
            .poll_interval(Duration::from_millis(10))
            .until_async(|| async { total_visits(&store.batches(), &code("AAAAAA")) == 1 })
            .await;
        aggregator.shutdown().await;
    }

    #[tokio::test]
    async fn snapshot_without_activity_is_zero() {
        let aggregator = MetricsAggregator::start(config(HOUR), InMemoryStore::new()).unwrap();
        let to = Timestamp::now();
        let from = to - SignedDuration::from_hours(24);

        let snapshot = aggregator.snapshot(&code("AAAAAA"), from, to).await.unwrap();

        assert_eq!(snapshot, MetricsSnapshot::empty(code("AAAAAA"), from, to));
        aggregator.shutdown().await;
    }

    #[tokio::test]
    async fn snapshot_reads_flushed_metrics() {
        let store = InMemoryStore::new();
        let aggregator = MetricsAggregator::start(config(HOUR), store).unwrap();
        let from = Timestamp::now() - SignedDuration::from_hours(1);

        aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        aggregator.record(code("AAAAAA"), "host2".to_string()).await;
        aggregator.record(code("AAAAAA"), "host1".to_string()).await;
        aggregator.shutdown().await;

        let to = Timestamp::now() + SignedDuration::from_hours(1);
        let snapshot = aggregator.snapshot(&code("AAAAAA"), from, to).await.unwrap();

        assert_eq!(snapshot.visits, 3);
        assert_eq!(snapshot.unique_visits, 2);
        assert_eq!((snapshot.from, snapshot.to), (from, to));
    }

    #[tokio::test]
    async fn snapshot_reports_store_failures() {
        let aggregator = MetricsAggregator::start(config(HOUR), RecordingStore::failing()).unwrap();
        let to = Timestamp::now();

        let err = aggregator
            .snapshot(&code("AAAAAA"), to - SignedDuration::from_hours(1), to)
            .await
            .unwrap_err();

        assert!(matches!(err, MetricsError::Unavailable { .. }));
        aggregator.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = AggregatorConfig::builder().queue_capacity(0).build();

        assert!(MetricsAggregator::start(config, RecordingStore::default()).is_err());
    }
}
