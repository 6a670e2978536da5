//! Background consumer draining the log queue into the store.
//!
//! # Data Flow
//! ```text
//! mpsc queue
//!     → recv_many (up to batch_size)
//!     → group by category (insertion order kept inside each group)
//!     → LogStore::write_batch with per-attempt deadline + bounded retries
//!     → on exhaustion: FallbackSink::append + one internal system entry
//! ```
//!
//! # Design Decisions
//! - Failure notices about the pipeline are written with the next batch
//!   instead of going back through the queue, so a full or closed queue
//!   cannot swallow them. Without new traffic they are flushed on their own
//!   once the consumer has been idle for the notice interval
//! - Internal records in a failed batch are dropped and counted rather
//!   than reported again
//! - On shutdown the queue is closed and drained completely before exit

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::retries::retry_with_backoff;
use crate::resilience::timeouts::with_deadline;
use crate::storage::{FallbackSink, LogStore, PersistenceError};
use crate::telemetry::entry::{LogCategory, LogEntry, LogRecord};
use crate::telemetry::stats::PipelineStats;

/// Idle time after which pending failure notices are flushed on their own.
pub const NOTICE_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub struct BatchConsumer {
    rx: mpsc::Receiver<LogRecord>,
    store: Arc<dyn LogStore>,
    fallback: FallbackSink,
    stats: Arc<PipelineStats>,
    retry: RetryConfig,
    batch_size: usize,
    notice_interval: Duration,
    pending_internal: Vec<LogRecord>,
}

impl BatchConsumer {
    pub fn new(
        rx: mpsc::Receiver<LogRecord>,
        store: Arc<dyn LogStore>,
        fallback: FallbackSink,
        stats: Arc<PipelineStats>,
        retry: RetryConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            rx,
            store,
            fallback,
            stats,
            retry,
            batch_size: batch_size.max(1),
            notice_interval: NOTICE_FLUSH_INTERVAL,
            pending_internal: Vec::new(),
        }
    }

    pub fn with_notice_interval(mut self, interval: Duration) -> Self {
        self.notice_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Consume until the queue closes or shutdown is signalled, then drain.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            store = self.store.name(),
            batch_size = self.batch_size,
            "Log consumer started"
        );
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut notices = tokio::time::interval_at(
            tokio::time::Instant::now() + self.notice_interval,
            self.notice_interval,
        );
        notices.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.rx.recv_many(&mut batch, self.batch_size) => {
                    if received == 0 {
                        break;
                    }
                    self.flush(&mut batch).await;
                    notices.reset();
                }
                _ = notices.tick(), if !self.pending_internal.is_empty() => {
                    tracing::debug!(
                        notices = self.pending_internal.len(),
                        "Flushing pending failure notices"
                    );
                    self.flush(&mut batch).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Log consumer draining queue");
                    self.rx.close();
                    while self.rx.recv_many(&mut batch, self.batch_size).await > 0 {
                        self.flush(&mut batch).await;
                    }
                    break;
                }
            }
        }

        if !self.pending_internal.is_empty() {
            self.flush(&mut batch).await;
        }
        tracing::info!(persisted = self.stats.persisted(), "Log consumer stopped");
    }

    /// Write one drained batch, grouped by category.
    pub async fn flush(&mut self, batch: &mut Vec<LogRecord>) {
        let mut groups: BTreeMap<LogCategory, Vec<LogRecord>> = BTreeMap::new();
        for record in self.pending_internal.drain(..).chain(batch.drain(..)) {
            groups.entry(record.category()).or_default().push(record);
        }

        for (category, records) in groups {
            let started = Instant::now();
            match self.write_with_retry(category, &records).await {
                Ok(()) => {
                    self.stats.record_persisted(records.len());
                    metrics::record_persisted(category, records.len(), started);
                }
                Err(err) => self.divert(category, records, err).await,
            }
        }
    }

    async fn write_with_retry(
        &self,
        category: LogCategory,
        records: &[LogRecord],
    ) -> Result<(), PersistenceError> {
        let deadline = Duration::from_millis(self.retry.attempt_timeout_ms);
        let store = &self.store;
        let stats = &self.stats;
        retry_with_backoff(
            &self.retry,
            "write_batch",
            move |_| with_deadline(deadline, store.write_batch(category, records)),
            |attempt, err| {
                stats.record_retry();
                tracing::warn!(
                    category = %category,
                    attempt,
                    error = %err,
                    "Batch write failed, retrying"
                );
            },
        )
        .await
    }

    async fn divert(&mut self, category: LogCategory, records: Vec<LogRecord>, err: PersistenceError) {
        let (internal, records): (Vec<_>, Vec<_>) =
            records.into_iter().partition(LogRecord::is_internal);

        if !internal.is_empty() {
            tracing::error!(
                dropped = internal.len(),
                error = %err,
                "Dropping internal log records after failed write"
            );
            self.stats.record_suppressed_internal(internal.len());
        }
        if records.is_empty() {
            return;
        }

        let status = match self.fallback.append(category, &records).await {
            Ok(written) => {
                self.stats.record_fallback(category, written);
                tracing::error!(
                    category = %category,
                    entries = written,
                    path = ?self.fallback.path(),
                    error = %err,
                    "Store unavailable, batch written to fallback sink"
                );
                "fallback"
            }
            Err(fallback_err) => {
                self.stats.record_lost(records.len());
                tracing::error!(
                    category = %category,
                    entries = records.len(),
                    error = %err,
                    fallback_error = %fallback_err,
                    "Store and fallback sink both failed, batch lost"
                );
                "lost"
            }
        };

        let notice = LogEntry::system(
            "logging",
            status,
            format!(
                "{} {} entries not persisted after {} attempts: {}",
                records.len(),
                category,
                self.retry.max_attempts.max(1),
                err
            ),
        )
        .with_module("telemetry")
        .with_component("BatchConsumer")
        .with_extra("category", category.as_str())
        .with_extra("entries", records.len())
        .internal();

        match notice.seal() {
            Ok(record) => self.pending_internal.push(record),
            Err(e) => {
                tracing::error!(error = %e, "Invalid failure notice");
                self.stats.record_suppressed_internal(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryLogStore;
    use crate::telemetry::Severity;

    fn consumer(
        store: Arc<MemoryLogStore>,
        dir: &tempfile::TempDir,
    ) -> (BatchConsumer, mpsc::Sender<LogRecord>, Arc<PipelineStats>) {
        let (tx, rx) = mpsc::channel(64);
        let stats = Arc::new(PipelineStats::default());
        let retry = RetryConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            attempt_timeout_ms: 200,
        };
        let consumer = BatchConsumer::new(
            rx,
            store,
            FallbackSink::new(dir.path().join("fallback.jsonl")),
            stats.clone(),
            retry,
            16,
        );
        (consumer, tx, stats)
    }

    fn record(message: &str) -> LogRecord {
        LogEntry::application(message).seal().unwrap()
    }

    #[tokio::test]
    async fn test_batches_grouped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryLogStore::new());
        let (mut consumer, _tx, stats) = consumer(store.clone(), &dir);

        let mut batch = vec![
            record("a1"),
            LogEntry::error("e1", Severity::Error).seal().unwrap(),
            record("a2"),
            record("a3"),
        ];
        consumer.flush(&mut batch).await;

        let messages: Vec<String> = store
            .records(LogCategory::Application)
            .iter()
            .map(|r| r.message().to_string())
            .collect();
        assert_eq!(messages, vec!["a1", "a2", "a3"]);
        assert_eq!(store.len(LogCategory::Error), 1);
        assert_eq!(stats.persisted(), 4);
        assert_eq!(store.write_attempts(), 2);
    }

    #[tokio::test]
    async fn test_outage_diverts_then_reports() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryLogStore::new());
        let (mut consumer, _tx, stats) = consumer(store.clone(), &dir);

        store.set_available(false);
        let mut batch = vec![record("a1"), record("a2")];
        consumer.flush(&mut batch).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.fallback_batches, 1);
        assert_eq!(snapshot.fallback_entries, 2);

        store.set_available(true);
        consumer.flush(&mut Vec::new()).await;
        let system = store.records(LogCategory::System);
        assert_eq!(system.len(), 1);
        assert!(system[0].is_internal());
        assert!(system[0].message().starts_with("2 application entries"));
    }

    #[tokio::test]
    async fn test_failed_internal_records_are_not_reported_again() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryLogStore::new());
        let (mut consumer, _tx, stats) = consumer(store.clone(), &dir);

        store.set_available(false);
        consumer.flush(&mut vec![record("a1")]).await;
        // The notice about a1 fails too and must not produce another notice.
        consumer.flush(&mut Vec::new()).await;
        consumer.flush(&mut Vec::new()).await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.suppressed_internal, 1);
        assert_eq!(snapshot.fallback_entries, 1);
        store.set_available(true);
        consumer.flush(&mut Vec::new()).await;
        assert_eq!(store.total(), 0);
    }

    #[tokio::test]
    async fn test_notice_flushed_without_new_traffic() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryLogStore::new());
        let (consumer, tx, stats) = consumer(store.clone(), &dir);
        let consumer = consumer.with_notice_interval(Duration::from_millis(100));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        store.set_available(false);
        let handle = tokio::spawn(consumer.run(shutdown_rx));
        tx.send(record("a1")).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while stats.snapshot().fallback_entries == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(stats.snapshot().fallback_entries, 1);
        store.set_available(true);

        // Nothing else is sent: the notice goes out on the idle tick.
        let deadline = Instant::now() + Duration::from_secs(5);
        while store.len(LogCategory::System) == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let system = store.records(LogCategory::System);
        assert_eq!(system.len(), 1);
        assert!(system[0].message().starts_with("1 application entries"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(store.len(LogCategory::System), 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryLogStore::new());
        let (consumer, tx, stats) = consumer(store.clone(), &dir);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        for i in 0..40 {
            tx.try_send(record(&format!("m{i}"))).unwrap();
        }
        shutdown_tx.send(()).unwrap();
        consumer.run(shutdown_rx).await;

        assert_eq!(store.len(LogCategory::Application), 40);
        assert_eq!(stats.persisted(), 40);
        assert!(tx.try_send(record("late")).is_err());
    }
}
