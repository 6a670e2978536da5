//! Pipeline counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::observability::metrics;
use crate::telemetry::entry::LogCategory;

/// Why an entry never reached the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Shed by the back-pressure policy.
    Backpressure,
    /// The consumer has shut down.
    Closed,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Backpressure => "backpressure",
            DropReason::Closed => "closed",
        }
    }
}

/// Lock-free counters shared by the logging service and its consumer.
#[derive(Debug, Default)]
pub struct PipelineStats {
    accepted: AtomicU64,
    rejected_invalid: AtomicU64,
    dropped_backpressure: [AtomicU64; 5],
    dropped_closed: AtomicU64,
    persisted: AtomicU64,
    retries: AtomicU64,
    fallback_batches: AtomicU64,
    fallback_entries: AtomicU64,
    lost_entries: AtomicU64,
    suppressed_internal: AtomicU64,
    threshold_warnings: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn record_accepted(&self, category: LogCategory) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::record_accepted(category);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected_invalid.fetch_add(1, Ordering::Relaxed);
        metrics::record_rejected();
    }

    pub(crate) fn record_dropped(&self, category: LogCategory, reason: DropReason) {
        match reason {
            DropReason::Backpressure => {
                self.dropped_backpressure[category.index()].fetch_add(1, Ordering::Relaxed);
            }
            DropReason::Closed => {
                self.dropped_closed.fetch_add(1, Ordering::Relaxed);
            }
        }
        metrics::record_dropped(category, reason.as_str());
    }

    pub(crate) fn record_persisted(&self, count: usize) {
        self.persisted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        metrics::record_retry();
    }

    pub(crate) fn record_fallback(&self, category: LogCategory, count: usize) {
        self.fallback_batches.fetch_add(1, Ordering::Relaxed);
        self.fallback_entries.fetch_add(count as u64, Ordering::Relaxed);
        metrics::record_fallback(category, count);
    }

    pub(crate) fn record_lost(&self, count: usize) {
        self.lost_entries.fetch_add(count as u64, Ordering::Relaxed);
        metrics::record_lost(count);
    }

    pub(crate) fn record_suppressed_internal(&self, count: usize) {
        self.suppressed_internal.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_threshold_warnings(&self, count: usize) {
        self.threshold_warnings.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn persisted(&self) -> u64 {
        self.persisted.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted(),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            dropped_backpressure: LogCategory::ALL
                .into_iter()
                .map(|c| (c, self.dropped_backpressure[c.index()].load(Ordering::Relaxed)))
                .collect(),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            persisted: self.persisted(),
            retries: self.retries.load(Ordering::Relaxed),
            fallback_batches: self.fallback_batches.load(Ordering::Relaxed),
            fallback_entries: self.fallback_entries.load(Ordering::Relaxed),
            lost_entries: self.lost_entries.load(Ordering::Relaxed),
            suppressed_internal: self.suppressed_internal.load(Ordering::Relaxed),
            threshold_warnings: self.threshold_warnings.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub rejected_invalid: u64,
    pub dropped_backpressure: BTreeMap<LogCategory, u64>,
    pub dropped_closed: u64,
    pub persisted: u64,
    pub retries: u64,
    pub fallback_batches: u64,
    pub fallback_entries: u64,
    pub lost_entries: u64,
    pub suppressed_internal: u64,
    pub threshold_warnings: u64,
}

impl StatsSnapshot {
    pub fn dropped(&self, category: LogCategory) -> u64 {
        self.dropped_backpressure.get(&category).copied().unwrap_or(0)
    }
}
