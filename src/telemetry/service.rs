//! The logging service: single funnel from emitters into the queue.
//!
//! # Responsibilities
//! - Validate entries and seal them into immutable records
//! - Fill correlation ids from the active request
//! - Attach threshold verdicts to performance entries
//! - Apply the back-pressure policy and enqueue without blocking
//!
//! # Design Decisions
//! - `emit` never fails and never awaits; every failure is counted
//! - Queue depth is derived from the channel's free permits, so there is
//!   no second counter to drift
//! - Performance entries are shed first, then application entries; error,
//!   audit and system entries survive until the critical mark

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::{QueueConfig, ThresholdRule};
use crate::context;
use crate::telemetry::entry::{
    LogCategory, LogDetails, LogEntry, LogRecord, Source, ValidationError,
};
use crate::telemetry::fields::entry_from_fields;
use crate::telemetry::stats::{DropReason, PipelineStats};
use crate::telemetry::threshold::{ThresholdConfigurationError, ThresholdEvaluator};

/// Absolute queue depths at which each tier is shed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMarks {
    pub capacity: usize,
    pub performance: usize,
    pub application: usize,
    pub critical: usize,
}

impl QueueMarks {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            capacity: config.capacity,
            performance: config.performance_high_water,
            application: config.application_high_water,
            critical: config.critical_high_water,
        }
    }

    /// Depth at which entries of `category` stop being accepted.
    pub fn limit(&self, category: LogCategory) -> usize {
        match category {
            LogCategory::Performance => self.performance,
            LogCategory::Application => self.application,
            LogCategory::Error | LogCategory::Audit | LogCategory::System => self.critical,
        }
    }
}

struct Inner {
    tx: mpsc::Sender<LogRecord>,
    evaluator: Arc<ThresholdEvaluator>,
    stats: Arc<PipelineStats>,
    marks: QueueMarks,
    enqueue_wait: Duration,
}

/// Cheap-to-clone handle to the logging pipeline.
#[derive(Clone)]
pub struct LoggingService {
    inner: Arc<Inner>,
}

impl LoggingService {
    /// Create the service and the receiving end of its queue.
    pub fn new(
        config: &QueueConfig,
        evaluator: Arc<ThresholdEvaluator>,
        stats: Arc<PipelineStats>,
    ) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let service = Self {
            inner: Arc::new(Inner {
                tx,
                evaluator,
                stats,
                marks: QueueMarks::from_config(config),
                enqueue_wait: Duration::from_millis(config.enqueue_wait_ms),
            }),
        };
        (service, rx)
    }

    /// Hand an entry to the pipeline. Returns once it is enqueued, shed or
    /// rejected.
    pub fn emit(&self, entry: LogEntry) {
        if let Some(record) = self.prepare(entry) {
            self.enqueue(record);
        }
    }

    /// Emit from a raw field map (frontend and manual logging).
    pub fn emit_fields(&self, category: LogCategory, fields: Map<String, Value>) {
        match entry_from_fields(category, fields) {
            Ok(entry) => self.emit(entry),
            Err(err) => self.reject(&err, false),
        }
    }

    /// Emit from a raw JSON document. Anything but an object is rejected;
    /// `default_source` fills an absent `source`.
    pub fn emit_json(&self, category: LogCategory, body: &[u8], default_source: Source) {
        let mut fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            _ => {
                let err = ValidationError::WrongType {
                    field: "body".to_string(),
                    expected: "a JSON object",
                };
                self.reject(&err, false);
                return;
            }
        };
        if fields.get("source").map_or(true, Value::is_null) {
            fields.insert("source".into(), Value::from(default_source.as_str()));
        }
        self.emit_fields(category, fields);
    }

    /// Like [`emit`](Self::emit), but error, audit and system entries that
    /// find the queue full wait up to the configured bound for room.
    pub async fn emit_with_wait(&self, entry: LogEntry) {
        let Some(record) = self.prepare(entry) else {
            return;
        };
        if matches!(
            record.category(),
            LogCategory::Performance | LogCategory::Application
        ) {
            self.enqueue(record);
            return;
        }

        let category = record.category();
        if self.depth() >= self.inner.marks.limit(category) {
            self.shed(category);
            return;
        }
        match self.inner.tx.try_send(record) {
            Ok(()) => self.inner.stats.record_accepted(category),
            Err(TrySendError::Closed(_)) => self.inner.stats.record_dropped(category, DropReason::Closed),
            Err(TrySendError::Full(record)) => {
                match tokio::time::timeout(self.inner.enqueue_wait, self.inner.tx.send(record)).await {
                    Ok(Ok(())) => self.inner.stats.record_accepted(category),
                    Ok(Err(_)) => self.inner.stats.record_dropped(category, DropReason::Closed),
                    Err(_) => self.shed(category),
                }
            }
        }
    }

    /// Emit an entry about the pipeline itself. If it cannot be accepted it
    /// is dropped and counted, never reported again.
    pub(crate) fn emit_internal(&self, entry: LogEntry) {
        self.emit(entry.internal());
    }

    /// Swap threshold rules, reporting each invalid rule once as a system
    /// entry.
    pub fn configure_thresholds(
        &self,
        mapping: &BTreeMap<String, ThresholdRule>,
    ) -> Vec<ThresholdConfigurationError> {
        let errors = self.inner.evaluator.configure(mapping);
        self.inner.stats.record_threshold_warnings(errors.len());
        for err in &errors {
            self.emit_internal(
                LogEntry::system("thresholds", "invalid_rule", err.to_string())
                    .with_module("telemetry")
                    .with_component("ThresholdEvaluator")
                    .with_extra("metric_name", err.metric()),
            );
        }
        errors
    }

    pub fn evaluator(&self) -> &ThresholdEvaluator {
        &self.inner.evaluator
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.inner.stats
    }

    pub fn marks(&self) -> QueueMarks {
        self.inner.marks
    }

    /// Entries currently waiting in the queue.
    pub fn depth(&self) -> usize {
        self.inner.tx.max_capacity() - self.inner.tx.capacity()
    }

    fn prepare(&self, mut entry: LogEntry) -> Option<LogRecord> {
        if let Ok(ctx) = context::current() {
            entry.fill_context(&ctx);
        }

        if let LogDetails::Performance(perf) = &mut entry.details {
            let (threshold, issue) = self
                .inner
                .evaluator
                .assess(&perf.metric_name, perf.metric_value);
            perf.threshold = threshold;
            perf.performance_issue = issue.map(str::to_string);
        }

        let internal = entry.is_internal();
        match entry.seal() {
            Ok(record) => Some(record),
            Err(err) => {
                self.reject(&err, internal);
                None
            }
        }
    }

    fn enqueue(&self, record: LogRecord) {
        let category = record.category();
        if self.depth() >= self.inner.marks.limit(category) {
            self.shed(category);
            return;
        }
        match self.inner.tx.try_send(record) {
            Ok(()) => self.inner.stats.record_accepted(category),
            Err(TrySendError::Full(_)) => self.shed(category),
            Err(TrySendError::Closed(_)) => {
                self.inner.stats.record_dropped(category, DropReason::Closed)
            }
        }
    }

    fn shed(&self, category: LogCategory) {
        tracing::trace!(category = %category, depth = self.depth(), "Shedding log entry");
        self.inner.stats.record_dropped(category, DropReason::Backpressure);
    }

    fn reject(&self, err: &ValidationError, internal: bool) {
        if internal {
            tracing::error!(error = %err, "Dropping invalid internal log entry");
            self.inner.stats.record_suppressed_internal(1);
        } else {
            tracing::debug!(error = %err, "Rejected invalid log entry");
            self.inner.stats.record_rejected();
        }
    }
}
