//! Telemetry pipeline: structured entries from emit to storage.
//!
//! # Data Flow
//! ```text
//! Interceptors / handlers / frontend
//!     → service.rs emit(): validate, fill correlation, evaluate thresholds
//!     → entry.rs LogEntry sealed into an immutable LogRecord
//!     → bounded queue (back-pressure sheds performance, then application)
//!     → consumer.rs batches per category
//!     → storage (retry + deadline) or fallback sink
//! ```
//!
//! # Design Decisions
//! - Emitting never blocks beyond enqueue and never fails the caller
//! - Failures inside the pipeline become system entries, guarded against
//!   recursion
//! - All counters live in stats.rs and mirror into the metrics facade

pub mod consumer;
pub mod entry;
pub mod fields;
pub mod service;
pub mod stats;
pub mod threshold;

pub use consumer::BatchConsumer;
pub use entry::{
    LogCategory, LogDetails, LogEntry, LogRecord, PerformanceDetails, Severity, Source,
    ValidationError,
};
pub use fields::entry_from_fields;
pub use service::{LoggingService, QueueMarks};
pub use stats::{PipelineStats, StatsSnapshot};
pub use threshold::{
    Direction, ResolvedRule, ThresholdConfigurationError, ThresholdEvaluator, BELOW_THRESHOLD,
    THRESHOLD_EXCEEDED,
};
