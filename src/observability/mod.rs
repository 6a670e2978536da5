//! Observability of the service itself.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured diagnostics via `tracing`)
//!     → metrics.rs (pipeline counters and histograms)
//!     → tracing.rs (request spans carrying correlation ids)
//! ```
//!
//! # Design Decisions
//! - Diagnostics are separate from the persisted telemetry entries; they
//!   never go through the logging queue
//! - Metrics are cheap (atomic increments) and exported only when enabled

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{init_logging, LogError};
pub use metrics::init_metrics;
