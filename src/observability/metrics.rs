//! Metrics collection and exposition.
//!
//! # Metrics
//! - `telemetry_entries_accepted_total` (counter): entries enqueued, by category
//! - `telemetry_entries_rejected_total` (counter): entries failing validation
//! - `telemetry_entries_dropped_total` (counter): entries shed, by category and reason
//! - `telemetry_entries_persisted_total` (counter): entries written to the store
//! - `telemetry_write_retries_total` (counter): batch write retries
//! - `telemetry_fallback_entries_total` (counter): entries diverted to the fallback sink
//! - `telemetry_entries_lost_total` (counter): entries neither stored nor diverted
//! - `telemetry_batch_write_seconds` (histogram): store write latency per batch
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until an exporter is installed
//! - Labels are static strings only

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::telemetry::LogCategory;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_accepted(category: LogCategory) {
    counter!("telemetry_entries_accepted_total", "category" => category.as_str()).increment(1);
}

pub fn record_rejected() {
    counter!("telemetry_entries_rejected_total").increment(1);
}

pub fn record_dropped(category: LogCategory, reason: &'static str) {
    counter!(
        "telemetry_entries_dropped_total",
        "category" => category.as_str(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_persisted(category: LogCategory, count: usize, start: Instant) {
    counter!("telemetry_entries_persisted_total", "category" => category.as_str())
        .increment(count as u64);
    histogram!("telemetry_batch_write_seconds", "category" => category.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("telemetry_write_retries_total").increment(1);
}

pub fn record_fallback(category: LogCategory, count: usize) {
    counter!("telemetry_fallback_entries_total", "category" => category.as_str())
        .increment(count as u64);
}

pub fn record_lost(count: usize) {
    counter!("telemetry_entries_lost_total").increment(count as u64);
}
