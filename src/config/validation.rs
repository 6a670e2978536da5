//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check queue water marks are ordered and within capacity
//! - Validate value ranges (timeouts > 0, batch sizes > 0)
//! - Check addresses and auth tokens are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Threshold rules are NOT validated here; the evaluator owns that policy
//!   so a bad rule degrades one metric instead of refusing to start

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::TelemetryConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate the configuration, collecting every problem found.
pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    let queue = &config.queue;
    if queue.capacity == 0 {
        errors.push(ValidationError::new("queue.capacity", "must be > 0"));
    }
    if queue.batch_size == 0 {
        errors.push(ValidationError::new("queue.batch_size", "must be > 0"));
    }
    if queue.performance_high_water > queue.application_high_water {
        errors.push(ValidationError::new(
            "queue.performance_high_water",
            "must not exceed application_high_water",
        ));
    }
    if queue.application_high_water > queue.critical_high_water {
        errors.push(ValidationError::new(
            "queue.application_high_water",
            "must not exceed critical_high_water",
        ));
    }
    if queue.critical_high_water > queue.capacity {
        errors.push(ValidationError::new(
            "queue.critical_high_water",
            "must not exceed capacity",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }
    if retries.attempt_timeout_ms == 0 {
        errors.push(ValidationError::new("retries.attempt_timeout_ms", "must be > 0"));
    }

    if config.fallback.path.trim().is_empty() {
        errors.push(ValidationError::new("fallback.path", "must not be empty"));
    }

    let mut seen = HashSet::new();
    for token in &config.auth.tokens {
        if token.token.is_empty() {
            errors.push(ValidationError::new("auth.tokens", "token must not be empty"));
        } else if !seen.insert(token.token.as_str()) {
            errors.push(ValidationError::new(
                "auth.tokens",
                format!("duplicate token for user '{}'", token.user_id),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
