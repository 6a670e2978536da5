//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the telemetry
//! service. All types derive Serde traits for deserialization from config files.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::intercept::Layer;
use crate::telemetry::threshold::Direction;

/// Root configuration for the instrumented admin service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Interceptor chain registration settings.
    pub interception: InterceptionConfig,

    /// Authentication settings consumed by the auth interceptor.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging queue sizing and back-pressure marks.
    pub queue: QueueConfig,

    /// Retry policy for batch writes.
    pub retries: RetryConfig,

    /// Persistent log store selection.
    pub store: StoreConfig,

    /// Fallback sink used when the store stays unavailable.
    pub fallback: FallbackConfig,

    /// Performance thresholds keyed by metric name.
    pub thresholds: BTreeMap<String, ThresholdRule>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin endpoints.
    pub admin: AdminConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            interception: InterceptionConfig::default(),
            auth: AuthConfig::default(),
            timeouts: TimeoutConfig::default(),
            queue: QueueConfig::default(),
            retries: RetryConfig::default(),
            store: StoreConfig::default(),
            fallback: FallbackConfig::default(),
            thresholds: default_thresholds(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Registration configuration for the interceptor chain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct InterceptionConfig {
    /// Include failure details in responses and fail loudly on missing contexts.
    pub debug: bool,

    /// Layers whose interceptors run. The error interceptor always runs.
    pub enabled_layers: BTreeSet<Layer>,
}

impl Default for InterceptionConfig {
    fn default() -> Self {
        Self {
            debug: false,
            enabled_layers: Layer::ALL.into_iter().collect(),
        }
    }
}

impl InterceptionConfig {
    /// Returns true if the given layer should be intercepted.
    pub fn is_enabled(&self, layer: Layer) -> bool {
        self.enabled_layers.contains(&layer)
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path prefixes that bypass authentication.
    pub public_paths: Vec<String>,

    /// Static bearer tokens accepted by the built-in authenticator.
    pub tokens: Vec<TokenConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_paths: vec!["/health".to_string()],
            tokens: Vec::new(),
        }
    }
}

/// A bearer token mapped to a principal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Opaque bearer token.
    pub token: String,

    /// User id attached to the correlation context.
    pub user_id: String,

    /// Grants access to the admin endpoints.
    #[serde(default)]
    pub admin: bool,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Logging queue configuration.
///
/// Water marks are absolute queue depths and must satisfy
/// `performance_high_water <= application_high_water <= critical_high_water <= capacity`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of enqueued entries.
    pub capacity: usize,

    /// Depth at which performance entries are shed.
    pub performance_high_water: usize,

    /// Depth at which application entries are shed.
    pub application_high_water: usize,

    /// Depth at which error, audit and system entries are shed.
    pub critical_high_water: usize,

    /// Maximum number of entries drained per consumer batch.
    pub batch_size: usize,

    /// Bounded wait for high-priority entries when the queue is full.
    pub enqueue_wait_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            performance_high_water: 7_000,
            application_high_water: 8_500,
            critical_high_water: 10_000,
            batch_size: 256,
            enqueue_wait_ms: 2,
        }
    }
}

/// Retry configuration for batch writes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of write attempts per batch (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Deadline for a single write attempt in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 50,
            max_delay_ms: 2_000,
            attempt_timeout_ms: 5_000,
        }
    }
}

/// Which store adapter receives batches.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// In-process tables (development, tests).
    #[default]
    Memory,
    /// One append-only JSON-lines file per table.
    Jsonl,
}

/// Persistent store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Directory holding the table files (jsonl store only).
    pub directory: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            directory: "logs/tables".to_string(),
        }
    }
}

/// Fallback sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Append-only file receiving batches the store rejected.
    pub path: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            path: "logs/telemetry-fallback.jsonl".to_string(),
        }
    }
}

/// Raw threshold rule as written in the config file.
///
/// Both fields are optional at the serde level so incomplete rules reach the
/// evaluator, which reports them once and leaves the metric unflagged.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct ThresholdRule {
    pub threshold: Option<f64>,
    pub direction: Option<Direction>,
}

impl ThresholdRule {
    pub fn new(threshold: f64, direction: Direction) -> Self {
        Self {
            threshold: Some(threshold),
            direction: Some(direction),
        }
    }
}

/// Default metric thresholds.
pub fn default_thresholds() -> BTreeMap<String, ThresholdRule> {
    use Direction::{GreaterIsWorse, LesserIsWorse};

    [
        ("http.request_duration", 1_000.0, GreaterIsWorse),
        ("service.duration", 500.0, GreaterIsWorse),
        ("database.query_time", 200.0, GreaterIsWorse),
        ("web_vitals.lcp", 2_500.0, GreaterIsWorse),
        ("web_vitals.fcp", 1_800.0, GreaterIsWorse),
        ("web_vitals.fid", 100.0, GreaterIsWorse),
        ("web_vitals.inp", 200.0, GreaterIsWorse),
        ("web_vitals.ttfb", 800.0, GreaterIsWorse),
        ("web_vitals.cls", 0.1, GreaterIsWorse),
        ("cache.hit_ratio", 0.8, LesserIsWorse),
    ]
    .into_iter()
    .map(|(name, threshold, direction)| (name.to_string(), ThresholdRule::new(threshold, direction)))
    .collect()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logging.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Output format for the service's own diagnostics.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
