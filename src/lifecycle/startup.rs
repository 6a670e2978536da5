//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the store, fallback sink, evaluator and logging service
//! - Spawn the batch consumer
//! - Hand out registered interceptor chains and HTTP state
//! - Stop the pipeline, draining the queue
//!
//! # Design Decisions
//! - Subsystems initialize in order, not concurrently
//! - Lifecycle transitions are themselves recorded as system entries

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::config::{StoreKind, TelemetryConfig};
use crate::http::server::AppState;
use crate::intercept::{Registry, ServiceHandle, StaticTokenAuthenticator};
use crate::lifecycle::shutdown::Shutdown;
use crate::storage::{FallbackSink, JsonlLogStore, LogStore, MemoryLogStore};
use crate::telemetry::{BatchConsumer, LogEntry, LoggingService, PipelineStats, ThresholdEvaluator};

/// The running telemetry pipeline.
pub struct TelemetryRuntime {
    config: Arc<TelemetryConfig>,
    telemetry: LoggingService,
    registry: Registry,
    shutdown: Shutdown,
    consumer: JoinHandle<()>,
    started_at: Instant,
}

impl TelemetryRuntime {
    /// Start with the store selected in `config`.
    pub fn start(config: TelemetryConfig) -> Self {
        let store: Arc<dyn LogStore> = match config.store.kind {
            StoreKind::Memory => Arc::new(MemoryLogStore::new()),
            StoreKind::Jsonl => Arc::new(JsonlLogStore::new(&config.store.directory)),
        };
        Self::start_with_store(config, store)
    }

    /// Start with an explicit store (tests, embedding services).
    pub fn start_with_store(config: TelemetryConfig, store: Arc<dyn LogStore>) -> Self {
        let config = Arc::new(config);
        let stats = Arc::new(PipelineStats::default());
        let evaluator = Arc::new(ThresholdEvaluator::new());

        let (telemetry, rx) = LoggingService::new(&config.queue, evaluator, stats.clone());
        telemetry.configure_thresholds(&config.thresholds);

        let shutdown = Shutdown::new();
        let consumer = BatchConsumer::new(
            rx,
            store.clone(),
            FallbackSink::new(&config.fallback.path),
            stats,
            config.retries.clone(),
            config.queue.batch_size,
        );
        let consumer = tokio::spawn(consumer.run(shutdown.subscribe()));

        let registry = Registry::new(
            telemetry.clone(),
            Arc::new(StaticTokenAuthenticator::from_config(&config.auth)),
            config.auth.public_paths.clone(),
        );

        tracing::info!(
            store = store.name(),
            queue_capacity = config.queue.capacity,
            fallback = %config.fallback.path,
            "Telemetry pipeline started"
        );
        telemetry.emit(
            LogEntry::system("lifecycle", "started", "Telemetry pipeline started")
                .with_module("lifecycle")
                .with_component("TelemetryRuntime")
                .with_extra("store", store.name()),
        );

        Self {
            config,
            telemetry,
            registry,
            shutdown,
            consumer,
            started_at: Instant::now(),
        }
    }

    pub fn telemetry(&self) -> &LoggingService {
        &self.telemetry
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &Arc<TelemetryConfig> {
        &self.config
    }

    /// Register `handle` (idempotent) and build the state its HTTP
    /// surface runs with.
    pub fn app_state(&self, handle: &ServiceHandle) -> AppState {
        AppState {
            service: Arc::from(handle.name()),
            chain: self.registry.register(handle, &self.config.interception),
            telemetry: self.telemetry.clone(),
            config: self.config.clone(),
            started_at: self.started_at,
        }
    }

    /// Stop the consumer once everything enqueued so far is persisted.
    pub async fn shutdown(self) {
        self.telemetry.emit(
            LogEntry::system("lifecycle", "stopping", "Telemetry pipeline stopping")
                .with_module("lifecycle")
                .with_component("TelemetryRuntime")
                .with_extra("uptime_secs", self.started_at.elapsed().as_secs()),
        );
        self.shutdown.trigger();

        if let Err(e) = self.consumer.await {
            tracing::error!(error = %e, "Log consumer task failed");
        }
        let stats = self.telemetry.stats().snapshot();
        tracing::info!(
            persisted = stats.persisted,
            fallback_entries = stats.fallback_entries,
            lost_entries = stats.lost_entries,
            "Telemetry pipeline stopped"
        );
    }
}
