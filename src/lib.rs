//! Request interception and telemetry pipeline for an admin service.
//!
//! Interceptors observe each request at the auth, router, service and
//! database layers and feed structured entries into a non-blocking logging
//! pipeline that persists them in five category tables.

// Request path
pub mod context;
pub mod http;
pub mod intercept;

// Telemetry pipeline
pub mod storage;
pub mod telemetry;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::TelemetryConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, TelemetryRuntime};
