//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → threshold rules swapped into the evaluator
//! ```
//!
//! # Design Decisions
//! - Interceptor registration is fixed for the process lifetime; only
//!   threshold rules are hot-reloadable
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, FallbackConfig, InterceptionConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, QueueConfig, RetryConfig, StoreConfig, StoreKind, TelemetryConfig,
    ThresholdRule, TokenConfig,
};
pub use watcher::ConfigWatcher;
