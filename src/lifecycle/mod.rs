//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → store + fallback → evaluator → logging service
//!            → consumer task → registry
//!
//! Shutdown (shutdown.rs):
//!     Signal received → server stops accepting → in-flight requests finish
//!     → consumer drains the queue → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the pipeline is running before any traffic arrives
//! - Ordered shutdown: the queue drains only after the server has stopped
//!   producing entries

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
pub use startup::TelemetryRuntime;
