//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, body limit, timeout, trace)
//!     → request.rs (correlation context, x-request-id / x-trace-id)
//!     → middleware/error_boundary.rs → middleware/auth.rs → middleware/routing.rs
//!     → handler (service and database calls through `Instrumented`)
//!     → response.rs (failure signal for errors)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{correlation_middleware, X_REQUEST_ID, X_TRACE_ID};
pub use server::{build_router, instrument, AppState, HttpServer, Instrumented};
