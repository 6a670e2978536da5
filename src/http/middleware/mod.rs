//! Interceptor middleware.
//!
//! Each middleware opens a call at one layer of the request's chain. They
//! are stacked so the chain order holds: error boundary outermost, then
//! auth, then routing, with panics caught right around the handler.

pub mod auth;
pub mod error_boundary;
pub mod panic;
pub mod routing;

pub use auth::auth_middleware;
pub use error_boundary::error_boundary;
pub use panic::panic_response;
pub use routing::routing_middleware;
