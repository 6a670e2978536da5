//! Built-in interceptors, one per layer plus the outermost error boundary.

pub mod auth;
pub mod database;
pub mod error;
pub mod router;
pub mod service;

pub use auth::{AuthInterceptor, Authenticator, StaticTokenAuthenticator};
pub use database::DatabaseInterceptor;
pub use error::{ErrorInterceptor, FailureSignal};
pub use router::RouterInterceptor;
pub use service::ServiceInterceptor;
