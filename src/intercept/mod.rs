//! Layered interception.
//!
//! # Data Flow
//! ```text
//! request
//!     → Error boundary (outermost, always on)
//!     → Auth → Router → Service → Database (each optional)
//!     → business code
//! each enabled layer: before → call → after (+ on_error on failure)
//! ```
//!
//! # Design Decisions
//! - The chain is a fixed array indexed by [`Layer`]; nothing is discovered
//!   at runtime
//! - Failures travel as `Result<_, InterceptError>`; the first layer to see
//!   one tags its origin

pub mod chain;
pub mod error;
pub mod interceptor;
pub mod layer;
pub mod layers;
pub mod registry;

pub use chain::{CallGuard, InterceptorChain};
pub use error::{ErrorKind, InterceptError, Origin};
pub use interceptor::{CallInfo, CallOutcome, Decision, ErrorAction, Interceptor};
pub use layer::Layer;
pub use layers::{Authenticator, ErrorInterceptor, FailureSignal, StaticTokenAuthenticator};
pub use registry::{Registry, ServiceHandle};
