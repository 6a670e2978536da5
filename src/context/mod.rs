//! Request correlation subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (x-trace-id?)
//!     → correlation.rs begin(): fresh request_id, propagated or minted trace_id
//!     → task-local scope + request extensions (same Arc, shared by reference)
//!     → every interceptor receives &CorrelationContext explicitly
//!     → phase.rs tracks Start → Auth → Router → Service → Database* → Completed/Errored → End
//!     → end() on response
//! ```
//!
//! # Design Decisions
//! - No process-wide "current request": the task-local slot only exists
//!   inside `scope`, so concurrent requests can never observe each other
//! - Work spawned onto other tasks must carry the context explicitly
//! - The principal (and so user_id) is write-once, set by the auth interceptor

pub mod correlation;
pub mod phase;

pub use correlation::{
    begin, current, current_or_adhoc, end, scope, ContextError, CorrelationContext, Principal,
    TRACE_ID_MAX_LEN,
};
pub use phase::RequestPhase;
