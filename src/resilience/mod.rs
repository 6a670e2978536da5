//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Consumer batch write:
//!     → timeouts.rs (deadline per attempt)
//!     → On failure: retries.rs (bounded attempts)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every store call has a deadline
//! - Retries are bounded; exhaustion hands the batch to the fallback sink
//! - Jittered backoff prevents synchronized retry bursts

pub mod backoff;
pub mod retries;
pub mod timeouts;
