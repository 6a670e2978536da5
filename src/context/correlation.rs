//! Correlation context: request-scoped identifiers.
//!
//! # Responsibilities
//! - Mint a unique request id per request
//! - Propagate a valid incoming trace id or mint a new one
//! - Bind the context to the executing task for implicit lookups
//! - Track request phase and cancellation

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use uuid::Uuid;

use crate::context::phase::{PhaseTracker, RequestPhase};
use crate::intercept::Layer;

/// Longest accepted incoming trace id.
pub const TRACE_ID_MAX_LEN: usize = 128;

tokio::task_local! {
    static CURRENT: Arc<CorrelationContext>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("no correlation context is active for the current task")]
    NoActiveContext,
}

/// Authenticated caller attached to a request by the auth interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub admin: bool,
}

/// Identifiers shared by every log entry emitted while serving one request.
#[derive(Debug)]
pub struct CorrelationContext {
    request_id: String,
    trace_id: String,
    principal: OnceLock<Principal>,
    phase: PhaseTracker,
    cancelled: AtomicBool,
    adhoc: bool,
}

impl CorrelationContext {
    fn new(trace_id: String, adhoc: bool) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            trace_id,
            principal: OnceLock::new(),
            phase: PhaseTracker::new(),
            cancelled: AtomicBool::new(false),
            adhoc,
        }
    }

    /// Create a context for a new request.
    ///
    /// The incoming trace id is kept only if it is well formed; otherwise a
    /// fresh one is minted.
    pub fn begin(incoming_trace_id: Option<&str>) -> Arc<Self> {
        let trace_id = incoming_trace_id
            .filter(|id| is_valid_trace_id(id))
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Arc::new(Self::new(trace_id, false))
    }

    /// Context minted outside any request (production degradation path).
    pub fn adhoc() -> Arc<Self> {
        Arc::new(Self::new(Uuid::new_v4().to_string(), true))
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.principal.get().map(|p| p.user_id.as_str())
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.get()
    }

    /// Attach the authenticated caller. Returns false if one was already set.
    pub fn set_principal(&self, principal: Principal) -> bool {
        self.principal.set(principal).is_ok()
    }

    pub fn is_adhoc(&self) -> bool {
        self.adhoc
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase.get()
    }

    /// Move the request to `next`. Illegal transitions are ignored.
    pub fn advance(&self, next: RequestPhase) -> bool {
        let moved = self.phase.advance(next);
        if !moved {
            tracing::trace!(
                request_id = %self.request_id,
                from = ?self.phase.get(),
                to = ?next,
                "Ignoring phase transition"
            );
        }
        moved
    }

    /// Innermost layer the request has entered so far.
    pub fn last_layer(&self) -> Option<Layer> {
        self.phase.last_layer()
    }

    /// Mark the request as abandoned by its client.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Release the context: the request reaches its terminal phase.
    pub fn end(&self) {
        if self.phase.get() != RequestPhase::Errored {
            self.phase.advance(RequestPhase::Completed);
        }
        self.phase.advance(RequestPhase::End);
    }
}

fn is_valid_trace_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= TRACE_ID_MAX_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Create a context for a new request.
pub fn begin(incoming_trace_id: Option<&str>) -> Arc<CorrelationContext> {
    CorrelationContext::begin(incoming_trace_id)
}

/// Release a request's context.
pub fn end(ctx: &CorrelationContext) {
    ctx.end();
}

/// Run `future` with `ctx` bound as the current context of this task.
pub async fn scope<F>(ctx: Arc<CorrelationContext>, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(ctx, future).await
}

/// The context bound to the currently executing request.
pub fn current() -> Result<Arc<CorrelationContext>, ContextError> {
    CURRENT
        .try_with(Arc::clone)
        .map_err(|_| ContextError::NoActiveContext)
}

/// Like [`current`], but outside `strict` mode a missing context degrades to
/// an ad-hoc one instead of failing.
pub fn current_or_adhoc(strict: bool) -> Result<Arc<CorrelationContext>, ContextError> {
    match current() {
        Ok(ctx) => Ok(ctx),
        Err(err) if strict => {
            tracing::error!(error = %err, "Correlation context requested outside a request");
            Err(err)
        }
        Err(_) => {
            let ctx = CorrelationContext::adhoc();
            tracing::warn!(
                request_id = %ctx.request_id(),
                "No active correlation context, using ad-hoc context"
            );
            Ok(ctx)
        }
    }
}
