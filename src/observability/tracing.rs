//! Request spans.
//!
//! Every request runs inside one span carrying its correlation ids, so the
//! service's own diagnostics can be joined with the persisted log entries.

use ::tracing::{info_span, Span};
use axum::http::Method;

use crate::context::CorrelationContext;

/// Span wrapping one request.
pub fn request_span(ctx: &CorrelationContext, method: &Method, path: &str) -> Span {
    info_span!(
        "request",
        request_id = %ctx.request_id(),
        trace_id = %ctx.trace_id(),
        method = %method,
        path = %path,
    )
}
