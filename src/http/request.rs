//! Request correlation.
//!
//! # Responsibilities
//! - Open a correlation context per request, propagating `x-trace-id`
//! - Bind it to the request task and store it in the request extensions
//! - Echo `x-request-id` and `x-trace-id` on every response
//! - Flag the context as cancelled if the client goes away mid-request
//!
//! # Design Decisions
//! - Runs outside the error boundary so failure responses carry the ids too

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;

use crate::context::{self, ContextError, CorrelationContext};
use crate::observability::tracing::request_span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");

/// Drives a request future and cancels its context if dropped before
/// completion.
///
/// The context is cancelled in `drop` itself, before the wrapped future (and
/// the call guards it holds) is released, so those guards already see the
/// request as cancelled.
struct CancelOnDrop<F> {
    ctx: Arc<CorrelationContext>,
    inner: Pin<Box<F>>,
    done: bool,
}

impl<F> CancelOnDrop<F> {
    fn new(ctx: Arc<CorrelationContext>, inner: F) -> Self {
        Self {
            ctx,
            inner: Box::pin(inner),
            done: false,
        }
    }
}

impl<F: Future> Future for CancelOnDrop<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let output = ready!(self.inner.as_mut().poll(cx));
        self.done = true;
        Poll::Ready(output)
    }
}

impl<F> Drop for CancelOnDrop<F> {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(request_id = %self.ctx.request_id(), "Request cancelled by client");
            self.ctx.cancel();
            self.ctx.end();
        }
    }
}

pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok());
    let ctx = context::begin(incoming);
    let span = request_span(&ctx, request.method(), request.uri().path());
    request.extensions_mut().insert(ctx.clone());

    let scoped = context::scope(ctx.clone(), next.run(request)).instrument(span);
    let mut response = CancelOnDrop::new(ctx.clone(), scoped).await;

    set_correlation_headers(response.headers_mut(), &ctx);
    context::end(&ctx);
    response
}

fn set_correlation_headers(headers: &mut HeaderMap, ctx: &CorrelationContext) {
    if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
        headers.insert(X_REQUEST_ID, value);
    }
    if let Ok(value) = HeaderValue::from_str(ctx.trace_id()) {
        headers.insert(X_TRACE_ID, value);
    }
}

/// The context of `request`, falling back to the task-local one.
pub fn request_context(
    request: &Request,
    strict: bool,
) -> Result<Arc<CorrelationContext>, ContextError> {
    match request.extensions().get::<Arc<CorrelationContext>>() {
        Some(ctx) => Ok(ctx.clone()),
        None => context::current_or_adhoc(strict),
    }
}
