//! Error interceptor middleware: the outermost layer of the chain.
//!
//! Any response carrying an [`InterceptError`] is replaced by the sanitized
//! failure signal. Everything else passes through untouched. The request
//! deadline is enforced here, so a timed-out request is recorded like any
//! other failure.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::request::request_context;
use crate::http::server::AppState;
use crate::intercept::InterceptError;

pub async fn error_boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ctx = match request_context(&request, state.chain.debug()) {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!(error = %err, "Request reached the error boundary without a context");
            return InterceptError::internal_from(err).into_response();
        }
    };

    let deadline = Duration::from_secs(state.config.timeouts.request_secs);
    let error = match tokio::time::timeout(deadline, next.run(request)).await {
        Ok(mut response) => match response.extensions_mut().remove::<InterceptError>() {
            Some(error) => error,
            None => return response,
        },
        Err(_) => {
            tracing::warn!(
                request_id = %ctx.request_id(),
                deadline_secs = deadline.as_secs(),
                last_layer = ctx.last_layer().map_or("none", |l| l.as_str()),
                "Request deadline elapsed"
            );
            InterceptError::timeout(format!(
                "request exceeded its {}s deadline",
                deadline.as_secs()
            ))
        }
    };

    state
        .chain
        .error_interceptor()
        .capture(&ctx, &error)
        .into_response()
}
