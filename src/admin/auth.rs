//! Admin authorization.
//!
//! Runs after the auth interceptor: the principal it attached decides
//! access. Denials are recorded as audit entries.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::request::request_context;
use crate::http::server::AppState;
use crate::intercept::{InterceptError, Layer};
use crate::telemetry::LogEntry;

pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let ctx = match request_context(&request, state.chain.debug()) {
        Ok(ctx) => ctx,
        Err(err) => return InterceptError::internal_from(err).into_response(),
    };

    match ctx.principal() {
        None => InterceptError::unauthenticated("admin endpoints require a credential")
            .into_response(),
        Some(principal) if !principal.admin => {
            state.telemetry.emit(
                LogEntry::audit("admin.denied", "Admin access denied")
                    .with_layer(Layer::Router)
                    .with_module("admin")
                    .with_component("require_admin")
                    .with_actor(Some(principal.user_id.clone()))
                    .with_target(request.uri().path())
                    .with_context(&ctx),
            );
            InterceptError::forbidden("admin privileges required").into_response()
        }
        Some(_) => next.run(request).await,
    }
}
