//! Auth layer middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::request::request_context;
use crate::http::server::AppState;
use crate::intercept::{CallInfo, InterceptError, Layer};

/// Bearer token from the `Authorization` header, if well formed.
fn bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = match request_context(&request, state.chain.debug()) {
        Ok(ctx) => ctx,
        Err(err) => return InterceptError::internal_from(err).into_response(),
    };

    let call = CallInfo::new("http", "auth")
        .with_attribute("method", request.method().as_str())
        .with_attribute("path", request.uri().path())
        .with_credential(bearer_token(&request));

    let guard = match state.chain.begin_call(Layer::Auth, &ctx, call) {
        Ok(guard) => guard,
        Err(rejection) => return rejection.into_response(),
    };

    let response = next.run(request).await;
    guard.complete_with_status(response.status().as_u16());
    response
}
