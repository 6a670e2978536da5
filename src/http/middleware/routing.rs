//! Router layer middleware: times the request from route match to response.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::http::request::request_context;
use crate::http::server::AppState;
use crate::intercept::{CallInfo, InterceptError, Layer};

pub async fn routing_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = match request_context(&request, state.chain.debug()) {
        Ok(ctx) => ctx,
        Err(err) => return InterceptError::internal_from(err).into_response(),
    };

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str)
        .to_string();
    let call = CallInfo::new("http", route)
        .with_attribute("method", request.method().as_str())
        .with_attribute("path", request.uri().path());

    let guard = match state.chain.begin_call(Layer::Router, &ctx, call) {
        Ok(guard) => guard,
        Err(rejection) => return rejection.into_response(),
    };

    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<InterceptError>() {
        Some(error) => {
            let error = guard.fail(error);
            response.extensions_mut().insert(error);
        }
        None => guard.complete_with_status(response.status().as_u16()),
    }
    response
}
