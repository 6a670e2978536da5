//! Panic conversion for `CatchPanicLayer`.

use std::any::Any;

use axum::response::{IntoResponse, Response};

use crate::context;
use crate::intercept::{InterceptError, Origin};

/// Turn a handler panic into an [`InterceptError`] response attributed to
/// the layer the request was in when it panicked.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(panic = %message, "Handler panicked");

    let mut error = InterceptError::panic(message);
    if let Some(layer) = context::current().ok().and_then(|ctx| ctx.last_layer()) {
        error = error.with_origin(Origin {
            layer,
            module: "http".to_string(),
            component: "panic".to_string(),
            file_path: None,
        });
    }
    error.into_response()
}
