//! Failures travelling through the interceptor chain.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::intercept::interceptor::CallInfo;
use crate::intercept::Layer;

/// Classification of a failure, deciding its status code and whether the
/// error interceptor records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthenticated,
    Forbidden,
    NotFound,
    BadRequest,
    Unavailable,
    /// The request outlived its deadline.
    Timeout,
    Internal,
    Panic,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal | ErrorKind::Panic => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code placed in the failure signal.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal | ErrorKind::Panic => "internal_error",
        }
    }

    /// Message shown to callers regardless of the underlying cause.
    pub fn generic_message(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "Authentication required",
            ErrorKind::Forbidden => "Access denied",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::BadRequest => "Invalid request",
            ErrorKind::Unavailable => "Service temporarily unavailable",
            ErrorKind::Timeout => "The request timed out",
            ErrorKind::Internal | ErrorKind::Panic => "An internal error occurred",
        }
    }

    /// Failures caused by the caller. These are answered but never recorded
    /// as error logs.
    pub fn is_client_error(self) -> bool {
        matches!(
            self,
            ErrorKind::Unauthenticated
                | ErrorKind::Forbidden
                | ErrorKind::NotFound
                | ErrorKind::BadRequest
        )
    }
}

/// Where an error was first observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub layer: Layer,
    pub module: String,
    pub component: String,
    pub file_path: Option<String>,
}

impl Origin {
    pub(crate) fn from_call(layer: Layer, call: &CallInfo) -> Self {
        Self {
            layer,
            module: call.module.clone(),
            component: call.component.clone(),
            file_path: call.file_path.clone(),
        }
    }
}

/// An error raised inside an intercepted call.
///
/// Converting it into a response stores a copy in the response extensions,
/// where the error boundary picks it up and answers with a sanitized failure
/// signal.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InterceptError {
    kind: ErrorKind,
    message: String,
    origin: Option<Origin>,
    #[source]
    source: Option<Arc<dyn StdError + Send + Sync>>,
    suppressed: bool,
}

impl InterceptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            origin: None,
            source: None,
            suppressed: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panic, message)
    }

    /// Wrap a lower-level error, keeping it as the source.
    pub fn from_error<E>(kind: ErrorKind, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            kind,
            message: error.to_string(),
            origin: None,
            source: Some(Arc::new(error)),
            suppressed: false,
        }
    }

    /// Shorthand for wrapping an error as an internal failure.
    pub fn internal_from<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from_error(ErrorKind::Internal, error)
    }

    /// Replace the message, keeping the wrapped source.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// True if a layer already handled (recorded) this error.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Messages of the source chain, outermost first.
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = StdError::source(self);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }

    /// One-line stack summary persisted with the error log. A wrapped error
    /// whose message is its source's text is listed once.
    pub fn stack_summary(&self) -> String {
        let mut chain = self.source_chain();
        if chain.first() == Some(&self.message) {
            chain.remove(0);
        }
        std::iter::once(self.message.clone())
            .chain(chain)
            .collect::<Vec<_>>()
            .join(" <- ")
    }

    /// Tag the error with the innermost layer that saw it. Later calls keep
    /// the first tag.
    pub(crate) fn tag_origin(&mut self, origin: Origin) {
        if self.origin.is_none() {
            self.origin = Some(origin);
        }
    }

    pub(crate) fn mark_suppressed(&mut self) {
        self.suppressed = true;
    }
}

impl IntoResponse for InterceptError {
    fn into_response(self) -> Response {
        let mut response = self.kind.status().into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_first_origin_wins() {
        let call = CallInfo::new("orders", "OrderRepository");
        let mut err = InterceptError::internal("boom");
        err.tag_origin(Origin::from_call(Layer::Database, &call));
        err.tag_origin(Origin::from_call(Layer::Service, &call));
        assert_eq!(err.origin().unwrap().layer, Layer::Database);
    }

    #[test]
    fn test_source_chain() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = InterceptError::internal_from(io_err);
        assert_eq!(err.message(), "connection refused");
        assert_eq!(err.source_chain(), vec!["connection refused".to_string()]);
        assert_eq!(err.stack_summary(), "connection refused");
    }

    #[test]
    fn test_stack_summary_keeps_distinct_sources() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = InterceptError::from_error(ErrorKind::Unavailable, io_err)
            .with_message("order lookup failed");
        assert_eq!(err.stack_summary(), "order lookup failed <- connection refused");
    }

    #[test]
    fn test_response_carries_error() {
        let response = InterceptError::forbidden("nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let carried = response.extensions().get::<InterceptError>().unwrap();
        assert_eq!(carried.kind(), ErrorKind::Forbidden);
        assert!(carried.kind().is_client_error());
    }
}
