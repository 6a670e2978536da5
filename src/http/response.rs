//! Failure responses.
//!
//! The error boundary answers every failed request with a [`FailureSignal`]
//! serialized as JSON. Its status comes from the error kind; the body never
//! carries internal detail unless debug mode is on.

use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::intercept::FailureSignal;

impl IntoResponse for FailureSignal {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_signal_body() {
        let signal = FailureSignal {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "unavailable",
            message: "Service temporarily unavailable",
            request_id: "req-1".to_string(),
            detail: None,
            stack: None,
        };
        let response = signal.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "unavailable",
                "message": "Service temporarily unavailable",
                "request_id": "req-1",
            })
        );
    }
}
