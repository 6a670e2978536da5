//! Error boundary: the outermost interceptor.
//!
//! # Responsibilities
//! - Record each unhandled failure as exactly one error log, attributed to
//!   the layer that first saw it
//! - Turn any failure into a sanitized [`FailureSignal`]
//! - Move the request into the `Errored` phase
//!
//! # Design Decisions
//! - Caller errors (401/403/404/400) and errors a layer suppressed are
//!   answered without an error log
//! - Details of the cause reach the caller only in debug mode

use axum::http::StatusCode;
use serde::Serialize;

use crate::context::{CorrelationContext, RequestPhase};
use crate::intercept::error::{ErrorKind, InterceptError};
use crate::telemetry::{LogEntry, LoggingService, Severity};

/// Body returned to the caller for a failed request.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSignal {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: &'static str,
    pub message: &'static str,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ErrorInterceptor {
    telemetry: LoggingService,
    debug: bool,
}

impl ErrorInterceptor {
    pub fn new(telemetry: LoggingService, debug: bool) -> Self {
        Self { telemetry, debug }
    }

    /// Record `error` if needed and build the signal answered to the caller.
    pub fn capture(&self, ctx: &CorrelationContext, error: &InterceptError) -> FailureSignal {
        let kind = error.kind();
        ctx.advance(RequestPhase::Errored);

        if !kind.is_client_error() && !error.is_suppressed() {
            self.record(ctx, error);
        }

        FailureSignal {
            status: kind.status(),
            error: kind.code(),
            message: kind.generic_message(),
            request_id: ctx.request_id().to_string(),
            detail: self.debug.then(|| error.message().to_string()),
            stack: self.debug.then(|| error.source_chain()),
        }
    }

    fn record(&self, ctx: &CorrelationContext, error: &InterceptError) {
        let severity = match error.kind() {
            ErrorKind::Panic => Severity::Critical,
            _ => Severity::Error,
        };
        let origin = error.origin();
        let layer = origin.map(|o| o.layer).or_else(|| ctx.last_layer());

        tracing::error!(
            request_id = %ctx.request_id(),
            trace_id = %ctx.trace_id(),
            layer = layer.map_or("none", |l| l.as_str()),
            error = %error,
            "Unhandled request failure"
        );

        let mut entry = LogEntry::error(error.message(), severity)
            .with_stack_trace(error.stack_summary())
            .with_extra("error_code", error.kind().code())
            .with_context(ctx);
        if let Some(layer) = layer {
            entry = entry.with_layer(layer);
        }
        if let Some(origin) = origin {
            entry = entry
                .with_module(origin.module.clone())
                .with_component(origin.component.clone())
                .with_file_path(origin.file_path.clone());
        }
        self.telemetry.emit(entry);
    }
}
