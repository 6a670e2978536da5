//! The contract every layer interceptor implements.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::context::CorrelationContext;
use crate::intercept::error::InterceptError;
use crate::intercept::Layer;

/// Description of the call an interceptor wraps.
#[derive(Debug, Clone, Default)]
pub struct CallInfo {
    /// Logical module owning the call (e.g. "http", "orders").
    pub module: String,
    /// Component inside the module (route pattern, service or repository name).
    pub component: String,
    /// Source file hint for error origin tagging.
    pub file_path: Option<String>,
    /// Bearer credential presented by the caller. Only the auth layer reads it
    /// and it is never logged.
    pub credential: Option<String>,
    /// Free-form attributes copied into the emitted entry's extra_data.
    pub attributes: Map<String, Value>,
}

impl CallInfo {
    pub fn new(module: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            component: component.into(),
            ..Self::default()
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Result of a wrapped call, as seen by `after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome {
    pub elapsed: Duration,
    pub status: Option<u16>,
    pub failed: bool,
    /// The call never finished: its future was dropped by a timeout or a
    /// client disconnect. Always reported as failed.
    pub abandoned: bool,
}

impl CallOutcome {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1_000.0
    }
}

/// Verdict of `before`.
#[derive(Debug)]
pub enum Decision {
    Continue,
    /// Short-circuit the call. The rest of the chain never runs.
    Reject(InterceptError),
}

/// What the chain does with an error after `on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Let the error interceptor record it.
    Rethrow,
    /// The layer recorded it already. The error still fails the call but no
    /// second error log is written.
    Suppress,
}

/// Observation hooks for one layer.
///
/// Hooks are synchronous and must not block: emission goes through the
/// non-blocking logging service.
pub trait Interceptor: Send + Sync {
    fn layer(&self) -> Layer;

    fn before(&self, _ctx: &CorrelationContext, _call: &CallInfo) -> Decision {
        Decision::Continue
    }

    fn after(&self, ctx: &CorrelationContext, call: &CallInfo, outcome: &CallOutcome);

    fn on_error(
        &self,
        _ctx: &CorrelationContext,
        _call: &CallInfo,
        _error: &InterceptError,
    ) -> ErrorAction {
        ErrorAction::Rethrow
    }
}
