//! Log entries: the emit input and the sealed record handed to storage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::context::CorrelationContext;
use crate::intercept::Layer;

/// Default unit for performance metrics.
pub const DEFAULT_METRIC_UNIT: &str = "ms";

/// The five persisted log categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Application,
    Error,
    System,
    Performance,
    Audit,
}

impl LogCategory {
    pub const ALL: [LogCategory; 5] = [
        LogCategory::Application,
        LogCategory::Error,
        LogCategory::System,
        LogCategory::Performance,
        LogCategory::Audit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogCategory::Application => "application",
            LogCategory::Error => "error",
            LogCategory::System => "system",
            LogCategory::Performance => "performance",
            LogCategory::Audit => "audit",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Where an entry was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Frontend,
    Backend,
    System,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Frontend => "frontend",
            Source::Backend => "backend",
            Source::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// Performance-specific attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceDetails {
    pub metric_name: String,
    pub metric_value: f64,
    pub metric_unit: String,
    /// Filled by the threshold evaluator at emit time.
    pub threshold: Option<f64>,
    /// Filled by the threshold evaluator at emit time.
    pub performance_issue: Option<String>,
    pub web_vitals: Option<Value>,
}

/// Category-specific attributes. The category of an entry is derived from
/// this, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum LogDetails {
    Application,
    Error {
        severity: Severity,
        stack_trace: Option<String>,
    },
    System {
        subsystem: String,
        status: String,
    },
    Performance(PerformanceDetails),
    Audit {
        action: String,
        actor_id: Option<String>,
        target: Option<String>,
    },
}

impl LogDetails {
    pub fn category(&self) -> LogCategory {
        match self {
            LogDetails::Application => LogCategory::Application,
            LogDetails::Error { .. } => LogCategory::Error,
            LogDetails::System { .. } => LogCategory::System,
            LogDetails::Performance(_) => LogCategory::Performance,
            LogDetails::Audit { .. } => LogCategory::Audit,
        }
    }
}

/// Reasons an entry is rejected before enqueue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("field `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown log category `{0}`")]
    UnknownCategory(String),
}

/// A structured log entry as handed to the logging service.
///
/// Identity and timestamp are normally left empty and assigned at emit
/// time; correlation fields left empty are filled from the active request.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: Option<Uuid>,
    pub source: Option<Source>,
    pub layer: Option<Layer>,
    pub module: Option<String>,
    pub component_name: Option<String>,
    pub trace_id: Option<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub file_path: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub extra_data: Map<String, Value>,
    pub details: LogDetails,
    internal: bool,
}

impl LogEntry {
    /// Bare entry with the given details and nothing else set.
    pub fn with_details(details: LogDetails) -> Self {
        Self {
            id: None,
            source: None,
            layer: None,
            module: None,
            component_name: None,
            trace_id: None,
            request_id: None,
            user_id: None,
            file_path: None,
            message: None,
            created_at: None,
            extra_data: Map::new(),
            details,
            internal: false,
        }
    }

    fn backend(details: LogDetails, message: impl Into<String>) -> Self {
        let mut entry = Self::with_details(details);
        entry.source = Some(Source::Backend);
        entry.message = Some(message.into());
        entry
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::backend(LogDetails::Application, message)
    }

    pub fn error(message: impl Into<String>, severity: Severity) -> Self {
        Self::backend(
            LogDetails::Error {
                severity,
                stack_trace: None,
            },
            message,
        )
    }

    pub fn system(
        subsystem: impl Into<String>,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut entry = Self::backend(
            LogDetails::System {
                subsystem: subsystem.into(),
                status: status.into(),
            },
            message,
        );
        entry.source = Some(Source::System);
        entry
    }

    /// Performance entry; the message defaults to the metric name.
    pub fn performance(metric_name: impl Into<String>, metric_value: f64) -> Self {
        let metric_name = metric_name.into();
        let message = metric_name.clone();
        Self::backend(
            LogDetails::Performance(PerformanceDetails {
                metric_name,
                metric_value,
                metric_unit: DEFAULT_METRIC_UNIT.to_string(),
                threshold: None,
                performance_issue: None,
                web_vitals: None,
            }),
            message,
        )
    }

    pub fn audit(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::backend(
            LogDetails::Audit {
                action: action.into(),
                actor_id: None,
                target: None,
            },
            message,
        )
    }

    pub fn category(&self) -> LogCategory {
        self.details.category()
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component_name = Some(component.into());
        self
    }

    pub fn with_file_path(mut self, path: Option<String>) -> Self {
        self.file_path = path;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra_data.insert(key.into(), value.into());
        self
    }

    pub fn with_extra_map(mut self, extra: Map<String, Value>) -> Self {
        self.extra_data.extend(extra);
        self
    }

    pub fn with_metric_unit(mut self, unit: impl Into<String>) -> Self {
        if let LogDetails::Performance(details) = &mut self.details {
            details.metric_unit = unit.into();
        }
        self
    }

    pub fn with_web_vitals(mut self, vitals: Value) -> Self {
        if let LogDetails::Performance(details) = &mut self.details {
            details.web_vitals = Some(vitals);
        }
        self
    }

    pub fn with_stack_trace(mut self, stack: impl Into<String>) -> Self {
        if let LogDetails::Error { stack_trace, .. } = &mut self.details {
            *stack_trace = Some(stack.into());
        }
        self
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        if let LogDetails::Audit { actor_id, .. } = &mut self.details {
            *actor_id = actor;
        }
        self
    }

    pub fn with_target(mut self, target_ref: impl Into<String>) -> Self {
        if let LogDetails::Audit { target, .. } = &mut self.details {
            *target = Some(target_ref.into());
        }
        self
    }

    /// Copy correlation ids from `ctx`, keeping any already set.
    pub fn with_context(mut self, ctx: &CorrelationContext) -> Self {
        self.fill_context(ctx);
        self
    }

    pub(crate) fn fill_context(&mut self, ctx: &CorrelationContext) {
        if self.request_id.is_none() {
            self.request_id = Some(ctx.request_id().to_string());
        }
        if self.trace_id.is_none() {
            self.trace_id = Some(ctx.trace_id().to_string());
        }
        if self.user_id.is_none() {
            self.user_id = ctx.user_id().map(str::to_string);
        }
    }

    /// Mark as produced by the pipeline itself (recursion guard).
    pub(crate) fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub(crate) fn is_internal(&self) -> bool {
        self.internal
    }

    /// Validate and freeze the entry, assigning identity and timestamp.
    pub(crate) fn seal(self) -> Result<LogRecord, ValidationError> {
        let source = self.source.ok_or(ValidationError::MissingField("source"))?;
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .ok_or(ValidationError::MissingField("message"))?;
        validate_details(&self.details)?;

        Ok(LogRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            source,
            layer: self.layer,
            module: self.module,
            component_name: self.component_name,
            trace_id: self.trace_id,
            request_id: self.request_id,
            user_id: self.user_id,
            file_path: self.file_path,
            message,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            extra_data: self.extra_data,
            details: self.details,
            internal: self.internal,
        })
    }
}

fn require_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

fn validate_details(details: &LogDetails) -> Result<(), ValidationError> {
    match details {
        LogDetails::Application | LogDetails::Error { .. } => Ok(()),
        LogDetails::System { subsystem, status } => {
            require_text(subsystem, "subsystem")?;
            require_text(status, "status")
        }
        LogDetails::Performance(perf) => {
            require_text(&perf.metric_name, "metric_name")?;
            if !perf.metric_value.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: "metric_value",
                    reason: "must be a finite number".to_string(),
                });
            }
            Ok(())
        }
        LogDetails::Audit { action, .. } => require_text(action, "action"),
    }
}

/// An accepted, immutable log record.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    id: Uuid,
    source: Source,
    layer: Option<Layer>,
    module: Option<String>,
    component_name: Option<String>,
    trace_id: Option<String>,
    request_id: Option<String>,
    user_id: Option<String>,
    file_path: Option<String>,
    message: String,
    created_at: DateTime<Utc>,
    extra_data: Map<String, Value>,
    #[serde(flatten)]
    details: LogDetails,
    #[serde(skip)]
    internal: bool,
}

impl LogRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn layer(&self) -> Option<Layer> {
        self.layer
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn component_name(&self) -> Option<&str> {
        self.component_name.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn extra_data(&self) -> &Map<String, Value> {
        &self.extra_data
    }

    pub fn details(&self) -> &LogDetails {
        &self.details
    }

    pub fn category(&self) -> LogCategory {
        self.details.category()
    }

    /// Performance attributes, if this is a performance record.
    pub fn performance(&self) -> Option<&PerformanceDetails> {
        match &self.details {
            LogDetails::Performance(details) => Some(details),
            _ => None,
        }
    }

    /// True for records produced by the pipeline about itself.
    pub fn is_internal(&self) -> bool {
        self.internal
    }
}
