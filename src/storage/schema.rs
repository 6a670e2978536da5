//! Persisted table layout.
//!
//! Five tables share the common columns; each adds its category columns.
//! `deleted_at` is reserved for out-of-band soft deletion and always
//! written as null.

use serde_json::{Map, Value};

use crate::telemetry::{LogCategory, LogDetails, LogRecord};

pub const COMMON_COLUMNS: [&str; 13] = [
    "id",
    "source",
    "module",
    "component_name",
    "trace_id",
    "request_id",
    "user_id",
    "file_path",
    "layer",
    "created_at",
    "message",
    "extra_data",
    "deleted_at",
];

pub fn table_name(category: LogCategory) -> &'static str {
    match category {
        LogCategory::Application => "application_logs",
        LogCategory::Error => "error_logs",
        LogCategory::System => "system_logs",
        LogCategory::Performance => "performance_logs",
        LogCategory::Audit => "audit_logs",
    }
}

pub fn category_columns(category: LogCategory) -> &'static [&'static str] {
    match category {
        LogCategory::Application => &[],
        LogCategory::Error => &["severity", "stack_trace"],
        LogCategory::System => &["subsystem", "status"],
        LogCategory::Performance => &[
            "metric_name",
            "metric_value",
            "metric_unit",
            "threshold",
            "performance_issue",
            "web_vitals",
        ],
        LogCategory::Audit => &["action", "actor_id", "target"],
    }
}

/// All columns of a category's table, common columns first.
pub fn columns(category: LogCategory) -> Vec<&'static str> {
    COMMON_COLUMNS
        .iter()
        .chain(category_columns(category))
        .copied()
        .collect()
}

fn opt(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}

/// Shape a record as one row of its table.
pub fn to_row(record: &LogRecord) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("id".into(), Value::String(record.id().to_string()));
    row.insert("source".into(), Value::String(record.source().as_str().into()));
    row.insert("module".into(), opt(record.module()));
    row.insert("component_name".into(), opt(record.component_name()));
    row.insert("trace_id".into(), opt(record.trace_id()));
    row.insert("request_id".into(), opt(record.request_id()));
    row.insert("user_id".into(), opt(record.user_id()));
    row.insert("file_path".into(), opt(record.file_path()));
    row.insert(
        "layer".into(),
        Value::String(record.layer().map_or("none", |l| l.as_str()).into()),
    );
    row.insert("created_at".into(), Value::String(record.created_at().to_rfc3339()));
    row.insert("message".into(), Value::String(record.message().to_string()));
    row.insert("extra_data".into(), Value::Object(record.extra_data().clone()));
    row.insert("deleted_at".into(), Value::Null);

    match record.details() {
        LogDetails::Application => {}
        LogDetails::Error {
            severity,
            stack_trace,
        } => {
            row.insert("severity".into(), Value::String(severity.as_str().into()));
            row.insert("stack_trace".into(), opt(stack_trace.as_deref()));
        }
        LogDetails::System { subsystem, status } => {
            row.insert("subsystem".into(), Value::String(subsystem.clone()));
            row.insert("status".into(), Value::String(status.clone()));
        }
        LogDetails::Performance(perf) => {
            row.insert("metric_name".into(), Value::String(perf.metric_name.clone()));
            row.insert("metric_value".into(), Value::from(perf.metric_value));
            row.insert("metric_unit".into(), Value::String(perf.metric_unit.clone()));
            row.insert(
                "threshold".into(),
                perf.threshold.map_or(Value::Null, Value::from),
            );
            row.insert("performance_issue".into(), opt(perf.performance_issue.as_deref()));
            row.insert(
                "web_vitals".into(),
                perf.web_vitals.clone().unwrap_or(Value::Null),
            );
        }
        LogDetails::Audit {
            action,
            actor_id,
            target,
        } => {
            row.insert("action".into(), Value::String(action.clone()));
            row.insert("actor_id".into(), opt(actor_id.as_deref()));
            row.insert("target".into(), opt(target.as_deref()));
        }
    }
    row
}
