//! Field-map form of the emit API.
//!
//! Unknown keys are merged into `extra_data`. Known keys must carry the
//! right JSON type; `null` counts as absent.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::intercept::Layer;
use crate::telemetry::entry::{
    LogCategory, LogDetails, LogEntry, PerformanceDetails, Severity, Source, ValidationError,
    DEFAULT_METRIC_UNIT,
};

const COMMON_FIELDS: &[&str] = &[
    "id",
    "source",
    "layer",
    "module",
    "component_name",
    "trace_id",
    "request_id",
    "user_id",
    "file_path",
    "message",
    "created_at",
    "extra_data",
];

fn category_fields(category: LogCategory) -> &'static [&'static str] {
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

/// Build an entry of `category` from a JSON field map.
pub fn entry_from_fields(
    category: LogCategory,
    mut fields: Map<String, Value>,
) -> Result<LogEntry, ValidationError> {
    let mut extra = match fields.remove("extra_data") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(wrong_type("extra_data", "an object")),
    };

    let known = category_fields(category);
    let unknown: Vec<String> = fields
        .keys()
        .filter(|key| !COMMON_FIELDS.contains(&key.as_str()) && !known.contains(&key.as_str()))
        .cloned()
        .collect();
    for key in unknown {
        if let Some(value) = fields.remove(&key) {
            extra.insert(key, value);
        }
    }

    let details = match category {
        LogCategory::Application => LogDetails::Application,
        LogCategory::Error => LogDetails::Error {
            severity: parse_enum(&mut fields, "severity", parse_severity)?
                .unwrap_or(Severity::Error),
            stack_trace: take_string(&mut fields, "stack_trace")?,
        },
        LogCategory::System => LogDetails::System {
            subsystem: take_string(&mut fields, "subsystem")?
                .ok_or(ValidationError::MissingField("subsystem"))?,
            status: take_string(&mut fields, "status")?
                .ok_or(ValidationError::MissingField("status"))?,
        },
        LogCategory::Performance => {
            let metric_name = take_string(&mut fields, "metric_name")?
                .ok_or(ValidationError::MissingField("metric_name"))?;
            let metric_value = take_number(&mut fields, "metric_value")?
                .ok_or(ValidationError::MissingField("metric_value"))?;
            // Type-checked, then recomputed by the threshold evaluator.
            take_number(&mut fields, "threshold")?;
            take_string(&mut fields, "performance_issue")?;
            let web_vitals = match fields.remove("web_vitals") {
                None | Some(Value::Null) => None,
                Some(value @ Value::Object(_)) => Some(value),
                Some(_) => return Err(wrong_type("web_vitals", "an object")),
            };
            LogDetails::Performance(PerformanceDetails {
                metric_name,
                metric_value,
                metric_unit: take_string(&mut fields, "metric_unit")?
                    .unwrap_or_else(|| DEFAULT_METRIC_UNIT.to_string()),
                threshold: None,
                performance_issue: None,
                web_vitals,
            })
        }
        LogCategory::Audit => LogDetails::Audit {
            action: take_string(&mut fields, "action")?
                .ok_or(ValidationError::MissingField("action"))?,
            actor_id: take_string(&mut fields, "actor_id")?,
            target: take_string(&mut fields, "target")?,
        },
    };

    let mut entry = LogEntry::with_details(details);
    entry.id = take_string(&mut fields, "id")?
        .map(|raw| {
            Uuid::parse_str(&raw).map_err(|e| ValidationError::InvalidValue {
                field: "id",
                reason: e.to_string(),
            })
        })
        .transpose()?;
    entry.source = parse_enum(&mut fields, "source", parse_source)?;
    entry.layer = parse_enum(&mut fields, "layer", parse_layer)?.flatten();
    entry.module = take_string(&mut fields, "module")?;
    entry.component_name = take_string(&mut fields, "component_name")?;
    entry.trace_id = take_string(&mut fields, "trace_id")?;
    entry.request_id = take_string(&mut fields, "request_id")?;
    entry.user_id = take_string(&mut fields, "user_id")?;
    entry.file_path = take_string(&mut fields, "file_path")?;
    entry.message = take_string(&mut fields, "message")?;
    entry.created_at = take_string(&mut fields, "created_at")?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| ValidationError::InvalidValue {
                    field: "created_at",
                    reason: e.to_string(),
                })
        })
        .transpose()?;
    entry.extra_data = extra;

    Ok(entry)
}

fn wrong_type(field: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongType {
        field: field.to_string(),
        expected,
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Result<Option<String>, ValidationError> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(wrong_type(key, "a string")),
    }
}

fn take_number(fields: &mut Map<String, Value>, key: &str) -> Result<Option<f64>, ValidationError> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| wrong_type(key, "a number")),
        Some(_) => Err(wrong_type(key, "a number")),
    }
}

fn parse_enum<T>(
    fields: &mut Map<String, Value>,
    key: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    take_string(fields, key)?
        .map(|raw| {
            parse(&raw).ok_or_else(|| ValidationError::InvalidValue {
                field: key,
                reason: format!("unsupported value `{raw}`"),
            })
        })
        .transpose()
}

fn parse_source(raw: &str) -> Option<Source> {
    match raw {
        "frontend" => Some(Source::Frontend),
        "backend" => Some(Source::Backend),
        "system" => Some(Source::System),
        _ => None,
    }
}

fn parse_severity(raw: &str) -> Option<Severity> {
    match raw {
        "warning" => Some(Severity::Warning),
        "error" => Some(Severity::Error),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

/// `Some(None)` for the explicit "none" layer.
fn parse_layer(raw: &str) -> Option<Option<Layer>> {
    if raw == "none" {
        return Some(None);
    }
    Layer::ALL.into_iter().find(|l| l.as_str() == raw).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_unknown_fields_go_to_extra_data() {
        let entry = entry_from_fields(
            LogCategory::Application,
            fields(json!({
                "source": "frontend",
                "message": "clicked",
                "button": "save",
                "metric_name": "not-for-application",
                "extra_data": {"page": "/members"}
            })),
        )
        .unwrap();

        assert_eq!(entry.source, Some(Source::Frontend));
        assert_eq!(entry.extra_data["button"], "save");
        assert_eq!(entry.extra_data["page"], "/members");
        assert_eq!(entry.extra_data["metric_name"], "not-for-application");
    }

    #[test]
    fn test_performance_requires_metric() {
        let err = entry_from_fields(
            LogCategory::Performance,
            fields(json!({"source": "frontend", "message": "lcp", "metric_name": "web_vitals.lcp"})),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField("metric_value"));

        let entry = entry_from_fields(
            LogCategory::Performance,
            fields(json!({
                "source": "frontend",
                "message": "lcp",
                "metric_name": "web_vitals.lcp",
                "metric_value": 3100,
                "web_vitals": {"rating": "poor"}
            })),
        )
        .unwrap();
        match entry.details {
            LogDetails::Performance(perf) => {
                assert_eq!(perf.metric_value, 3100.0);
                assert_eq!(perf.metric_unit, "ms");
                assert!(perf.web_vitals.is_some());
            }
            other => panic!("unexpected details {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = entry_from_fields(
            LogCategory::Performance,
            fields(json!({"metric_name": "x", "metric_value": "fast"})),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { ref field, .. } if field == "metric_value"));

        let err = entry_from_fields(
            LogCategory::Application,
            fields(json!({"message": 12})),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::WrongType { ref field, .. } if field == "message"));
    }

    #[test]
    fn test_category_required_fields() {
        assert_eq!(
            entry_from_fields(LogCategory::Audit, fields(json!({"message": "x"}))).unwrap_err(),
            ValidationError::MissingField("action")
        );
        assert_eq!(
            entry_from_fields(LogCategory::System, fields(json!({"subsystem": "queue"})))
                .unwrap_err(),
            ValidationError::MissingField("status")
        );
    }

    #[test]
    fn test_enum_values_checked() {
        let err = entry_from_fields(
            LogCategory::Application,
            fields(json!({"source": "martian", "message": "x"})),
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { field: "source", .. }));

        let entry = entry_from_fields(
            LogCategory::Application,
            fields(json!({"layer": "none", "message": "x"})),
        )
        .unwrap();
        assert_eq!(entry.layer, None);
    }
}
