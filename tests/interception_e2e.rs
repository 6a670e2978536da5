//! End-to-end tests of the interceptor chain over HTTP.

use std::sync::Arc;
use std::time::Duration;

use admin_telemetry::http::build_router;
use admin_telemetry::intercept::{Layer, ServiceHandle};
use admin_telemetry::lifecycle::Shutdown;
use admin_telemetry::telemetry::{LogCategory, LogDetails, LogRecord, Severity, Source};
use admin_telemetry::HttpServer;
use axum::http::StatusCode;
use tower::ServiceExt;

mod common;

use common::{body_json, header, orders_app, request, start_runtime, test_config, ADMIN_TOKEN, USER_TOKEN};

fn for_request<'a>(records: &'a [LogRecord], request_id: &'a str) -> impl Iterator<Item = &'a LogRecord> {
    records.iter().filter(move |r| r.request_id() == Some(request_id))
}

#[tokio::test]
async fn test_database_failure_logged_once_and_sanitized() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/orders/0", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let request_id = header(&response, "x-request-id");
    let body = body_json(response).await;
    assert_eq!(body["error"], "internal_error");
    assert_eq!(body["message"], "An internal error occurred");
    assert_eq!(body["request_id"], request_id.as_str());
    assert!(body.get("detail").is_none());
    assert!(body.get("stack").is_none());

    runtime.shutdown().await;

    let errors = store.records(LogCategory::Error);
    assert_eq!(errors.len(), 1);
    let error = &errors[0];
    assert_eq!(error.layer(), Some(Layer::Database));
    assert_eq!(error.module(), Some("orders"));
    assert_eq!(error.component_name(), Some("OrderRepository"));
    assert_eq!(error.request_id(), Some(request_id.as_str()));
    assert_eq!(error.user_id(), Some("user-1"));
    assert!(error.file_path().is_some_and(|p| p.ends_with("mod.rs")));
    match error.details() {
        LogDetails::Error {
            severity,
            stack_trace,
        } => {
            assert_eq!(*severity, Severity::Error);
            assert!(stack_trace
                .as_deref()
                .is_some_and(|s| s.contains("does not exist")));
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test]
async fn test_debug_mode_exposes_original_message() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.interception.debug = true;
    let (runtime, store) = start_runtime(config);
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/orders/0", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["detail"], "relation \"orders\" does not exist");
    assert!(body["stack"].is_array());

    runtime.shutdown().await;
    assert_eq!(store.len(LogCategory::Error), 1);
}

#[tokio::test]
async fn test_every_entry_carries_the_request_id() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/orders/7", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = header(&response, "x-request-id");
    assert_eq!(body_json(response).await["status"], "shipped");

    runtime.shutdown().await;

    let records = store.all_records();
    let mine: Vec<&LogRecord> = for_request(&records, &request_id).collect();
    let layers: Vec<Option<Layer>> = mine.iter().map(|r| r.layer()).collect();
    assert_eq!(mine.len(), 4, "{layers:?}");
    for layer in Layer::ALL {
        assert!(layers.contains(&Some(layer)), "missing {layer}");
    }

    // Entries from the same request share the trace id and the user.
    let trace_id = mine[0].trace_id();
    assert!(mine.iter().all(|r| r.trace_id() == trace_id));
    assert!(mine.iter().all(|r| r.user_id() == Some("user-1")));

    // Outside any request: lifecycle entries carry no request id.
    let system = store.records(LogCategory::System);
    assert!(system.iter().any(|r| r.message() == "Telemetry pipeline started"));
    assert!(system.iter().all(|r| r.request_id().is_none()));
}

#[tokio::test]
async fn test_double_registration_runs_chain_once() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let handle = ServiceHandle::new("orders");

    let first = runtime.app_state(&handle);
    let second = runtime.app_state(&handle);
    assert!(Arc::ptr_eq(&first.chain, &second.chain));

    let app = build_router(second, common::orders_routes());
    let response = app
        .oneshot(request("GET", "/api/orders/3", Some(USER_TOKEN), None))
        .await
        .unwrap();
    let request_id = header(&response, "x-request-id");

    runtime.shutdown().await;

    let records = store.all_records();
    let router_spans = for_request(&records, &request_id)
        .filter_map(LogRecord::performance)
        .filter(|p| p.metric_name == "http.request_duration")
        .count();
    assert_eq!(router_spans, 1);
}

#[tokio::test]
async fn test_missing_credential_rejected_and_audited() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/orders/7", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthenticated");

    runtime.shutdown().await;

    assert_eq!(store.len(LogCategory::Error), 0);
    let audits = store.records(LogCategory::Audit);
    assert_eq!(audits.len(), 1);
    match audits[0].details() {
        LogDetails::Audit { action, target, .. } => {
            assert_eq!(action, "auth.rejected");
            assert_eq!(target.as_deref(), Some("/api/orders/7"));
        }
        other => panic!("unexpected details {other:?}"),
    }
    // The request never reached the service or database layer.
    assert!(store
        .records(LogCategory::Performance)
        .iter()
        .all(|r| r.layer() != Some(Layer::Database)));
}

#[tokio::test]
async fn test_admin_routes_require_admin_principal() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let denied = app
        .clone()
        .oneshot(request("GET", "/admin/status", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let allowed = app
        .clone()
        .oneshot(request("GET", "/admin/status", Some(ADMIN_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
    let status = body_json(allowed).await;
    assert_eq!(status["status"], "operational");
    assert_eq!(status["service"], "orders");
    assert_eq!(status["enabled_layers"].as_array().map(Vec::len), Some(4));

    let thresholds = app
        .oneshot(request("GET", "/admin/thresholds", Some(ADMIN_TOKEN), None))
        .await
        .unwrap();
    let rules = body_json(thresholds).await;
    assert_eq!(rules["database.query_time"]["direction"], "greater-is-worse");

    runtime.shutdown().await;

    let audits = store.records(LogCategory::Audit);
    assert_eq!(audits.len(), 1);
    assert!(matches!(
        audits[0].details(),
        LogDetails::Audit { action, actor_id: Some(actor), .. }
            if action == "admin.denied" && actor == "user-1"
    ));
    assert_eq!(store.len(LogCategory::Error), 0);
}

#[tokio::test]
async fn test_health_is_public_and_trace_id_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let mut req = request("GET", "/health", None, None);
    req.headers_mut()
        .insert("x-trace-id", "checkout-42".parse().unwrap());
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-trace-id"), "checkout-42");
    assert!(!header(&response, "x-request-id").is_empty());

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_emit_api_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let lcp = serde_json::json!({
        "message": "largest contentful paint",
        "metric_name": "web_vitals.lcp",
        "metric_value": 3200.0,
        "page": "/checkout",
    });
    let accepted = app
        .clone()
        .oneshot(request("POST", "/api/logs/performance", Some(USER_TOKEN), Some(lcp)))
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    // Invalid entries are still accepted at the HTTP level.
    let invalid = serde_json::json!({ "message": "missing action" });
    let still_accepted = app
        .clone()
        .oneshot(request("POST", "/api/logs/audit", Some(USER_TOKEN), Some(invalid)))
        .await
        .unwrap();
    assert_eq!(still_accepted.status(), StatusCode::ACCEPTED);

    let unknown = app
        .oneshot(request(
            "POST",
            "/api/logs/metrics",
            Some(USER_TOKEN),
            Some(serde_json::json!({ "message": "x" })),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let stats = runtime.telemetry().stats().snapshot();
    assert_eq!(stats.rejected_invalid, 1);
    runtime.shutdown().await;

    let vitals: Vec<LogRecord> = store
        .records(LogCategory::Performance)
        .into_iter()
        .filter(|r| r.performance().is_some_and(|p| p.metric_name == "web_vitals.lcp"))
        .collect();
    assert_eq!(vitals.len(), 1);
    let record = &vitals[0];
    assert_eq!(record.source(), Source::Frontend);
    assert_eq!(record.extra_data()["page"], "/checkout");
    let perf = record.performance().unwrap();
    assert_eq!(perf.threshold, Some(2_500.0));
    assert_eq!(perf.performance_issue.as_deref(), Some("THRESHOLD_EXCEEDED"));
}

#[tokio::test]
async fn test_panic_becomes_critical_error() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/boom", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["message"], "An internal error occurred");

    runtime.shutdown().await;

    let errors = store.records(LogCategory::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].layer(), Some(Layer::Service));
    assert!(matches!(
        errors[0].details(),
        LogDetails::Error {
            severity: Severity::Critical,
            ..
        }
    ));
}

#[tokio::test]
async fn test_disabled_auth_layer_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.interception.enabled_layers = [Layer::Router, Layer::Service, Layer::Database]
        .into_iter()
        .collect();
    let (runtime, store) = start_runtime(config);
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/orders/5", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    runtime.shutdown().await;

    let records = store.all_records();
    assert!(records.iter().all(|r| r.layer() != Some(Layer::Auth)));
    assert!(records
        .iter()
        .filter(|r| r.request_id().is_some())
        .all(|r| r.user_id().is_none()));
    assert_eq!(store.len(LogCategory::Audit), 0);
}

#[tokio::test]
async fn test_server_serves_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, _store) = start_runtime(test_config(&dir));
    let server = HttpServer::new(
        runtime.app_state(&ServiceHandle::new("orders")),
        common::orders_routes(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{addr}/api/orders/11"))
        .bearer_auth(USER_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    shutdown.trigger();
    handle.await.unwrap().unwrap();
    runtime.shutdown().await;
}

fn metric_names(records: &[&LogRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.performance())
        .map(|p| p.metric_name.clone())
        .collect()
}

#[tokio::test]
async fn test_timed_out_request_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    config.timeouts.request_secs = 1;
    let (runtime, store) = start_runtime(config);
    let app = orders_app(&runtime);

    let response = app
        .oneshot(request("GET", "/api/orders/5/slow", Some(USER_TOKEN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let request_id = header(&response, "x-request-id");
    let body = body_json(response).await;
    assert_eq!(body["error"], "timeout");
    assert_eq!(body["request_id"], request_id.as_str());

    runtime.shutdown().await;

    let errors = store.records(LogCategory::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].layer(), Some(Layer::Database));
    assert_eq!(errors[0].request_id(), Some(request_id.as_str()));
    assert_eq!(errors[0].extra_data()["error_code"], "timeout");

    let records = store.all_records();
    let mine: Vec<&LogRecord> = for_request(&records, &request_id).collect();
    let metrics = metric_names(&mine);
    for metric in ["http.request_duration", "service.duration", "database.query_time"] {
        assert!(metrics.iter().any(|m| m == metric), "missing {metric}: {metrics:?}");
    }
    assert!(mine
        .iter()
        .filter(|r| r.performance().is_some())
        .all(|r| r.extra_data().get("abandoned") == Some(&serde_json::Value::Bool(true))));
    assert!(mine.iter().any(|r| r.message() == "Request abandoned"));
    assert!(mine.iter().any(|r| r.message() == "Loading slow order"));
}

#[tokio::test]
async fn test_client_disconnect_skips_request_spans() {
    let dir = tempfile::tempdir().unwrap();
    let (runtime, store) = start_runtime(test_config(&dir));
    let app = orders_app(&runtime);

    let mut req = request("GET", "/api/orders/5/slow", Some(USER_TOKEN), None);
    req.headers_mut()
        .insert("x-trace-id", "disconnect-1".parse().unwrap());
    // The client gives up while the query is still running.
    let abandoned = tokio::time::timeout(Duration::from_millis(300), app.oneshot(req)).await;
    assert!(abandoned.is_err());

    runtime.shutdown().await;

    let records = store.all_records();
    let mine: Vec<&LogRecord> = records
        .iter()
        .filter(|r| r.trace_id() == Some("disconnect-1"))
        .collect();
    let metrics = metric_names(&mine);
    assert_eq!(metrics, vec!["database.query_time".to_string()]);
    let query = mine.iter().find(|r| r.performance().is_some()).unwrap();
    assert_eq!(query.extra_data()["abandoned"], true);

    // Entries emitted before the disconnect are still persisted.
    assert!(mine.iter().any(|r| r.message() == "Loading slow order"));
    assert!(mine.iter().all(|r| r.category() != LogCategory::Error));
}
