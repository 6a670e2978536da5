//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::time::Duration;

use admin_telemetry::config::{RetryConfig, TelemetryConfig, TokenConfig};
use admin_telemetry::http::{build_router, AppState, Instrumented};
use admin_telemetry::intercept::{InterceptError, ServiceHandle};
use admin_telemetry::lifecycle::TelemetryRuntime;
use admin_telemetry::storage::MemoryLogStore;
use admin_telemetry::telemetry::LogEntry;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const USER_TOKEN: &str = "user-token";
pub const ADMIN_TOKEN: &str = "admin-token";

/// Config with one user and one admin token, fast retries and a fallback
/// file inside `dir`.
pub fn test_config(dir: &TempDir) -> TelemetryConfig {
    let mut config = TelemetryConfig::default();
    config.auth.tokens = vec![
        TokenConfig {
            token: USER_TOKEN.to_string(),
            user_id: "user-1".to_string(),
            admin: false,
        },
        TokenConfig {
            token: ADMIN_TOKEN.to_string(),
            user_id: "admin-1".to_string(),
            admin: true,
        },
    ];
    config.retries = RetryConfig {
        max_attempts: 2,
        base_delay_ms: 1,
        max_delay_ms: 2,
        attempt_timeout_ms: 200,
    };
    config.fallback.path = dir
        .path()
        .join("fallback.jsonl")
        .to_string_lossy()
        .into_owned();
    config
}

pub fn start_runtime(config: TelemetryConfig) -> (TelemetryRuntime, Arc<MemoryLogStore>) {
    let store = Arc::new(MemoryLogStore::new());
    let runtime = TelemetryRuntime::start_with_store(config, store.clone());
    (runtime, store)
}

/// Router for a service named "orders" with the sample business routes.
pub fn orders_app(runtime: &TelemetryRuntime) -> Router {
    let state = runtime.app_state(&ServiceHandle::new("orders"));
    build_router(state, orders_routes())
}

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/slow", get(get_slow_order))
        .route("/api/boom", get(boom))
}

/// Order 0 does not exist in a broken schema: the query fails.
async fn get_order(
    instrumented: Instrumented,
    Path(id): Path<u64>,
) -> Result<Json<Value>, InterceptError> {
    let order = instrumented
        .service("OrderService", async {
            instrumented
                .database("OrderRepository", "select_order", async move {
                    if id == 0 {
                        Err(InterceptError::internal_from(io::Error::other(
                            "relation \"orders\" does not exist",
                        )))
                    } else {
                        Ok(json!({ "id": id, "status": "shipped" }))
                    }
                })
                .await
        })
        .await?;
    Ok(Json(order))
}

/// Query that stalls for 3s, after an application entry has been emitted.
async fn get_slow_order(
    State(state): State<AppState>,
    instrumented: Instrumented,
    Path(id): Path<u64>,
) -> Result<Json<Value>, InterceptError> {
    state.telemetry.emit(
        LogEntry::application("Loading slow order").with_context(instrumented.context()),
    );
    let order = instrumented
        .service("OrderService", async {
            instrumented
                .database("OrderRepository", "select_order_slow", async move {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Ok(json!({ "id": id, "status": "shipped" }))
                })
                .await
        })
        .await?;
    Ok(Json(order))
}

async fn boom(instrumented: Instrumented) -> Result<Json<Value>, InterceptError> {
    instrumented
        .service("BoomService", async {
            let items: Vec<u32> = Vec::new();
            let first = items[0];
            Ok(Json(json!({ "first": first })))
        })
        .await
}

pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

pub fn header(response: &Response<Body>, name: &str) -> String {
    response
        .headers()
        .get(name)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
