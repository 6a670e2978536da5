//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the instrumented Axum router (ingest, health and admin routes
//!   plus any business routes supplied by the embedding service)
//! - Wire the interceptor middleware in chain order
//! - Bind to a listener and serve until shutdown

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::admin::admin_router;
use crate::config::TelemetryConfig;
use crate::context::{self, CorrelationContext};
use crate::http::middleware::{auth_middleware, error_boundary, panic_response, routing_middleware};
use crate::http::request::correlation_middleware;
use crate::intercept::{CallInfo, ErrorKind, InterceptError, InterceptorChain, Layer};
use crate::telemetry::{LogCategory, LoggingService, Source};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    /// Name of the instrumented service; the module of its service calls.
    pub service: Arc<str>,
    pub chain: Arc<InterceptorChain>,
    pub telemetry: LoggingService,
    pub config: Arc<TelemetryConfig>,
    pub started_at: Instant,
}

/// Wrap `routes` in the interceptor middleware stack.
///
/// Outermost first: trace, body limit, correlation, error boundary (which
/// also enforces the request deadline), auth, routing, panic capture,
/// handler.
pub fn instrument(routes: Router<AppState>, state: AppState) -> Router {
    let config = state.config.clone();
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(state.clone(), routing_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn_with_state(state.clone(), error_boundary))
        .layer(from_fn(correlation_middleware))
        .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the full application router.
pub fn build_router(state: AppState, business: Router<AppState>) -> Router {
    let mut routes = Router::new()
        .route("/health", get(health))
        .route("/api/logs/{category}", post(ingest_log))
        .merge(business);
    if state.config.admin.enabled {
        routes = routes.merge(admin_router(state.clone()));
    }
    instrument(routes, state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Emit API over HTTP. Accepted entries are never echoed back, and
/// validation failures are counted, not reported.
async fn ingest_log(
    State(state): State<AppState>,
    instrumented: Instrumented,
    Path(category): Path<String>,
    body: Bytes,
) -> Result<StatusCode, InterceptError> {
    let category: LogCategory = category
        .parse()
        .map_err(|e| InterceptError::from_error(ErrorKind::NotFound, e))?;

    let call = CallInfo::new(state.service.to_string(), "LogIngest")
        .with_attribute("category", category.as_str());
    instrumented
        .call(Layer::Service, call, async {
            state.telemetry.emit_json(category, &body, Source::Frontend);
            Ok(())
        })
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// Handler-side access to the request's interceptor chain.
///
/// Business handlers take this extractor and run their service and
/// database calls through it so those layers are observed.
pub struct Instrumented {
    ctx: Arc<CorrelationContext>,
    chain: Arc<InterceptorChain>,
    service: Arc<str>,
}

impl FromRequestParts<AppState> for Instrumented {
    type Rejection = InterceptError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let ctx = match parts.extensions.get::<Arc<CorrelationContext>>() {
            Some(ctx) => ctx.clone(),
            None => context::current_or_adhoc(state.chain.debug())
                .map_err(InterceptError::internal_from)?,
        };
        Ok(Self {
            ctx,
            chain: state.chain.clone(),
            service: state.service.clone(),
        })
    }
}

impl Instrumented {
    pub fn context(&self) -> &CorrelationContext {
        &self.ctx
    }

    /// Run `future` as one call at `layer`.
    pub async fn call<F, T>(&self, layer: Layer, call: CallInfo, future: F) -> Result<T, InterceptError>
    where
        F: Future<Output = Result<T, InterceptError>>,
    {
        self.chain.intercept(layer, &self.ctx, call, future).await
    }

    /// Run a business operation at the service layer.
    #[track_caller]
    pub fn service<'a, F, T>(
        &'a self,
        component: &str,
        future: F,
    ) -> impl Future<Output = Result<T, InterceptError>> + 'a
    where
        F: Future<Output = Result<T, InterceptError>> + 'a,
        T: 'a,
    {
        let call = CallInfo::new(self.service.to_string(), component)
            .with_file_path(Location::caller().file());
        self.call(Layer::Service, call, future)
    }

    /// Run a query at the database layer. `query` names the statement and is
    /// recorded with the timing.
    #[track_caller]
    pub fn database<'a, F, T>(
        &'a self,
        component: &str,
        query: &str,
        future: F,
    ) -> impl Future<Output = Result<T, InterceptError>> + 'a
    where
        F: Future<Output = Result<T, InterceptError>> + 'a,
        T: 'a,
    {
        let call = CallInfo::new(self.service.to_string(), component)
            .with_file_path(Location::caller().file())
            .with_attribute("query", query);
        self.call(Layer::Database, call, future)
    }
}

/// HTTP server for the instrumented service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, business: Router<AppState>) -> Self {
        Self {
            router: build_router(state, business),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires, then finish in-flight
    /// requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server shutting down");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
