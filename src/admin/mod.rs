//! Admin endpoints: service status, pipeline statistics, threshold rules.
//!
//! All routes require a principal with admin rights.

pub mod auth;
pub mod handlers;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;

use self::auth::require_admin;
use self::handlers::{get_status, get_telemetry, get_thresholds};
use crate::http::server::AppState;

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/telemetry", get(get_telemetry))
        .route("/admin/thresholds", get(get_thresholds))
        .route_layer(from_fn_with_state(state, require_admin))
}
