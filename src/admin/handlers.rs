use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::http::server::AppState;
use crate::intercept::Layer;
use crate::telemetry::{ResolvedRule, StatsSnapshot};

#[derive(Serialize)]
pub struct QueueStatus {
    pub depth: usize,
    pub capacity: usize,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub service: String,
    pub uptime_secs: u64,
    pub debug: bool,
    pub enabled_layers: Vec<Layer>,
    pub queue: QueueStatus,
}

#[derive(Serialize)]
pub struct TelemetryReport {
    pub queue: QueueStatus,
    #[serde(flatten)]
    pub stats: StatsSnapshot,
}

fn queue_status(state: &AppState) -> QueueStatus {
    QueueStatus {
        depth: state.telemetry.depth(),
        capacity: state.telemetry.marks().capacity,
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        service: state.service.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        debug: state.chain.debug(),
        enabled_layers: state.chain.enabled_layers(),
        queue: queue_status(&state),
    })
}

pub async fn get_telemetry(State(state): State<AppState>) -> Json<TelemetryReport> {
    Json(TelemetryReport {
        queue: queue_status(&state),
        stats: state.telemetry.stats().snapshot(),
    })
}

/// Active (validated) threshold rules.
pub async fn get_thresholds(State(state): State<AppState>) -> Json<BTreeMap<String, ResolvedRule>> {
    Json(state.telemetry.evaluator().rules())
}
