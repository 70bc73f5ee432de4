use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::status::report::{OverallStatus, StatusReport};
use crate::status::server::StatusState;
use crate::supervisor::SupervisorCommand;

#[derive(Serialize)]
pub struct Summary {
    pub status: OverallStatus,
    pub hostname: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub dns_reachable: Option<bool>,
    pub vip_present: Option<bool>,
    pub errors_count: usize,
}

fn summary(report: &StatusReport) -> Summary {
    Summary {
        status: report.status,
        hostname: report.hostname.clone(),
        timestamp: report.generated_at,
        dns_reachable: report.dns.as_ref().map(|d| d.reachable),
        vip_present: report.vip.as_ref().map(|v| v.present),
        errors_count: report.errors.len(),
    }
}

/// Process liveness; always 200 while the server runs.
pub async fn live() -> Json<Value> {
    Json(json!({
        "alive": true,
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 200 when this node can answer DNS.
pub async fn ready(State(state): State<StatusState>) -> (StatusCode, Json<Value>) {
    let report = state.report.load();
    let code = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(json!({ "ready": report.is_ready(), "status": report.status })))
}

/// 200 only when everything is healthy.
pub async fn health(State(state): State<StatusState>) -> (StatusCode, Json<Summary>) {
    let report = state.report.load();
    let code = match report.status {
        OverallStatus::Healthy => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(summary(&report)))
}

/// Full report; degraded still answers 200.
pub async fn health_detailed(State(state): State<StatusState>) -> (StatusCode, Json<StatusReport>) {
    let report = state.report.load_full();
    let code = match report.status {
        OverallStatus::Healthy | OverallStatus::Degraded => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(StatusReport::clone(&report)))
}

/// Full report, always 200.
pub async fn status(State(state): State<StatusState>) -> Json<StatusReport> {
    Json(StatusReport::clone(&state.report.load()))
}

pub async fn reset_service(
    State(state): State<StatusState>,
    Path(service): Path<String>,
) -> (StatusCode, Json<Value>) {
    if state.report.load().service(&service).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("unknown service '{}'", service) })),
        );
    }
    enqueue(&state, Some(service))
}

pub async fn reset_all(State(state): State<StatusState>) -> (StatusCode, Json<Value>) {
    enqueue(&state, None)
}

fn enqueue(state: &StatusState, service: Option<String>) -> (StatusCode, Json<Value>) {
    let command = SupervisorCommand::ResetBreaker {
        service: service.clone(),
    };
    match state.commands.try_send(command) {
        Ok(()) => {
            tracing::info!(service = ?service, "Breaker reset queued");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "queued": true, "service": service.unwrap_or_else(|| "all".into()) })),
            )
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not queue breaker reset");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "queued": false, "error": e.to_string() })),
            )
        }
    }
}
