//! Health Check API Handler

use axum::{Json, extract::State};
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    /// Jobs whose pipeline is still running
    pub running_jobs: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        running_jobs: state.jobs.running_jobs(),
    })
}
