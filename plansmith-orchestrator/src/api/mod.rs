//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;
pub mod plan;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::job::JobService;
use crate::service::plan::PlanService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobService,
    pub plans: PlanService,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Plan endpoints
        .route("/plan/generate", post(plan::generate_plan))
        .route("/plan/list", get(plan::list_dev_plans))
        .route("/plan/{id}", get(plan::get_dev_plan).put(plan::modify_plan))
        // Job endpoints
        .route("/job", post(job::launch_job))
        .route("/job/{id}/status", get(job::get_job_status))
        .route("/job/{id}/result", get(job::get_job_result))
        .route("/job/{id}/cancel", post(job::cancel_job))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
