//! Job API Handlers
//!
//! The polling surface: launch a job, then read its status and result.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use plansmith_core::dto::job::{CancelJobResponse, CreateJob, JobCreated, JobResultView, JobStatusView};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /job
/// Create a job and start its pipeline
pub async fn launch_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJob>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    tracing::info!("Launching job for {:?}", req.subject);

    let job = state.jobs.launch_job(req).await?;

    Ok((StatusCode::ACCEPTED, Json(JobCreated::from(&job))))
}

/// GET /job/{id}/status
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::debug!("Getting status of job: {}", id);

    let job = state.jobs.get_job(id).await?;

    Ok(Json(JobStatusView::from(&job)))
}

/// GET /job/{id}/result
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobResultView>> {
    tracing::debug!("Getting result of job: {}", id);

    let job = state.jobs.get_job(id).await?;

    Ok(Json(JobResultView::from(job)))
}

/// POST /job/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CancelJobResponse>> {
    tracing::info!("Cancelling job: {}", id);

    let cancelled = state.jobs.cancel_job(id).await?;

    Ok(Json(CancelJobResponse {
        job_id: id,
        cancelled,
    }))
}
