//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{job_service, plan_service};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The generator backend failed or answered with unusable output
    BadGateway(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => {
                tracing::warn!("Generator error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<job_service::JobError> for ApiError {
    fn from(err: job_service::JobError) -> Self {
        match err {
            job_service::JobError::NotFound(id) => {
                ApiError::NotFound(format!("Job {} not found", id))
            }
            job_service::JobError::ValidationError(msg) => ApiError::BadRequest(msg),
            job_service::JobError::StoreError(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<plan_service::PlanError> for ApiError {
    fn from(err: plan_service::PlanError) -> Self {
        match err {
            plan_service::PlanError::NotFound(id) => {
                ApiError::NotFound(format!("Development plan {} not found", id))
            }
            plan_service::PlanError::ValidationError(msg) => ApiError::BadRequest(msg),
            err @ (plan_service::PlanError::Generation(_) | plan_service::PlanError::EmptyPlan) => {
                ApiError::BadGateway(err.to_string())
            }
            plan_service::PlanError::Store(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
