//! Plan API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use plansmith_core::domain::plan::{DevPlan, DevPlanSummary};
use plansmith_core::dto::plan::{GeneratePlan, ListDevPlans, ModifyPlan};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /plan/generate
/// Decompose a prompt into a development plan and store it
pub async fn generate_plan(
    State(state): State<AppState>,
    Json(req): Json<GeneratePlan>,
) -> ApiResult<(StatusCode, Json<DevPlan>)> {
    tracing::info!("Generating development plan for project: {}", req.project_id);

    // Stops the generator call if the client goes away
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let plan = state.plans.generate_plan(req, &cancel).await?;

    Ok((StatusCode::CREATED, Json(plan)))
}

/// GET /plan/list?project_id=...&branch=...
pub async fn list_dev_plans(
    State(state): State<AppState>,
    Query(query): Query<ListDevPlans>,
) -> ApiResult<Json<Vec<DevPlanSummary>>> {
    tracing::debug!(
        "Listing development plans for {}@{}",
        query.project_id,
        query.branch
    );

    let plans = state
        .plans
        .list_dev_plans(&query.project_id, &query.branch)
        .await?;

    Ok(Json(plans))
}

/// GET /plan/{id}
pub async fn get_dev_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DevPlan>> {
    tracing::debug!("Getting development plan: {}", id);

    let plan = state.plans.get_dev_plan(id).await?;

    Ok(Json(plan))
}

/// PUT /plan/{id}
/// Replace the language and items of a stored plan
pub async fn modify_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModifyPlan>,
) -> ApiResult<Json<DevPlan>> {
    tracing::info!("Modifying development plan: {}", id);

    let plan = state.plans.modify_plan(id, req).await?;

    Ok(Json(plan))
}
