//! Plan Service
//!
//! Generates development plans from prompts, reads them back and lets callers
//! rewrite their items before implementation.

use std::sync::Arc;

use plansmith_core::domain::plan::{DevPlan, DevPlanSummary, NewDevPlan};
use plansmith_core::dto::plan::{GeneratePlan, ModifyPlan};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::generator::{GeneratedPlan, GenerationError, GenerationRequest, Generator, OutputShape, generate_as, prompt};
use crate::repository::{PlanStore, PlanStoreError};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Development plan {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    ValidationError(String),

    #[error("Failed to generate development plan: {0}")]
    Generation(#[from] GenerationError),

    #[error("Generated development plan has no items")]
    EmptyPlan,

    #[error("Plan store error: {0}")]
    Store(PlanStoreError),
}

impl From<PlanStoreError> for PlanError {
    fn from(err: PlanStoreError) -> Self {
        match err {
            PlanStoreError::NotFound(id) => PlanError::NotFound(id),
            other => PlanError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct PlanService {
    generator: Arc<dyn Generator>,
    store: Arc<dyn PlanStore>,
    default_language: String,
}

impl PlanService {
    pub fn new(
        generator: Arc<dyn Generator>,
        store: Arc<dyn PlanStore>,
        default_language: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            store,
            default_language: default_language.into(),
        }
    }

    /// Decomposes a prompt into a plan and stores it
    pub async fn generate_plan(
        &self,
        req: GeneratePlan,
        cancel: &CancellationToken,
    ) -> Result<DevPlan, PlanError> {
        validate_generate_plan(&req)?;

        let request = GenerationRequest::new(
            prompt::plan_task(&req.prompt, &self.default_language),
            OutputShape::Plan,
        );
        let generated: GeneratedPlan =
            generate_as(self.generator.as_ref(), request, cancel).await?;

        let plans: Vec<_> = generated
            .plans
            .into_iter()
            .filter(|item| !item.annotations.is_empty())
            .collect();
        if plans.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        let language = match generated.language.trim() {
            "" => self.default_language.clone(),
            language => language.to_string(),
        };

        let plan = self
            .store
            .create_dev_plan(NewDevPlan {
                project_id: req.project_id,
                branch: req.branch,
                language,
                purpose: req.prompt,
                plans,
            })
            .await?;

        tracing::info!(
            "Development plan {} generated with {} item(s)",
            plan.id,
            plan.plans.len()
        );

        Ok(plan)
    }

    pub async fn get_dev_plan(&self, id: Uuid) -> Result<DevPlan, PlanError> {
        Ok(self.store.get_dev_plan(id).await?)
    }

    pub async fn list_dev_plans(
        &self,
        project_id: &str,
        branch: &str,
    ) -> Result<Vec<DevPlanSummary>, PlanError> {
        Ok(self.store.list_dev_plans(project_id, branch).await?)
    }

    /// Replaces the language and items of a stored plan
    pub async fn modify_plan(&self, id: Uuid, req: ModifyPlan) -> Result<DevPlan, PlanError> {
        validate_modify_plan(&req)?;

        let plans = req
            .plans
            .into_iter()
            .map(|mut item| {
                item.class_name = item.class_name().map(str::to_string);
                item
            })
            .collect();

        let plan = self
            .store
            .update_dev_plan(id, req.language.trim(), plans)
            .await?;

        tracing::info!(
            "Development plan {} modified, now {} item(s)",
            plan.id,
            plan.plans.len()
        );

        Ok(plan)
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_generate_plan(req: &GeneratePlan) -> Result<(), PlanError> {
    if req.prompt.trim().is_empty() {
        return Err(PlanError::ValidationError(
            "Prompt must not be empty".to_string(),
        ));
    }
    if req.project_id.trim().is_empty() {
        return Err(PlanError::ValidationError(
            "Project id must not be empty".to_string(),
        ));
    }
    if req.branch.trim().is_empty() {
        return Err(PlanError::ValidationError(
            "Branch must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_modify_plan(req: &ModifyPlan) -> Result<(), PlanError> {
    if req.language.trim().is_empty() {
        return Err(PlanError::ValidationError(
            "Language must not be empty".to_string(),
        ));
    }
    if req.plans.is_empty() {
        return Err(PlanError::ValidationError(
            "Plan must have at least one item".to_string(),
        ));
    }
    if let Some(item) = req.plans.iter().find(|item| item.annotations.is_empty()) {
        return Err(PlanError::ValidationError(format!(
            "Plan item '{}' has no annotations",
            item.label()
        )));
    }
    Ok(())
}
