//! Plan Store
//!
//! Persists development plans (project, dev plan, plan items, annotations)
//! and hands their items to the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use plansmith_core::domain::plan::{DevPlan, DevPlanSummary, NewDevPlan, PlanItem};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PlanStoreError {
    #[error("Development plan not found: {0}")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Stores a plan with all of its items and annotations
    async fn create_dev_plan(&self, plan: NewDevPlan) -> Result<DevPlan, PlanStoreError>;

    /// A stored plan with its items in their original order
    async fn get_dev_plan(&self, id: Uuid) -> Result<DevPlan, PlanStoreError>;

    /// Replaces the language and every item of a stored plan
    ///
    /// Identity, project, branch, purpose and creation time are kept.
    async fn update_dev_plan(
        &self,
        id: Uuid,
        language: &str,
        plans: Vec<PlanItem>,
    ) -> Result<DevPlan, PlanStoreError>;

    /// Plans of one project branch, newest first
    async fn list_dev_plans(
        &self,
        project_id: &str,
        branch: &str,
    ) -> Result<Vec<DevPlanSummary>, PlanStoreError>;
}

/// Plan store used when no database is configured
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    plans: RwLock<HashMap<Uuid, DevPlan>>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for InMemoryPlanStore {
    async fn create_dev_plan(&self, plan: NewDevPlan) -> Result<DevPlan, PlanStoreError> {
        let plan = plan.into_dev_plan(Utc::now());
        self.plans.write().insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn get_dev_plan(&self, id: Uuid) -> Result<DevPlan, PlanStoreError> {
        self.plans
            .read()
            .get(&id)
            .cloned()
            .ok_or(PlanStoreError::NotFound(id))
    }

    async fn update_dev_plan(
        &self,
        id: Uuid,
        language: &str,
        plans: Vec<PlanItem>,
    ) -> Result<DevPlan, PlanStoreError> {
        let mut store = self.plans.write();
        let plan = store.get_mut(&id).ok_or(PlanStoreError::NotFound(id))?;
        plan.language = language.to_string();
        plan.plans = plans;
        Ok(plan.clone())
    }

    async fn list_dev_plans(
        &self,
        project_id: &str,
        branch: &str,
    ) -> Result<Vec<DevPlanSummary>, PlanStoreError> {
        let mut plans: Vec<DevPlanSummary> = self
            .plans
            .read()
            .values()
            .filter(|p| p.project_id == project_id && p.branch == branch)
            .map(DevPlanSummary::from)
            .collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }
}
