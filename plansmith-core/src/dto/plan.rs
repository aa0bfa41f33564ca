//! Plan DTOs

use serde::{Deserialize, Serialize};

use crate::domain::plan::PlanItem;

/// Request to decompose a prompt into a development plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratePlan {
    pub project_id: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub prompt: String,
}

/// Query selecting the plans of one project branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDevPlans {
    pub project_id: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

/// Replacement content for a stored development plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyPlan {
    pub language: String,
    pub plans: Vec<PlanItem>,
}

fn default_branch() -> String {
    "main".to_string()
}
