//! Development plan domain types
//!
//! A development plan decomposes a request into class/function units, each
//! described by annotations (signature plus intent).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use uuid::Uuid;

/// One function or method signature plus intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub params: String,
    pub returns: String,
    pub description: String,
}

/// One unit of implementation work
///
/// An empty or missing class name marks a free function; otherwise the
/// annotations are the methods of that class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    #[serde(default)]
    pub class_name: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl PlanItem {
    /// The class name, if this item describes a class
    pub fn class_name(&self) -> Option<&str> {
        self.class_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn is_free_function(&self) -> bool {
        self.class_name().is_none()
    }

    /// Short human-readable label used in logs and error reports
    pub fn label(&self) -> String {
        match self.class_name() {
            Some(class) => class.to_string(),
            None => self
                .annotations
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "<empty>".to_string()),
        }
    }

    /// Renders the item as implementation task text
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "className: {}", self.class_name().unwrap_or(""));
        for annotation in &self.annotations {
            let _ = writeln!(out, "functionName: {}", annotation.name);
            let _ = writeln!(out, "functionDescription: {}", annotation.description);
            let _ = writeln!(out, "functionParameters: {}", annotation.params);
            let _ = writeln!(out, "functionReturnType: {}", annotation.returns);
        }
        out
    }
}

/// A persisted development plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevPlan {
    pub id: Uuid,
    pub project_id: String,
    pub branch: String,
    pub language: String,
    /// The request the plan was generated from
    pub purpose: String,
    pub plans: Vec<PlanItem>,
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a development plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDevPlan {
    pub project_id: String,
    pub branch: String,
    pub language: String,
    pub purpose: String,
    pub plans: Vec<PlanItem>,
}

impl NewDevPlan {
    /// Materializes the plan with a fresh id
    pub fn into_dev_plan(self, now: DateTime<Utc>) -> DevPlan {
        DevPlan {
            id: Uuid::new_v4(),
            project_id: self.project_id,
            branch: self.branch,
            language: self.language,
            purpose: self.purpose,
            plans: self.plans,
            created_at: now,
        }
    }
}

/// Lightweight listing entry for a project's plans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevPlanSummary {
    pub id: Uuid,
    pub language: String,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
}

impl From<&DevPlan> for DevPlanSummary {
    fn from(plan: &DevPlan) -> Self {
        Self {
            id: plan.id,
            language: plan.language.clone(),
            purpose: plan.purpose.clone(),
            created_at: plan.created_at,
        }
    }
}
