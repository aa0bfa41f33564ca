//! Development plan API endpoints

use crate::PlansmithClient;
use crate::error::Result;
use plansmith_core::domain::plan::{DevPlan, DevPlanSummary};
use plansmith_core::dto::plan::{GeneratePlan, ModifyPlan};
use uuid::Uuid;

impl PlansmithClient {
    // =============================================================================
    // Development Plans
    // =============================================================================

    /// Generate and store a development plan from a prompt
    ///
    /// # Example
    /// ```no_run
    /// # use plansmith_client::PlansmithClient;
    /// # use plansmith_core::dto::plan::GeneratePlan;
    /// # async fn example() -> plansmith_client::Result<()> {
    /// let client = PlansmithClient::new("http://localhost:8080");
    /// let plan = client.generate_plan(GeneratePlan {
    ///     project_id: "acme/stack".to_string(),
    ///     branch: "main".to_string(),
    ///     prompt: "A bounded stack with push and pop".to_string(),
    /// }).await?;
    /// println!("{} items", plan.plans.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn generate_plan(&self, req: GeneratePlan) -> Result<DevPlan> {
        let url = format!("{}/plan/generate", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get a development plan by ID
    pub async fn get_dev_plan(&self, dev_plan_id: Uuid) -> Result<DevPlan> {
        let url = format!("{}/plan/{}", self.base_url, dev_plan_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List the development plans of a project branch, newest first
    pub async fn list_dev_plans(&self, project_id: &str, branch: &str) -> Result<Vec<DevPlanSummary>> {
        let url = format!("{}/plan/list", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("project_id", project_id), ("branch", branch)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Replace the language and items of a stored plan
    pub async fn modify_plan(&self, dev_plan_id: Uuid, req: ModifyPlan) -> Result<DevPlan> {
        let url = format!("{}/plan/{}", self.base_url, dev_plan_id);
        let response = self.client.put(&url).json(&req).send().await?;

        self.handle_response(response).await
    }
}
