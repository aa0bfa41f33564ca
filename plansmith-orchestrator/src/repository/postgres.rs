//! Postgres Plan Store
//!
//! Plans are spread over `projects`, `dev_plans`, `plans` and `annotations`
//! (see `db::run_migrations`). Item and annotation order is kept in explicit
//! `position` columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use plansmith_core::domain::plan::{Annotation, DevPlan, DevPlanSummary, NewDevPlan, PlanItem};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::plan::{PlanStore, PlanStoreError};

#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn create_dev_plan(&self, plan: NewDevPlan) -> Result<DevPlan, PlanStoreError> {
        let plan = plan.into_dev_plan(Utc::now());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO projects (id, name, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&plan.project_id)
        .bind(project_name(&plan.project_id))
        .bind(plan.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO dev_plans (id, project_id, branch, language, purpose, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.project_id)
        .bind(&plan.branch)
        .bind(&plan.language)
        .bind(&plan.purpose)
        .bind(plan.created_at)
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, plan.id, &plan.plans).await?;

        tx.commit().await?;

        debug!(dev_plan_id = %plan.id, items = plan.plans.len(), "Development plan stored");
        Ok(plan)
    }

    async fn get_dev_plan(&self, id: Uuid) -> Result<DevPlan, PlanStoreError> {
        let row = sqlx::query_as::<_, DevPlanRow>(
            r#"
            SELECT id, project_id, branch, language, purpose, created_at
            FROM dev_plans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PlanStoreError::NotFound(id))?;

        let items = sqlx::query_as::<_, PlanItemRow>(
            r#"
            SELECT p.id AS plan_id, p.class_name,
                   a.name, a.params, a.return_type, a.description
            FROM plans p
            LEFT JOIN annotations a ON a.plan_id = p.id
            WHERE p.dev_plan_id = $1
            ORDER BY p.position ASC, a.position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.into_dev_plan(group_items(items)))
    }

    async fn update_dev_plan(
        &self,
        id: Uuid,
        language: &str,
        plans: Vec<PlanItem>,
    ) -> Result<DevPlan, PlanStoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, DevPlanRow>(
            r#"
            UPDATE dev_plans
            SET language = $2
            WHERE id = $1
            RETURNING id, project_id, branch, language, purpose, created_at
            "#,
        )
        .bind(id)
        .bind(language)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PlanStoreError::NotFound(id))?;

        // Annotations go with their plans (ON DELETE CASCADE)
        sqlx::query("DELETE FROM plans WHERE dev_plan_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        insert_items(&mut tx, id, &plans).await?;

        tx.commit().await?;

        debug!(dev_plan_id = %id, items = plans.len(), "Development plan updated");
        Ok(row.into_dev_plan(plans))
    }

    async fn list_dev_plans(
        &self,
        project_id: &str,
        branch: &str,
    ) -> Result<Vec<DevPlanSummary>, PlanStoreError> {
        let rows = sqlx::query_as::<_, DevPlanRow>(
            r#"
            SELECT id, project_id, branch, language, purpose, created_at
            FROM dev_plans
            WHERE project_id = $1 AND branch = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .bind(branch)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Writes `items` (and their annotations) under `dev_plan_id`, in order
async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    dev_plan_id: Uuid,
    items: &[PlanItem],
) -> Result<(), sqlx::Error> {
    for (position, item) in items.iter().enumerate() {
        let plan_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO plans (id, dev_plan_id, position, class_name)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(plan_id)
        .bind(dev_plan_id)
        .bind(position as i32)
        .bind(item.class_name())
        .execute(&mut **tx)
        .await?;

        for (annotation_position, annotation) in item.annotations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO annotations (plan_id, position, name, params, return_type, description)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(plan_id)
            .bind(annotation_position as i32)
            .bind(&annotation.name)
            .bind(&annotation.params)
            .bind(&annotation.returns)
            .bind(&annotation.description)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

/// Display name of a project: the last segment of its path-like id
fn project_name(project_id: &str) -> &str {
    project_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(project_id)
}

/// Folds the joined rows (ordered by item, then annotation) back into items
fn group_items(rows: Vec<PlanItemRow>) -> Vec<PlanItem> {
    let mut items: Vec<(Uuid, PlanItem)> = Vec::new();

    for row in rows {
        let needs_new = items.last().is_none_or(|(id, _)| *id != row.plan_id);
        if needs_new {
            items.push((
                row.plan_id,
                PlanItem {
                    class_name: row.class_name.clone(),
                    annotations: Vec::new(),
                },
            ));
        }

        if let (Some(name), Some((_, item))) = (row.name, items.last_mut()) {
            item.annotations.push(Annotation {
                name,
                params: row.params.unwrap_or_default(),
                returns: row.return_type.unwrap_or_default(),
                description: row.description.unwrap_or_default(),
            });
        }
    }

    items.into_iter().map(|(_, item)| item).collect()
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct DevPlanRow {
    id: Uuid,
    project_id: String,
    branch: String,
    language: String,
    purpose: String,
    created_at: DateTime<Utc>,
}

impl DevPlanRow {
    fn into_dev_plan(self, plans: Vec<PlanItem>) -> DevPlan {
        DevPlan {
            id: self.id,
            project_id: self.project_id,
            branch: self.branch,
            language: self.language,
            purpose: self.purpose,
            plans,
            created_at: self.created_at,
        }
    }
}

impl From<DevPlanRow> for DevPlanSummary {
    fn from(row: DevPlanRow) -> Self {
        DevPlanSummary {
            id: row.id,
            language: row.language,
            purpose: row.purpose,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlanItemRow {
    plan_id: Uuid,
    class_name: Option<String>,
    name: Option<String>,
    params: Option<String>,
    return_type: Option<String>,
    description: Option<String>,
}
