//! Repository Module
//!
//! State owned by the orchestrator: the job registry and the plan store.

pub mod job;
pub mod plan;
pub mod postgres;

pub use job::{InMemoryJobStore, JobStore, JobStoreError};
pub use plan::{InMemoryPlanStore, PlanStore, PlanStoreError};
pub use postgres::PgPlanStore;
