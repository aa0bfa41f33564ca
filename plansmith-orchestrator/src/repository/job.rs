//! Job Store
//!
//! Registry of job records keyed by id. Every mutation goes through
//! [`Job::apply_update`] or [`Job::fail`] so the lifecycle invariants hold
//! whatever the backing store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use plansmith_core::domain::job::{Job, JobId, JobResult, JobStatus, JobSubject};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job store error: {0}")]
    Backend(String),
}

/// Thread-safe job registry
///
/// All mutations are visible to readers as soon as the call returns.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Registers a fresh pending job
    async fn create_job(&self, subject: JobSubject) -> Result<Job, JobStoreError>;

    /// Returns a snapshot of the job
    async fn get_job(&self, id: JobId) -> Result<Job, JobStoreError>;

    /// Moves a job forward
    ///
    /// Updates that would move the status backwards are ignored; progress is
    /// never lowered. Terminal statuses stamp `completed_at`.
    async fn update_job(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        current_step: &str,
    ) -> Result<(), JobStoreError>;

    /// Attaches the terminal payload without changing the status
    async fn set_result(&self, id: JobId, result: JobResult) -> Result<(), JobStoreError>;

    /// Records the error and forces the job to `Failed`
    async fn set_error(&self, id: JobId, error: &str) -> Result<(), JobStoreError>;
}

/// Process-local job store
///
/// The map lock is held exclusively only while inserting; every other call
/// takes it shared and then locks the single job it touches, so jobs with
/// different ids never contend.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: JobId) -> Result<Arc<Mutex<Job>>, JobStoreError> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(JobStoreError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, subject: JobSubject) -> Result<Job, JobStoreError> {
        let job = Job::new(subject, Utc::now());
        self.jobs
            .write()
            .insert(job.id, Arc::new(Mutex::new(job.clone())));

        debug!(job_id = %job.id, "Job registered");
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Job, JobStoreError> {
        let entry = self.entry(id)?;
        let job = entry.lock().clone();
        Ok(job)
    }

    async fn update_job(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        current_step: &str,
    ) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        let mut job = entry.lock();

        if !job.apply_update(status, progress, current_step, Utc::now()) {
            warn!(
                job_id = %id,
                current = %job.status,
                requested = %status,
                "Ignoring status regression"
            );
        }

        Ok(())
    }

    async fn set_result(&self, id: JobId, result: JobResult) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        entry.lock().result = Some(result);
        Ok(())
    }

    async fn set_error(&self, id: JobId, error: &str) -> Result<(), JobStoreError> {
        let entry = self.entry(id)?;
        entry.lock().fail(error, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn subject() -> JobSubject {
        JobSubject::DevPlan {
            dev_plan_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(subject()).await.unwrap();

        let fetched = store.get_job(job.id).await.unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.status, JobStatus::Pending);
        assert_eq!(fetched.progress, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        let id = Uuid::new_v4();

        assert!(matches!(store.get_job(id).await, Err(JobStoreError::NotFound(x)) if x == id));
        assert!(matches!(
            store.update_job(id, JobStatus::Processing, 10, "Fetching").await,
            Err(JobStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_result(id, JobResult::default()).await,
            Err(JobStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.set_error(id, "boom").await,
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_result_does_not_change_status() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(subject()).await.unwrap();
        store
            .update_job(job.id, JobStatus::Processing, 95, "Generating diagrams")
            .await
            .unwrap();

        store
            .set_result(
                job.id,
                JobResult {
                    code: "fn main() {}".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let job = store.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.completed_at.is_none());
        assert_eq!(job.result.unwrap().code, "fn main() {}");
    }

    #[tokio::test]
    async fn test_set_error_forces_failed() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(subject()).await.unwrap();
        store.set_error(job.id, "plan not found").await.unwrap();

        let job = store.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("plan not found"));
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_regressions_are_ignored() {
        let store = InMemoryJobStore::new();
        let job = store.create_job(subject()).await.unwrap();
        store
            .update_job(job.id, JobStatus::Completed, 100, "Completed")
            .await
            .unwrap();
        store
            .update_job(job.id, JobStatus::Processing, 30, "Implementing code")
            .await
            .unwrap();

        let job = store.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
    }

    #[tokio::test]
    async fn test_concurrent_updates_keep_progress_monotonic() {
        let store = Arc::new(InMemoryJobStore::new());
        let job = store.create_job(subject()).await.unwrap();

        let mut handles = Vec::new();
        for progress in [10u8, 85, 30, 95, 70] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_job(job.id, JobStatus::Processing, progress, "step")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let job = store.get_job(job.id).await.unwrap();
        assert_eq!(job.progress, 95);
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_jobs_are_independent() {
        let store = InMemoryJobStore::new();
        let first = store.create_job(subject()).await.unwrap();
        let second = store.create_job(subject()).await.unwrap();
        assert_ne!(first.id, second.id);

        store.set_error(first.id, "boom").await.unwrap();
        let second = store.get_job(second.id).await.unwrap();
        assert_eq!(second.status, JobStatus::Pending);
        assert!(second.error.is_none());
    }
}
