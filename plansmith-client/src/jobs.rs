//! Job-related API endpoints

use std::time::Duration;

use crate::PlansmithClient;
use crate::error::{ClientError, Result};
use plansmith_core::dto::job::{CancelJobResponse, CreateJob, JobCreated, JobResultView, JobStatusView};
use tokio::time::Instant;
use uuid::Uuid;

impl PlansmithClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Launch a pipeline job
    ///
    /// The orchestrator answers as soon as the job is registered; use
    /// [`get_job_status`](Self::get_job_status) or
    /// [`wait_for_job`](Self::wait_for_job) to follow it.
    pub async fn launch_job(&self, req: CreateJob) -> Result<JobCreated> {
        let url = format!("{}/job", self.base_url);
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Get the progress of a job
    pub async fn get_job_status(&self, job_id: Uuid) -> Result<JobStatusView> {
        let url = format!("{}/job/{}/status", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get the outcome of a job
    pub async fn get_job_result(&self, job_id: Uuid) -> Result<JobResultView> {
        let url = format!("{}/job/{}/result", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a running job
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<CancelJobResponse> {
        let url = format!("{}/job/{}/cancel", self.base_url, job_id);
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Poll a job's status every `interval` until it completes or fails
    ///
    /// Returns the terminal status, or [`ClientError::Timeout`] once
    /// `timeout` has passed.
    pub async fn wait_for_job(
        &self,
        job_id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<JobStatusView> {
        let deadline = Instant::now() + timeout;

        loop {
            let status = self.get_job_status(job_id).await?;
            if status.status.is_terminal() {
                return Ok(status);
            }

            tracing::debug!(
                "Job {} is {} ({}%): {}",
                job_id,
                status.status,
                status.progress,
                status.current_step
            );

            if Instant::now() + interval > deadline {
                return Err(ClientError::Timeout {
                    job_id,
                    waited: timeout,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ClientError;
    use crate::test_server;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{get, post},
    };
    use chrono::Utc;
    use plansmith_core::domain::job::{JobStatus, JobSubject};
    use plansmith_core::dto::job::{CancelJobResponse, CreateJob, JobCreated, JobStatusView};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    fn status_view(job_id: Uuid, status: JobStatus, progress: u8) -> JobStatusView {
        JobStatusView {
            job_id,
            status,
            progress,
            current_step: "Implementing plan items".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_launch_job() {
        let router = Router::new().route(
            "/job",
            post(|Json(req): Json<CreateJob>| async move {
                assert!(matches!(req.subject, JobSubject::Prompt { .. }));
                (
                    StatusCode::ACCEPTED,
                    Json(JobCreated {
                        job_id: Uuid::nil(),
                        status: JobStatus::Pending,
                        message: "Implementation job started".to_string(),
                    }),
                )
            }),
        );
        let client = test_server::spawn(router).await;

        let created = client
            .launch_job(CreateJob {
                subject: JobSubject::Prompt {
                    prompt: "a stack".to_string(),
                    project_id: None,
                    branch: None,
                },
                diagram_types: vec![],
            })
            .await
            .unwrap();

        assert_eq!(created.job_id, Uuid::nil());
        assert_eq!(created.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_wait_for_job_polls_until_terminal() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let router = Router::new().route(
            "/job/{id}/status",
            get(move |Path(id): Path<Uuid>| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    let view = if n < 2 {
                        status_view(id, JobStatus::Processing, 30)
                    } else {
                        status_view(id, JobStatus::Completed, 100)
                    };
                    Json(view)
                }
            }),
        );
        let client = test_server::spawn(router).await;

        let status = client
            .wait_for_job(Uuid::new_v4(), Duration::from_millis(5), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(status.status, JobStatus::Completed);
        assert_eq!(status.progress, 100);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_for_job_times_out() {
        let router = Router::new().route(
            "/job/{id}/status",
            get(|Path(id): Path<Uuid>| async move {
                Json(status_view(id, JobStatus::Processing, 10))
            }),
        );
        let client = test_server::spawn(router).await;
        let job_id = Uuid::new_v4();

        let err = client
            .wait_for_job(job_id, Duration::from_millis(10), Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Timeout { job_id: id, .. } if id == job_id));
    }

    #[tokio::test]
    async fn test_cancel_and_unknown_job() {
        let router = Router::new()
            .route(
                "/job/{id}/cancel",
                post(|Path(id): Path<Uuid>| async move {
                    Json(CancelJobResponse {
                        job_id: id,
                        cancelled: true,
                    })
                }),
            )
            .route(
                "/job/{id}/result",
                get(|Path(id): Path<Uuid>| async move {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "error": format!("Job {} not found", id) })),
                    )
                }),
            );
        let client = test_server::spawn(router).await;
        let job_id = Uuid::new_v4();

        let cancelled = client.cancel_job(job_id).await.unwrap();
        assert_eq!(cancelled.job_id, job_id);
        assert!(cancelled.cancelled);

        let err = client.get_job_result(job_id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
