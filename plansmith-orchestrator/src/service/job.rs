//! Job Service
//!
//! Launches pipeline runs in the background and answers status, result and
//! cancellation queries for them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use plansmith_core::domain::job::{Job, JobId, JobSubject};
use plansmith_core::dto::job::CreateJob;
use tracing::{error, info, warn};

use crate::repository::JobStoreError;
use crate::service::cancel::{CancelReason, JobCancellation};
use crate::service::pipeline::PipelineOrchestrator;

/// Service error type
#[derive(Debug)]
pub enum JobError {
    NotFound(JobId),
    ValidationError(String),
    StoreError(JobStoreError),
}

impl From<JobStoreError> for JobError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::NotFound(id) => JobError::NotFound(id),
            other => JobError::StoreError(other),
        }
    }
}

#[derive(Clone)]
pub struct JobService {
    pipeline: Arc<PipelineOrchestrator>,
    running: Arc<Mutex<HashMap<JobId, JobCancellation>>>,
    job_timeout: Option<Duration>,
}

impl JobService {
    pub fn new(pipeline: Arc<PipelineOrchestrator>, job_timeout: Option<Duration>) -> Self {
        Self {
            pipeline,
            running: Arc::new(Mutex::new(HashMap::new())),
            job_timeout,
        }
    }

    /// Registers a job and starts its pipeline in the background
    ///
    /// Returns as soon as the job exists; progress is observed by polling.
    pub async fn launch_job(&self, req: CreateJob) -> Result<Job, JobError> {
        validate_create_job(&req)?;

        let job = self.pipeline.jobs().create_job(req.subject.clone()).await?;
        let cancellation = JobCancellation::new();
        self.running.lock().insert(job.id, cancellation.clone());

        info!("Job {} launched", job.id);

        let service = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            service.drive(job_id, req, cancellation).await;
        });

        Ok(job)
    }

    async fn drive(&self, job_id: JobId, req: CreateJob, cancellation: JobCancellation) {
        let watchdog = self.job_timeout.map(|timeout| {
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancellation.token().cancelled() => {}
                    _ = tokio::time::sleep(timeout) => {
                        warn!("Job {} exceeded its {:?} deadline", job_id, timeout);
                        cancellation.cancel(CancelReason::TimedOut(timeout));
                    }
                }
            })
        });

        // Own task, so a panicking stage still leaves the job terminal
        let run = {
            let pipeline = self.pipeline.clone();
            let cancellation = cancellation.clone();
            tokio::spawn(async move { pipeline.run(job_id, &req, &cancellation).await })
        };

        match run.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Failed to record outcome of job {}: {}", job_id, e),
            Err(e) => {
                error!("Pipeline of job {} aborted: {}", job_id, e);
                // Stops fan-out workers the panicked stage left behind
                cancellation.token().cancel();
                if let Err(e) = self
                    .pipeline
                    .jobs()
                    .set_error(job_id, "job aborted: pipeline panicked")
                    .await
                {
                    error!("Failed to record outcome of job {}: {}", job_id, e);
                }
            }
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
        self.running.lock().remove(&job_id);
    }

    /// Number of jobs whose pipeline has not finished yet
    pub fn running_jobs(&self) -> usize {
        self.running.lock().len()
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job, JobError> {
        Ok(self.pipeline.jobs().get_job(id).await?)
    }

    /// Requests cancellation of a running job
    ///
    /// Returns `false` when the job has already finished. The job itself
    /// turns `Failed` once the pipeline notices.
    pub async fn cancel_job(&self, id: JobId) -> Result<bool, JobError> {
        let job = self.get_job(id).await?;
        if job.is_terminal() {
            return Ok(false);
        }

        let cancellation = self.running.lock().get(&id).cloned();
        match cancellation {
            Some(cancellation) => {
                cancellation.cancel(CancelReason::Requested);
                info!("Job {} cancellation requested", id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_create_job(req: &CreateJob) -> Result<(), JobError> {
    match &req.subject {
        JobSubject::DevPlan { dev_plan_id } if dev_plan_id.is_nil() => Err(
            JobError::ValidationError("Development plan id must not be nil".to_string()),
        ),
        JobSubject::Prompt { prompt, .. } if prompt.trim().is_empty() => Err(
            JobError::ValidationError("Prompt must not be empty".to_string()),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::OutputShape;
    use crate::repository::{InMemoryJobStore, InMemoryPlanStore, PlanStore};
    use crate::service::fanout::FanOutExecutor;
    use crate::service::pipeline::PipelineSettings;
    use crate::service::plan::PlanService;
    use crate::service::retry::Backoff;
    use crate::testing::{ScriptedGenerator, canned_response};
    use plansmith_core::domain::job::JobStatus;
    use plansmith_core::domain::plan::{Annotation, NewDevPlan, PlanItem};
    use uuid::Uuid;

    struct Fixture {
        service: JobService,
        plans: Arc<InMemoryPlanStore>,
        jobs: Arc<InMemoryJobStore>,
    }

    fn fixture(generator: ScriptedGenerator, job_timeout: Option<Duration>) -> Fixture {
        let generator = Arc::new(generator);
        let plans = Arc::new(InMemoryPlanStore::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let pipeline = PipelineOrchestrator::new(
            generator.clone(),
            PlanService::new(generator, plans.clone(), "rust"),
            jobs.clone(),
            FanOutExecutor::new(2),
            Backoff::none(),
            PipelineSettings::default(),
        );
        Fixture {
            service: JobService::new(Arc::new(pipeline), job_timeout),
            plans,
            jobs,
        }
    }

    async fn stored_plan(plans: &InMemoryPlanStore) -> Uuid {
        plans
            .create_dev_plan(NewDevPlan {
                project_id: "acme/stack".to_string(),
                branch: "main".to_string(),
                language: "rust".to_string(),
                purpose: "a stack".to_string(),
                plans: vec![PlanItem {
                    class_name: None,
                    annotations: vec![Annotation {
                        name: "push".to_string(),
                        params: "value: i32".to_string(),
                        returns: "()".to_string(),
                        description: "pushes".to_string(),
                    }],
                }],
            })
            .await
            .unwrap()
            .id
    }

    async fn wait_terminal(service: &JobService, id: JobId) -> Job {
        for _ in 0..200 {
            let job = service.get_job(id).await.unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }

    #[test]
    fn test_validate_create_job() {
        let valid = CreateJob {
            subject: JobSubject::DevPlan {
                dev_plan_id: Uuid::new_v4(),
            },
            diagram_types: vec![],
        };
        assert!(validate_create_job(&valid).is_ok());

        let nil = CreateJob {
            subject: JobSubject::DevPlan {
                dev_plan_id: Uuid::nil(),
            },
            diagram_types: vec![],
        };
        assert!(matches!(validate_create_job(&nil), Err(JobError::ValidationError(_))));

        let blank = CreateJob {
            subject: JobSubject::Prompt {
                prompt: "  ".to_string(),
                project_id: None,
                branch: None,
            },
            diagram_types: vec![],
        };
        assert!(validate_create_job(&blank).is_err());
    }

    #[tokio::test]
    async fn test_launch_returns_pending_job_and_completes() {
        let fixture = fixture(ScriptedGenerator::new(canned_response), None);
        let dev_plan_id = stored_plan(&fixture.plans).await;

        let job = fixture
            .service
            .launch_job(CreateJob {
                subject: JobSubject::DevPlan { dev_plan_id },
                diagram_types: vec![],
            })
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);

        let finished = wait_terminal(&fixture.service, job.id).await;
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(finished.progress, 100);
        assert!(finished.result.is_some());

        // The pipeline task deregisters right after recording the outcome
        for _ in 0..100 {
            if fixture.service.running_jobs() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(fixture.service.running_jobs(), 0);

        assert!(!fixture.service.cancel_job(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let generator =
            ScriptedGenerator::new(canned_response).with_delay(Duration::from_secs(30));
        let fixture = fixture(generator, None);
        let dev_plan_id = stored_plan(&fixture.plans).await;

        let job = fixture
            .service
            .launch_job(CreateJob {
                subject: JobSubject::DevPlan { dev_plan_id },
                diagram_types: vec![],
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fixture.service.cancel_job(job.id).await.unwrap());

        let finished = wait_terminal(&fixture.service, job.id).await;
        assert_eq!(finished.status, JobStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some("job cancelled"));
        assert!(finished.result.is_none());
    }

    #[tokio::test]
    async fn test_job_timeout_fails_job() {
        let generator =
            ScriptedGenerator::new(canned_response).with_delay(Duration::from_secs(30));
        let fixture = fixture(generator, Some(Duration::from_millis(50)));
        let dev_plan_id = stored_plan(&fixture.plans).await;

        let job = fixture
            .service
            .launch_job(CreateJob {
                subject: JobSubject::DevPlan { dev_plan_id },
                diagram_types: vec![],
            })
            .await
            .unwrap();

        let finished = wait_terminal(&fixture.service, job.id).await;
        assert_eq!(finished.status, JobStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some("job timed out"));
    }

    #[tokio::test]
    async fn test_panicking_stage_fails_job_and_deregisters() {
        let generator = ScriptedGenerator::new(|request| match request.shape {
            OutputShape::Combined => panic!("combine exploded"),
            _ => canned_response(request),
        });
        let fixture = fixture(generator, None);
        let dev_plan_id = stored_plan(&fixture.plans).await;

        let job = fixture
            .service
            .launch_job(CreateJob {
                subject: JobSubject::DevPlan { dev_plan_id },
                diagram_types: vec![],
            })
            .await
            .unwrap();

        let finished = wait_terminal(&fixture.service, job.id).await;
        assert_eq!(finished.status, JobStatus::Failed);
        assert_eq!(finished.error.as_deref(), Some("job aborted: pipeline panicked"));
        assert!(finished.completed_at.is_some());

        for _ in 0..100 {
            if fixture.service.running_jobs() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(fixture.service.running_jobs(), 0);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let fixture = fixture(ScriptedGenerator::new(canned_response), None);
        let id = Uuid::new_v4();

        assert!(matches!(
            fixture.service.get_job(id).await,
            Err(JobError::NotFound(x)) if x == id
        ));
        assert!(matches!(
            fixture.service.cancel_job(id).await,
            Err(JobError::NotFound(_))
        ));
        assert!(fixture.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_launch_rejects_invalid_request() {
        let fixture = fixture(ScriptedGenerator::new(canned_response), None);

        let err = fixture
            .service
            .launch_job(CreateJob {
                subject: JobSubject::Prompt {
                    prompt: String::new(),
                    project_id: None,
                    branch: None,
                },
                diagram_types: vec![],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::ValidationError(_)));
        assert!(fixture.jobs.is_empty());
    }
}
