//! Job DTOs for the polling surface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::diagram::{DiagramArtifact, DiagramType};
use crate::domain::job::{DiagramSummary, Job, JobId, JobStatus, JobSubject};
use crate::domain::segment::ExplainedSegment;

/// Request to start a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub subject: JobSubject,
    /// Diagram renderings to produce; empty lets the orchestrator choose
    #[serde(default)]
    pub diagram_types: Vec<DiagramType>,
}

/// Acknowledgement returned as soon as a job is registered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

impl From<&Job> for JobCreated {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            message: "Implementation job started".to_string(),
        }
    }
}

/// Progress view of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            current_step: job.current_step.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Outcome view of a job
///
/// Result fields are empty until the job completes; `error` is set only for
/// failed jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub code: String,
    pub diagrams: Vec<DiagramArtifact>,
    pub explained_segments: Vec<ExplainedSegment>,
    pub diagram_summary: Option<DiagramSummary>,
}

impl From<Job> for JobResultView {
    fn from(job: Job) -> Self {
        let mut view = Self {
            job_id: job.id,
            status: job.status,
            error: job.error,
            completed_at: job.completed_at,
            code: String::new(),
            diagrams: Vec::new(),
            explained_segments: Vec::new(),
            diagram_summary: None,
        };

        if let Some(result) = job.result {
            view.code = result.code;
            view.diagrams = result.diagrams;
            view.explained_segments = result.explained_segments;
            view.diagram_summary = Some(result.diagram_summary);
        }

        view
    }
}

/// Response to a cancellation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelJobResponse {
    pub job_id: JobId,
    /// False when the job had already finished
    pub cancelled: bool,
}
