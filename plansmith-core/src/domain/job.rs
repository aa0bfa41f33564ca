//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::diagram::{DiagramArtifact, DiagramType};
use crate::domain::segment::ExplainedSegment;

/// Job identifier
pub type JobId = Uuid;

/// Trackable handle for one asynchronous pipeline run
///
/// Mutated only by the orchestrator through its job store. Invariants kept by
/// [`Job::apply_update`] and [`Job::fail`]:
/// - `completed_at` is set iff the status is terminal
/// - `progress` never decreases
/// - the status never moves backwards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub subject: JobSubject,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: String,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a job works on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSubject {
    /// A development plan already held by the plan store
    DevPlan { dev_plan_id: Uuid },
    /// A free-form request; a plan is generated and stored first
    Prompt {
        prompt: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        branch: Option<String>,
    },
}

/// Terminal payload attached to a completed job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub code: String,
    pub diagrams: Vec<DiagramArtifact>,
    pub explained_segments: Vec<ExplainedSegment>,
    pub diagram_summary: DiagramSummary,
}

/// Success/total accounting for the diagram stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failures: Vec<DiagramFailure>,
}

impl DiagramSummary {
    /// True when fewer diagrams were produced than requested
    pub fn is_partial(&self) -> bool {
        self.succeeded < self.requested
    }
}

/// A diagram type that could not be produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramFailure {
    pub diagram_type: DiagramType,
    pub error: String,
}

impl Job {
    /// Creates a pending job for the given subject
    pub fn new(subject: JobSubject, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject,
            status: JobStatus::Pending,
            progress: 0,
            current_step: "Initializing".to_string(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a status/progress/step update
    ///
    /// Returns `false` and leaves the job untouched when the update would move
    /// the status backwards. Progress is clamped to 100 and never lowered.
    /// Entering (or re-entering) a terminal status stamps `completed_at`.
    pub fn apply_update(
        &mut self,
        status: JobStatus,
        progress: u8,
        current_step: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if status.rank() < self.status.rank() {
            return false;
        }

        self.status = status;
        self.progress = self.progress.max(progress.min(100));
        self.current_step = current_step.into();
        self.updated_at = now;

        if status.is_terminal() {
            self.completed_at = Some(now);
        }

        true
    }

    /// Records a terminal error and forces the job to `Failed`
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.error = Some(error.into());
        self.status = JobStatus::Failed;
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}
