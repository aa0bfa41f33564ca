//! Pipeline Orchestrator
//!
//! Drives one job through fetch → implement → combine → analyze → diagram,
//! reporting each stage into the job store. Stages run strictly in sequence;
//! the implement and diagram stages fan out on the worker pool.
//!
//! Failure policy:
//! - fetch, implement, combine and analyze failures fail the job
//! - diagram failures are recorded per type in the result and the job still
//!   completes
//! - a cancelled job fails with the cancellation reason

use std::sync::Arc;

use plansmith_core::domain::diagram::{DiagramArtifact, DiagramType};
use plansmith_core::domain::job::{DiagramFailure, DiagramSummary, JobId, JobResult, JobStatus, JobSubject};
use plansmith_core::domain::plan::PlanItem;
use plansmith_core::domain::segment::ExplainedSegment;
use plansmith_core::dto::job::CreateJob;
use plansmith_core::dto::plan::GeneratePlan;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::generator::{
    DiagramSelection, GeneratedCode, GeneratedSegments, GenerationError, GenerationRequest,
    Generator, OutputShape, RawSegment, generate_as, prompt,
};
use crate::repository::{JobStore, JobStoreError};
use crate::service::cancel::JobCancellation;
use crate::service::fanout::{AggregateError, FanOutExecutor, FanOutTask};
use crate::service::plan::{PlanError, PlanService};
use crate::service::retry::{Backoff, RetryingGenerator};

/// Pipeline stage with its reported progress and step name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Implement,
    Combine,
    Analyze,
    Diagram,
    Done,
}

impl Stage {
    pub fn progress(self) -> u8 {
        match self {
            Stage::Fetch => 10,
            Stage::Implement => 30,
            Stage::Combine => 70,
            Stage::Analyze => 85,
            Stage::Diagram => 95,
            Stage::Done => 100,
        }
    }

    pub fn step(self) -> &'static str {
        match self {
            Stage::Fetch => "Fetching development plan",
            Stage::Implement => "Implementing code",
            Stage::Combine => "Combining implementations",
            Stage::Analyze => "Analyzing code segments",
            Stage::Diagram => "Generating diagrams",
            Stage::Done => "Completed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Used when a job names no diagram types and selection fails
    pub default_diagram_types: Vec<DiagramType>,
    /// Project a prompt job's plan is filed under when the job names none
    pub default_project_id: String,
    pub default_branch: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            default_diagram_types: DiagramType::DEFAULTS.to_vec(),
            default_project_id: "default".to_string(),
            default_branch: "main".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Plan(#[from] PlanError),

    #[error("development plan has no items")]
    EmptyPlan,

    #[error("implementation failed: {0}")]
    Implementation(AggregateError),

    #[error("there is no code to combine")]
    NoCode,

    #[error("failed to combine implementations: {0}")]
    Combine(GenerationError),

    #[error("failed to analyze code segments: {0}")]
    Analyze(GenerationError),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error(transparent)]
    JobStore(#[from] JobStoreError),
}

/// Plan content the later stages work from
struct PlanContext {
    language: String,
    purpose: String,
    items: Vec<PlanItem>,
}

pub struct PipelineOrchestrator {
    generator: Arc<dyn Generator>,
    plans: PlanService,
    jobs: Arc<dyn JobStore>,
    executor: FanOutExecutor,
    diagrams: RetryingGenerator,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        plans: PlanService,
        jobs: Arc<dyn JobStore>,
        executor: FanOutExecutor,
        backoff: Backoff,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            diagrams: RetryingGenerator::new(generator.clone(), backoff),
            generator,
            plans,
            jobs,
            executor,
            settings,
        }
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    /// Runs the pipeline for `job_id` and records its outcome
    ///
    /// Only job store failures are returned; pipeline failures end up as the
    /// job's error.
    pub async fn run(
        &self,
        job_id: JobId,
        request: &CreateJob,
        cancellation: &JobCancellation,
    ) -> Result<(), JobStoreError> {
        match self.execute(job_id, request, cancellation.token()).await {
            Ok(result) => {
                info!(
                    %job_id,
                    diagrams = result.diagram_summary.succeeded,
                    requested = result.diagram_summary.requested,
                    "Job completed"
                );
                self.jobs.set_result(job_id, result).await?;
                self.jobs
                    .update_job(job_id, JobStatus::Completed, Stage::Done.progress(), Stage::Done.step())
                    .await?;
            }
            Err(e) => {
                let message = match cancellation.reason() {
                    Some(reason) => reason.message().to_string(),
                    None => e.to_string(),
                };
                error!(%job_id, "Job failed: {}", message);
                self.jobs.set_error(job_id, &message).await?;
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        job_id: JobId,
        request: &CreateJob,
        cancel: &CancellationToken,
    ) -> Result<JobResult, PipelineError> {
        self.enter(job_id, Stage::Fetch, cancel).await?;
        let plan = self.fetch_plan(&request.subject, cancel).await?;

        self.enter(job_id, Stage::Implement, cancel).await?;
        let fragments = self.implement(&plan, cancel).await?;

        self.enter(job_id, Stage::Combine, cancel).await?;
        let code = self.combine(&plan.purpose, fragments, cancel).await?;

        self.enter(job_id, Stage::Analyze, cancel).await?;
        let explained_segments = self.analyze(&code, cancel).await?;

        self.enter(job_id, Stage::Diagram, cancel).await?;
        let diagram_types = self
            .resolve_diagram_types(&request.diagram_types, &code, cancel)
            .await;
        let (diagrams, diagram_summary) = self
            .generate_diagrams(&code, &plan.purpose, &diagram_types, cancel)
            .await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        Ok(JobResult {
            code,
            diagrams,
            explained_segments,
            diagram_summary,
        })
    }

    async fn enter(
        &self,
        job_id: JobId,
        stage: Stage,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        debug!(%job_id, step = stage.step(), progress = stage.progress(), "Entering stage");
        self.jobs
            .update_job(job_id, JobStatus::Processing, stage.progress(), stage.step())
            .await?;
        Ok(())
    }

    // =========================================================================
    // Stages
    // =========================================================================

    async fn fetch_plan(
        &self,
        subject: &JobSubject,
        cancel: &CancellationToken,
    ) -> Result<PlanContext, PipelineError> {
        let plan = match subject {
            JobSubject::DevPlan { dev_plan_id } => self.plans.get_dev_plan(*dev_plan_id).await?,
            JobSubject::Prompt {
                prompt,
                project_id,
                branch,
            } => {
                let req = GeneratePlan {
                    project_id: project_id
                        .clone()
                        .unwrap_or_else(|| self.settings.default_project_id.clone()),
                    branch: branch
                        .clone()
                        .unwrap_or_else(|| self.settings.default_branch.clone()),
                    prompt: prompt.clone(),
                };
                self.plans.generate_plan(req, cancel).await?
            }
        };

        if plan.plans.is_empty() {
            return Err(PipelineError::EmptyPlan);
        }

        Ok(PlanContext {
            language: plan.language,
            purpose: plan.purpose,
            items: plan.plans,
        })
    }

    /// One code fragment per plan item, in plan order
    async fn implement(
        &self,
        plan: &PlanContext,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, PipelineError> {
        let tasks = plan
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let generator = self.generator.clone();
                let task = prompt::implement_task(&plan.language, item);
                let cancel = cancel.clone();
                FanOutTask::new(format!("{} (item {})", item.label(), index + 1), async move {
                    let request = GenerationRequest::new(task, OutputShape::Code);
                    let generated: GeneratedCode =
                        generate_as(generator.as_ref(), request, &cancel).await?;
                    Ok((index, generated.code))
                })
            })
            .collect();

        let mut fragments = self
            .executor
            .run(tasks, cancel)
            .await
            .into_result()
            .map_err(PipelineError::Implementation)?;

        fragments.sort_by_key(|(index, _)| *index);
        Ok(fragments.into_iter().map(|(_, code)| code).collect())
    }

    async fn combine(
        &self,
        purpose: &str,
        fragments: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let fragments = select_fragments(fragments);
        if fragments.is_empty() {
            return Err(PipelineError::NoCode);
        }

        let request = GenerationRequest::new(
            prompt::combine_task(purpose, &fragments),
            OutputShape::Combined,
        );
        let combined: GeneratedCode = generate_as(self.generator.as_ref(), request, cancel)
            .await
            .map_err(PipelineError::Combine)?;

        if combined.code.trim().is_empty() {
            return Err(PipelineError::Combine(GenerationError::malformed(
                OutputShape::Combined,
                "combined code is empty",
            )));
        }
        Ok(combined.code)
    }

    async fn analyze(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ExplainedSegment>, PipelineError> {
        let request = GenerationRequest::new(prompt::segments_task(code), OutputShape::Segments);
        let generated: GeneratedSegments = generate_as(self.generator.as_ref(), request, cancel)
            .await
            .map_err(PipelineError::Analyze)?;

        Ok(normalize_segments(generated.code_segments, code))
    }

    /// Requested types, or the generator's pick, or the configured defaults
    async fn resolve_diagram_types(
        &self,
        requested: &[DiagramType],
        code: &str,
        cancel: &CancellationToken,
    ) -> Vec<DiagramType> {
        if !requested.is_empty() {
            return dedup_types(requested.iter().copied());
        }

        let request = GenerationRequest::new(
            prompt::diagram_selection_task(code),
            OutputShape::DiagramSelection,
        );
        let selected = match generate_as::<DiagramSelection>(self.generator.as_ref(), request, cancel).await {
            Ok(selection) => dedup_types(
                selection
                    .selected_types
                    .iter()
                    .filter_map(|name| name.parse().ok()),
            ),
            Err(e) => {
                warn!("Diagram type selection failed, using defaults: {}", e);
                Vec::new()
            }
        };

        if selected.is_empty() {
            self.default_diagram_types()
        } else {
            selected
        }
    }

    fn default_diagram_types(&self) -> Vec<DiagramType> {
        if self.settings.default_diagram_types.is_empty() {
            return DiagramType::DEFAULTS.to_vec();
        }
        dedup_types(self.settings.default_diagram_types.iter().copied())
    }

    /// Accepted diagrams in requested order, plus the success/total summary
    async fn generate_diagrams(
        &self,
        code: &str,
        purpose: &str,
        diagram_types: &[DiagramType],
        cancel: &CancellationToken,
    ) -> (Vec<DiagramArtifact>, DiagramSummary) {
        let code: Arc<str> = Arc::from(code);
        let purpose: Arc<str> = Arc::from(purpose);

        let tasks = diagram_types
            .iter()
            .map(|&diagram_type| {
                let diagrams = self.diagrams.clone();
                let code = code.clone();
                let purpose = purpose.clone();
                let cancel = cancel.clone();
                FanOutTask::new(diagram_type.as_str(), async move {
                    diagrams
                        .generate_diagram(&code, &purpose, diagram_type, &cancel)
                        .await
                })
            })
            .collect();

        let report = self.executor.run(tasks, cancel).await;

        let mut diagrams = report.results;
        diagrams.sort_by_key(|d| position_of(diagram_types, d.diagram_type));

        let mut failures: Vec<DiagramFailure> = report
            .failures
            .into_iter()
            .filter_map(|failure| {
                let diagram_type = diagram_types
                    .iter()
                    .copied()
                    .find(|t| t.as_str() == failure.label)?;
                Some(DiagramFailure {
                    diagram_type,
                    error: failure.error.to_string(),
                })
            })
            .collect();
        failures.sort_by_key(|f| position_of(diagram_types, f.diagram_type));

        let summary = DiagramSummary {
            requested: diagram_types.len(),
            succeeded: diagrams.len(),
            failures,
        };
        if summary.is_partial() {
            warn!(
                "Generated {} of {} diagram(s)",
                summary.succeeded, summary.requested
            );
        }

        (diagrams, summary)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Drops empty and whitespace-only fragments
fn select_fragments(fragments: Vec<String>) -> Vec<String> {
    fragments
        .into_iter()
        .filter(|fragment| !fragment.trim().is_empty())
        .collect()
}

/// Fits segments to the code's 1-based inclusive line range, ordered by start
fn normalize_segments(segments: Vec<RawSegment>, code: &str) -> Vec<ExplainedSegment> {
    let total_lines = u32::try_from(code.lines().count()).unwrap_or(u32::MAX);
    let before = segments.len();
    let mut segments: Vec<_> = segments
        .into_iter()
        .filter_map(|segment| segment.into_segment(total_lines))
        .collect();
    if segments.len() < before {
        debug!("Dropped {} out-of-range segment(s)", before - segments.len());
    }
    segments.sort_by_key(|s| (s.start_line, s.end_line));
    segments
}

fn dedup_types(types: impl IntoIterator<Item = DiagramType>) -> Vec<DiagramType> {
    let mut unique = Vec::new();
    for diagram_type in types {
        if !unique.contains(&diagram_type) {
            unique.push(diagram_type);
        }
    }
    unique
}

fn position_of(types: &[DiagramType], diagram_type: DiagramType) -> usize {
    types
        .iter()
        .position(|t| *t == diagram_type)
        .unwrap_or(usize::MAX)
}
