//! Job command handlers
//!
//! Launches pipeline jobs and follows them through status and result
//! queries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Subcommand};
use colored::*;
use plansmith_client::PlansmithClient;
use plansmith_core::domain::diagram::DiagramType;
use plansmith_core::domain::job::{JobStatus, JobSubject};
use plansmith_core::dto::job::{CreateJob, JobResultView, JobStatusView};
use uuid::Uuid;

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Implement a stored plan or a prompt
    #[command(group(ArgGroup::new("subject").required(true).args(["plan", "prompt"])))]
    Implement {
        /// Development plan ID
        #[arg(long)]
        plan: Option<Uuid>,

        /// Free-form request; a plan is generated first
        #[arg(long)]
        prompt: Option<String>,

        /// Project for a generated plan
        #[arg(long, requires = "prompt")]
        project: Option<String>,

        /// Branch for a generated plan
        #[arg(long, requires = "prompt")]
        branch: Option<String>,

        /// Diagram types to render (comma-separated); the orchestrator picks when omitted
        #[arg(short, long, value_delimiter = ',')]
        diagram: Vec<DiagramType>,

        /// Wait for the job to finish and print its result
        #[arg(short, long)]
        wait: bool,

        /// Maximum seconds to wait
        #[arg(long, default_value = "900", requires = "wait")]
        timeout: u64,
    },
    /// Show job progress
    Status {
        /// Job ID
        id: Uuid,
    },
    /// Show the job outcome
    Result {
        /// Job ID
        id: Uuid,

        /// Write code, diagrams and segments into this directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// Cancel a running job
    Cancel {
        /// Job ID
        id: Uuid,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = PlansmithClient::new(&config.orchestrator_url);

    match command {
        JobCommands::Implement {
            plan,
            prompt,
            project,
            branch,
            diagram,
            wait,
            timeout,
        } => {
            let subject = match (plan, prompt) {
                (Some(dev_plan_id), _) => JobSubject::DevPlan { dev_plan_id },
                (None, Some(prompt)) => JobSubject::Prompt {
                    prompt,
                    project_id: project,
                    branch,
                },
                (None, None) => anyhow::bail!("either --plan or --prompt is required"),
            };
            let req = CreateJob {
                subject,
                diagram_types: diagram,
            };
            let wait = wait.then(|| std::time::Duration::from_secs(timeout));
            implement(&client, config, req, wait).await
        }
        JobCommands::Status { id } => show_status(&client, id).await,
        JobCommands::Result { id, out_dir } => show_result(&client, id, out_dir.as_deref()).await,
        JobCommands::Cancel { id } => cancel(&client, id).await,
    }
}

async fn implement(
    client: &PlansmithClient,
    config: &Config,
    req: CreateJob,
    wait: Option<std::time::Duration>,
) -> Result<()> {
    let created = client
        .launch_job(req)
        .await
        .context("Failed to launch job")?;

    println!("{}", format!("✓ {}", created.message).green().bold());
    println!("  Job ID: {}", created.job_id.to_string().cyan());

    let Some(timeout) = wait else {
        println!(
            "{}",
            format!("  Follow it with: plansmith job status {}", created.job_id).dimmed()
        );
        return Ok(());
    };

    println!("{}", "Waiting for the job to finish...".dimmed());
    let status = client
        .wait_for_job(created.job_id, config.poll_interval, timeout)
        .await?;
    print_status(&status);

    let result = client.get_job_result(created.job_id).await?;
    println!();
    print_result(&result);

    Ok(())
}

async fn show_status(client: &PlansmithClient, id: Uuid) -> Result<()> {
    let status = client.get_job_status(id).await?;

    print_status(&status);

    Ok(())
}

async fn show_result(client: &PlansmithClient, id: Uuid, out_dir: Option<&Path>) -> Result<()> {
    let result = client.get_job_result(id).await?;

    print_result(&result);

    if let Some(dir) = out_dir {
        if result.status != JobStatus::Completed {
            anyhow::bail!("job {} has no result to write yet", id);
        }
        write_result(&result, dir)?;
        println!(
            "\n{}",
            format!("✓ Result written to {}", dir.display()).green()
        );
    }

    Ok(())
}

async fn cancel(client: &PlansmithClient, id: Uuid) -> Result<()> {
    let response = client.cancel_job(id).await?;

    if response.cancelled {
        println!("{}", format!("✓ Cancellation requested for job {}", id).green());
    } else {
        println!("{}", format!("Job {} has already finished.", id).yellow());
    }

    Ok(())
}

/// Write code, diagrams and segments of a completed job into `dir`
fn write_result(result: &JobResultView, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let code_path = dir.join("code.txt");
    std::fs::write(&code_path, &result.code)
        .with_context(|| format!("Failed to write {}", code_path.display()))?;

    for diagram in &result.diagrams {
        let path = dir.join(format!("{}.mmd", diagram.diagram_type.as_str()));
        std::fs::write(&path, &diagram.body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let segments_path = dir.join("segments.json");
    let segments = serde_json::to_string_pretty(&result.explained_segments)?;
    std::fs::write(&segments_path, segments)
        .with_context(|| format!("Failed to write {}", segments_path.display()))?;

    Ok(())
}

fn print_status(status: &JobStatusView) {
    println!("{}", "Job Status:".bold());
    println!("  ID:       {}", status.job_id.to_string().cyan());
    println!("  Status:   {}", colorize_status(status.status));
    println!("  Progress: {}%", status.progress);
    println!("  Step:     {}", status.current_step);
    println!(
        "  Updated:  {}",
        status.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

fn print_result(result: &JobResultView) {
    println!("{}", "Job Result:".bold());
    println!("  ID:     {}", result.job_id.to_string().cyan());
    println!("  Status: {}", colorize_status(result.status));

    if let Some(completed) = result.completed_at {
        println!("  Done:   {}", completed.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(error) = &result.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
        return;
    }

    if result.status != JobStatus::Completed {
        println!("{}", "  No result yet.".yellow());
        return;
    }

    println!("\n{}", "Code:".bold());
    println!("{}", "─".repeat(80).dimmed());
    for (n, line) in result.code.lines().enumerate() {
        println!("{} {}", format!("{:>4}", n + 1).dimmed(), line);
    }
    println!("{}", "─".repeat(80).dimmed());

    if !result.explained_segments.is_empty() {
        println!("\n{}", "Segments:".bold());
        for segment in &result.explained_segments {
            println!(
                "  {} {}",
                format!("L{}-{}", segment.start_line, segment.end_line).cyan(),
                segment.explanation
            );
        }
    }

    for diagram in &result.diagrams {
        println!(
            "\n{}",
            format!("Diagram ({}):", diagram.diagram_type.as_str()).bold()
        );
        println!("{}", diagram.body);
    }

    if let Some(summary) = &result.diagram_summary {
        if summary.is_partial() {
            println!(
                "\n{}",
                format!(
                    "⚠ {} of {} diagrams produced",
                    summary.succeeded, summary.requested
                )
                .yellow()
            );
            for failure in &summary.failures {
                println!(
                    "  {} {}: {}",
                    "✗".red(),
                    failure.diagram_type.as_str(),
                    failure.error.dimmed()
                );
            }
        }
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobStatus::Pending => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
    }
}
