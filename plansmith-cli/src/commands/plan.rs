//! Plan command handlers
//!
//! Generates development plans from prompts, shows stored ones and rewrites
//! their items from a JSON file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use plansmith_client::PlansmithClient;
use plansmith_core::domain::plan::{DevPlan, PlanItem};
use plansmith_core::dto::plan::{GeneratePlan, ModifyPlan};
use uuid::Uuid;

use crate::config::Config;

/// Plan subcommands
#[derive(Subcommand)]
pub enum PlanCommands {
    /// Generate and store a development plan from a prompt
    Generate {
        /// What to build
        prompt: String,

        /// Project the plan belongs to
        #[arg(short, long)]
        project: String,

        /// Branch within the project
        #[arg(short, long, default_value = "main")]
        branch: String,
    },
    /// Show a development plan
    Get {
        /// Development plan ID
        id: Uuid,
    },
    /// List the plans of a project branch
    List {
        /// Project ID
        #[arg(short, long)]
        project: String,

        /// Branch within the project
        #[arg(short, long, default_value = "main")]
        branch: String,
    },
    /// Replace the items of a plan
    Modify {
        /// Development plan ID
        id: Uuid,

        /// JSON file holding the new plan items
        #[arg(short, long)]
        file: PathBuf,

        /// New language; the plan's current one is kept when omitted
        #[arg(short, long)]
        language: Option<String>,
    },
}

/// Handle plan commands
pub async fn handle_plan_command(command: PlanCommands, config: &Config) -> Result<()> {
    let client = PlansmithClient::new(&config.orchestrator_url);

    match command {
        PlanCommands::Generate {
            prompt,
            project,
            branch,
        } => generate_plan(&client, prompt, project, branch).await,
        PlanCommands::Get { id } => get_plan(&client, id).await,
        PlanCommands::List { project, branch } => list_plans(&client, &project, &branch).await,
        PlanCommands::Modify { id, file, language } => {
            modify_plan(&client, id, &file, language).await
        }
    }
}

async fn generate_plan(
    client: &PlansmithClient,
    prompt: String,
    project_id: String,
    branch: String,
) -> Result<()> {
    println!("{}", "Generating development plan...".dimmed());

    let plan = client
        .generate_plan(GeneratePlan {
            project_id,
            branch,
            prompt,
        })
        .await
        .context("Failed to generate development plan")?;

    println!("{}", "✓ Development plan created!".green().bold());
    println!();
    print_plan_details(&plan);

    Ok(())
}

async fn get_plan(client: &PlansmithClient, id: Uuid) -> Result<()> {
    let plan = client.get_dev_plan(id).await?;

    print_plan_details(&plan);

    Ok(())
}

async fn list_plans(client: &PlansmithClient, project_id: &str, branch: &str) -> Result<()> {
    let plans = client.list_dev_plans(project_id, branch).await?;

    if plans.is_empty() {
        println!(
            "{}",
            format!("No plans found for {}@{}.", project_id, branch).yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} plan(s) for {}@{}:", plans.len(), project_id, branch).bold()
    );
    println!();
    for plan in plans {
        println!("  {} Plan {}", "▸".cyan(), plan.id.to_string().dimmed());
        println!("    Language: {}", plan.language);
        println!("    Purpose:  {}", plan.purpose);
        println!(
            "    Created:  {}",
            plan.created_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
        println!();
    }

    Ok(())
}

async fn modify_plan(
    client: &PlansmithClient,
    id: Uuid,
    file: &Path,
    language: Option<String>,
) -> Result<()> {
    let plans = read_plan_items(file)?;

    let language = match language {
        Some(language) => language,
        None => client.get_dev_plan(id).await?.language,
    };

    let plan = client
        .modify_plan(id, ModifyPlan { language, plans })
        .await
        .context("Failed to modify development plan")?;

    println!("{}", "✓ Development plan updated!".green().bold());
    println!();
    print_plan_details(&plan);

    Ok(())
}

/// Reads plan items from `path`: a bare array or an object with a `plans` field
fn read_plan_items(path: &Path) -> Result<Vec<PlanItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file: {}", path.display()))?;
    parse_plan_items(&content)
        .with_context(|| format!("Invalid plan file: {}", path.display()))
}

fn parse_plan_items(content: &str) -> Result<Vec<PlanItem>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum PlanFile {
        Items(Vec<PlanItem>),
        Plan { plans: Vec<PlanItem> },
    }

    let items = match serde_json::from_str(content)? {
        PlanFile::Items(items) => items,
        PlanFile::Plan { plans } => plans,
    };
    Ok(items)
}

/// Print a plan with all of its items
fn print_plan_details(plan: &DevPlan) {
    println!("{}", "Development Plan:".bold());
    println!("  ID:       {}", plan.id.to_string().cyan());
    println!("  Project:  {}@{}", plan.project_id, plan.branch);
    println!("  Language: {}", plan.language);
    println!("  Purpose:  {}", plan.purpose);
    println!(
        "  Created:  {}",
        plan.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    println!("\n{}", format!("Items ({}):", plan.plans.len()).bold());
    for item in &plan.plans {
        match item.class_name() {
            Some(class) => println!("  {} {}", "class".dimmed(), class.cyan()),
            None => println!("  {}", "free functions".dimmed()),
        }
        for annotation in &item.annotations {
            println!(
                "    - {}({}) -> {}",
                annotation.name.bold(),
                annotation.params,
                annotation.returns
            );
            println!("      {}", annotation.description.dimmed());
        }
    }
}
