//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod plan;

pub use job::JobCommands;
pub use plan::PlanCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Development plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Pipeline job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Plan { command } => plan::handle_plan_command(command, config).await,
        Commands::Job { command } => job::handle_job_command(command, config).await,
    }
}
