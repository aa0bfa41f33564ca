//! Plansmith CLI
//!
//! Command-line interface for interacting with the Plansmith orchestrator.

mod commands;
mod config;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "plansmith")]
#[command(about = "Plansmith code generation CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "PLANSMITH_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    /// Seconds between status polls when waiting on a job
    #[arg(long, default_value = "2")]
    poll_interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
        poll_interval: Duration::from_secs(cli.poll_interval.max(1)),
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::{JobCommands, PlanCommands};
    use plansmith_core::domain::diagram::DiagramType;

    #[test]
    fn test_parse_job_implement_with_diagrams() {
        let cli = Cli::try_parse_from([
            "plansmith",
            "job",
            "implement",
            "--prompt",
            "a stack",
            "--diagram",
            "class,sequence",
            "--wait",
        ])
        .unwrap();

        assert_eq!(cli.orchestrator_url, "http://localhost:8080");
        match cli.command {
            Commands::Job {
                command:
                    JobCommands::Implement {
                        plan,
                        prompt,
                        diagram,
                        wait,
                        ..
                    },
            } => {
                assert!(plan.is_none());
                assert_eq!(prompt.as_deref(), Some("a stack"));
                assert_eq!(diagram, vec![DiagramType::Class, DiagramType::Sequence]);
                assert!(wait);
            }
            _ => panic!("expected job implement"),
        }
    }

    #[test]
    fn test_job_implement_requires_exactly_one_subject() {
        assert!(Cli::try_parse_from(["plansmith", "job", "implement"]).is_err());
        assert!(
            Cli::try_parse_from([
                "plansmith",
                "job",
                "implement",
                "--plan",
                "6f1c2a1e-7d8e-4f61-9a3b-1b2c3d4e5f60",
                "--prompt",
                "a stack",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_rejects_unknown_diagram_type() {
        assert!(
            Cli::try_parse_from([
                "plansmith",
                "job",
                "implement",
                "--prompt",
                "a stack",
                "--diagram",
                "gantt",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_plan_list_defaults_branch() {
        let cli = Cli::try_parse_from(["plansmith", "plan", "list", "--project", "acme/stack"])
            .unwrap();

        match cli.command {
            Commands::Plan {
                command: PlanCommands::List { project, branch },
            } => {
                assert_eq!(project, "acme/stack");
                assert_eq!(branch, "main");
            }
            _ => panic!("expected plan list"),
        }
    }

    #[test]
    fn test_plan_modify_language_is_optional() {
        let cli = Cli::try_parse_from([
            "plansmith",
            "plan",
            "modify",
            "6f1c2a1e-7d8e-4f61-9a3b-1b2c3d4e5f60",
            "--file",
            "items.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Plan {
                command: PlanCommands::Modify { file, language, .. },
            } => {
                assert_eq!(file, std::path::PathBuf::from("items.json"));
                assert!(language.is_none());
            }
            _ => panic!("expected plan modify"),
        }

        assert!(
            Cli::try_parse_from([
                "plansmith",
                "plan",
                "modify",
                "6f1c2a1e-7d8e-4f61-9a3b-1b2c3d4e5f60",
            ])
            .is_err()
        );
    }
}
