use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod generator;
pub mod repository;
pub mod service;

#[cfg(test)]
mod testing;

use config::Config;
use generator::OpenAiGenerator;
use repository::{InMemoryJobStore, InMemoryPlanStore, PgPlanStore, PlanStore};
use service::fanout::FanOutExecutor;
use service::job::JobService;
use service::pipeline::PipelineOrchestrator;
use service::plan::PlanService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plansmith_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Plansmith Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let plan_store: Arc<dyn PlanStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(database_url)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Arc::new(PgPlanStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, development plans are kept in memory");
            Arc::new(InMemoryPlanStore::new())
        }
    };

    let generator = Arc::new(
        OpenAiGenerator::new(&config.generator).context("Failed to create generator client")?,
    );
    tracing::info!(
        "Using model {} at {}",
        config.generator.model,
        config.generator.base_url
    );

    let plans = PlanService::new(generator.clone(), plan_store, config.default_language.clone());
    let pipeline = PipelineOrchestrator::new(
        generator,
        plans.clone(),
        Arc::new(InMemoryJobStore::new()),
        FanOutExecutor::new(config.worker_pool_size),
        config.backoff(),
        config.pipeline_settings(),
    );
    let jobs = JobService::new(Arc::new(pipeline), config.job_timeout);

    // Build router with all API endpoints
    let app = api::create_router(api::AppState { jobs, plans });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    tracing::info!("Orchestrator stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
