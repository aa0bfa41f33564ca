//! Configuration module
//!
//! Handles CLI configuration including orchestrator URL and polling settings.

use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
    /// Delay between status polls when waiting on a job
    pub poll_interval: Duration,
}
