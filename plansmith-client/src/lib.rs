//! Plansmith HTTP Client
//!
//! A type-safe HTTP client for the Plansmith orchestrator API, shared by the
//! CLI and any other tool that launches or polls jobs.
//!
//! # Example
//!
//! ```no_run
//! use plansmith_client::PlansmithClient;
//! use plansmith_core::domain::job::JobSubject;
//! use plansmith_core::dto::job::CreateJob;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PlansmithClient::new("http://localhost:8080");
//!
//!     let created = client
//!         .launch_job(CreateJob {
//!             subject: JobSubject::Prompt {
//!                 prompt: "A bounded stack with push and pop".to_string(),
//!                 project_id: None,
//!                 branch: None,
//!             },
//!             diagram_types: vec![],
//!         })
//!         .await?;
//!
//!     let status = client
//!         .wait_for_job(created.job_id, Duration::from_secs(2), Duration::from_secs(600))
//!         .await?;
//!     println!("Job finished: {}", status.status);
//!     Ok(())
//! }
//! ```

pub mod error;
mod jobs;
mod plans;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Plansmith orchestrator API
///
/// Methods are grouped by resource:
/// - Development plans (generate, get, list)
/// - Jobs (launch, status, result, cancel, wait)
#[derive(Debug, Clone)]
pub struct PlansmithClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl PlansmithClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use plansmith_client::PlansmithClient;
    ///
    /// let client = PlansmithClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Non-success statuses become [`ClientError::ApiError`] carrying the
    /// server's error message.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = PlansmithClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = PlansmithClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = PlansmithClient::with_client("http://localhost:8080", Client::new());
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}

/// Minimal in-process orchestrator used by the endpoint tests
#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;

    /// Serves `router` on an ephemeral port and returns a client for it
    pub async fn spawn(router: Router) -> crate::PlansmithClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        crate::PlansmithClient::new(format!("http://{}", addr))
    }
}
