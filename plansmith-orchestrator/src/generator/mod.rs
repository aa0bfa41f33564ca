//! Generator collaborator
//!
//! A Generator turns a textual task description into a structured artifact
//! (a plan, code, explained segments or a diagram). The pipeline only depends
//! on the [`Generator`] trait; [`OpenAiGenerator`] is the production backend.
//!
//! Every call takes a [`CancellationToken`] so an abandoned job stops waiting
//! on the remote model.

pub mod openai;
pub mod prompt;
mod shape;

pub use openai::OpenAiGenerator;
pub use shape::{
    GeneratedCode, GeneratedDiagram, GeneratedPlan, GeneratedSegments, DiagramSelection,
    OutputShape, RawSegment,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::service::validator::ValidationError;

/// Input to a single Generator call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Task description handed to the model
    pub task: String,
    /// Shape the artifact must match
    pub shape: OutputShape,
}

impl GenerationRequest {
    pub fn new(task: impl Into<String>, shape: OutputShape) -> Self {
        Self {
            task: task.into(),
            shape,
        }
    }
}

/// Errors from generating (and accepting) an artifact
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request never reached the backend or the connection broke
    #[error("generator request failed: {0}")]
    Transport(String),

    /// The backend answered with an error status
    #[error("generator returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The backend answered but the artifact does not match its shape
    #[error("malformed {shape} output: {reason}")]
    Malformed { shape: &'static str, reason: String },

    /// A generated diagram failed structural checks
    #[error("diagram rejected: {0}")]
    Validation(#[from] ValidationError),

    /// Every attempt of a retried call failed
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<GenerationError>,
    },

    #[error("generation cancelled")]
    Cancelled,

    /// The task running the call panicked or was aborted
    #[error("generation task aborted: {0}")]
    Aborted(String),
}

impl GenerationError {
    pub fn malformed(shape: OutputShape, reason: impl Into<String>) -> Self {
        Self::Malformed {
            shape: shape.name(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }
}

/// Produces structured artifacts from task descriptions
///
/// Implementations must be safe to call concurrently and must surface
/// malformed output as an error rather than a partially populated artifact.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generates one artifact matching `request.shape`
    ///
    /// Must return [`GenerationError::Cancelled`] promptly once `cancel` fires.
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, GenerationError>;
}

/// Calls the generator and deserializes the artifact into `T`
pub async fn generate_as<T: DeserializeOwned>(
    generator: &dyn Generator,
    request: GenerationRequest,
    cancel: &CancellationToken,
) -> Result<T, GenerationError> {
    let shape = request.shape;
    let value = generator.generate(request, cancel).await?;
    serde_json::from_value(value).map_err(|e| GenerationError::malformed(shape, e.to_string()))
}
