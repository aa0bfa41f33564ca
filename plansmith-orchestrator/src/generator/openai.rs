//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{GenerationError, GenerationRequest, Generator, OutputShape};
use crate::config::GeneratorConfig;

const SYSTEM_PROMPT: &str = "You are a senior software engineer. \
    Answer only with JSON matching the requested schema.";

/// Generator backed by a `/chat/completions` endpoint with strict JSON schema output
///
/// Built once at startup and shared through `Arc<dyn Generator>`.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &GeneratorConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let shape = request.shape;
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.task },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": shape.name(),
                    "description": shape.description(),
                    "schema": shape.schema(),
                    "strict": true,
                }
            }
        })
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| GenerationError::malformed(request.shape, e.to_string()))?;

        parse_content(request.shape, completion)
    }
}

fn parse_content(shape: OutputShape, completion: ChatCompletion) -> Result<Value, GenerationError> {
    let message = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| GenerationError::malformed(shape, "response has no choices"))?;

    if let Some(refusal) = message.refusal {
        return Err(GenerationError::malformed(shape, format!("refused: {refusal}")));
    }

    let content = message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| GenerationError::malformed(shape, "response has no content"))?;

    serde_json::from_str(&content).map_err(|e| GenerationError::malformed(shape, e.to_string()))
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, GenerationError> {
        debug!(shape = request.shape.name(), model = %self.model, "Calling generator");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            result = self.complete(request) => result,
        }
    }
}
