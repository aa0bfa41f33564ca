//! Retry-and-validate loop
//!
//! A single target (one diagram type) is attempted at most [`MAX_ATTEMPTS`]
//! times. A generator failure and a validation failure both consume an
//! attempt; the first artifact that generates and validates is accepted.
//! Between attempts the loop sleeps with exponential backoff plus jitter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use plansmith_core::domain::diagram::{DiagramArtifact, DiagramType};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::generator::{
    GeneratedDiagram, GenerationError, GenerationRequest, Generator, OutputShape, generate_as,
    prompt,
};
use crate::service::validator::validate_diagram;

/// Attempts per target, including the first one
pub const MAX_ATTEMPTS: u32 = 3;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: Duration) -> Self {
        Self { base, max, jitter }
    }

    /// No delay at all
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Delay after the given failed attempt (1-based)
    ///
    /// `base * 2^(attempt-1)` capped at `max`, plus up to `jitter` extra.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1 << exponent).min(self.max);

        if self.jitter.is_zero() {
            return delay;
        }
        let jitter_ms = self.jitter.as_millis() as u64;
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(250),
            Duration::from_secs(4),
            Duration::from_millis(100),
        )
    }
}

/// Generator wrapper that retries until an artifact is accepted
#[derive(Clone)]
pub struct RetryingGenerator {
    generator: Arc<dyn Generator>,
    backoff: Backoff,
}

impl RetryingGenerator {
    pub fn new(generator: Arc<dyn Generator>, backoff: Backoff) -> Self {
        Self { generator, backoff }
    }

    /// Runs `attempt_fn` until it succeeds or the attempt budget is spent
    ///
    /// `attempt_fn` receives the 1-based attempt number. Cancellation is never
    /// retried and interrupts the backoff sleep.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            match attempt_fn(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} accepted after {} attempt(s)", label, attempt);
                    }
                    return Ok(value);
                }
                Err(GenerationError::Cancelled) => return Err(GenerationError::Cancelled),
                Err(e) => {
                    if attempt >= MAX_ATTEMPTS {
                        warn!("{} rejected after {} attempts: {}", label, MAX_ATTEMPTS, e);
                        return Err(GenerationError::Exhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }

                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        label, attempt, MAX_ATTEMPTS, e, delay
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Generates one diagram of `diagram_type` for the given code
    pub async fn generate_diagram(
        &self,
        code: &str,
        purpose: &str,
        diagram_type: DiagramType,
        cancel: &CancellationToken,
    ) -> Result<DiagramArtifact, GenerationError> {
        let label = format!("{} diagram", diagram_type);

        self.run(&label, cancel, |attempt| async move {
            debug!(%diagram_type, attempt, "Generating diagram");
            let request = GenerationRequest::new(
                prompt::diagram_task(code, purpose, diagram_type, attempt),
                OutputShape::Diagram(diagram_type),
            );
            let generated: GeneratedDiagram =
                generate_as(self.generator.as_ref(), request, cancel).await?;

            let body = strip_code_fence(&generated.diagram);
            validate_diagram(&body, diagram_type)?;

            Ok(DiagramArtifact {
                diagram_type,
                body,
            })
        })
        .await
    }
}

/// Removes a surrounding ```mermaid fence if the model added one anyway
fn strip_code_fence(diagram: &str) -> String {
    let trimmed = diagram.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let inner = inner.strip_prefix("mermaid").unwrap_or(inner);
    inner
        .strip_suffix("```")
        .unwrap_or(inner)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::validator::ValidationError;
    use crate::testing::ScriptedGenerator;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn retrying(generator: Arc<ScriptedGenerator>) -> RetryingGenerator {
        RetryingGenerator::new(generator, Backoff::none())
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::ZERO,
        );
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(300));
        assert_eq!(backoff.delay_for(40), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_secs(1),
            Duration::from_millis(50),
        );
        for _ in 0..50 {
            let delay = backoff.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
        assert_eq!(Backoff::none().delay_for(3), Duration::ZERO);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(
            strip_code_fence("```mermaid\nflowchart TD\n  A --> B\n```"),
            "flowchart TD\n  A --> B"
        );
        assert_eq!(strip_code_fence("  flowchart TD\n  A --> B "), "flowchart TD\n  A --> B");
    }

    #[tokio::test]
    async fn test_accepts_first_valid_diagram() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Ok(json!({ "diagram": "flowchart TD\n  A --> B" }))
        }));
        let artifact = retrying(generator.clone())
            .generate_diagram("fn main() {}", "demo", DiagramType::Flowchart, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(artifact.diagram_type, DiagramType::Flowchart);
        assert_eq!(artifact.body, "flowchart TD\n  A --> B");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_after_validation_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let generator = Arc::new(ScriptedGenerator::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(json!({ "diagram": "graph TD\n  A --> B" }))
            } else {
                Ok(json!({ "diagram": "flowchart TD\n  A --> B" }))
            }
        }));

        let artifact = retrying(generator.clone())
            .generate_diagram("fn main() {}", "demo", DiagramType::Flowchart, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(artifact.body, "flowchart TD\n  A --> B");
        assert_eq!(generator.calls(), 2);
        assert!(generator.requests()[1].task.contains("attempt 2 of 3"));
    }

    #[tokio::test]
    async fn test_never_exceeds_max_attempts() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Ok(json!({ "diagram": "flowchart TD" }))
        }));

        let err = retrying(generator.clone())
            .generate_diagram("fn main() {}", "demo", DiagramType::Flowchart, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(generator.calls(), MAX_ATTEMPTS as usize);
        match err {
            GenerationError::Exhausted { attempts, last } => {
                assert_eq!(attempts, MAX_ATTEMPTS);
                assert!(matches!(
                    *last,
                    GenerationError::Validation(ValidationError::TooShort)
                ));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generator_errors_consume_attempts() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(GenerationError::Transport("connection reset".to_string()))
        }));

        let err = retrying(generator.clone())
            .generate_diagram("fn main() {}", "demo", DiagramType::Class, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Exhausted { attempts: 3, .. }));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_stops_retrying() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(GenerationError::Transport("connection reset".to_string()))
        }));
        let cancel = CancellationToken::new();
        let slow = RetryingGenerator::new(
            generator.clone(),
            Backoff::new(Duration::from_secs(60), Duration::from_secs(60), Duration::ZERO),
        );

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = slow
            .generate_diagram("fn main() {}", "demo", DiagramType::Class, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(generator.calls(), 1);
    }
}
