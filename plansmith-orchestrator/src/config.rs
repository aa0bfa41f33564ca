//! Orchestrator configuration
//!
//! Defines the bind address, generator connection, worker pool size, retry
//! schedule and pipeline defaults. Everything is read from the environment.

use std::time::Duration;

use anyhow::Context;
use plansmith_core::domain::diagram::DiagramType;

use crate::service::pipeline::PipelineSettings;
use crate::service::retry::Backoff;

/// Connection settings for the generator backend
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    pub model: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Postgres URL for the plan store; plans are kept in memory when unset
    pub database_url: Option<String>,

    pub generator: GeneratorConfig,

    /// Number of fan-out workers per stage
    pub worker_pool_size: usize,

    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub retry_jitter: Duration,

    /// Deadline for a whole job; `None` disables it
    pub job_timeout: Option<Duration>,

    /// Language used when a generated plan names none
    pub default_language: String,

    /// Diagram types used when a job names none and selection fails
    pub default_diagram_types: Vec<DiagramType>,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - GENERATOR_API_KEY (required, falls back to OPENAI_API_KEY)
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:8080)
    /// - DATABASE_URL (optional)
    /// - GENERATOR_BASE_URL (optional, default: https://api.openai.com/v1)
    /// - GENERATOR_MODEL (optional, default: gpt-4o-mini)
    /// - GENERATOR_TIMEOUT (optional, seconds, default: 120)
    /// - WORKER_POOL_SIZE (optional, default: 4)
    /// - RETRY_BASE_DELAY_MS / RETRY_MAX_DELAY_MS / RETRY_JITTER_MS (optional)
    /// - JOB_TIMEOUT (optional, seconds, default: 600, 0 disables)
    /// - DEFAULT_LANGUAGE (optional, default: go)
    /// - DEFAULT_DIAGRAM_TYPES (optional, comma separated, default: flowchart,sequence,class)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("GENERATOR_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("GENERATOR_API_KEY (or OPENAI_API_KEY) environment variable not set")
            })?;

        let parse_u64 = |key: &str| -> anyhow::Result<Option<u64>> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .with_context(|| format!("{key} must be a non-negative integer"))
                })
                .transpose()
        };

        let default_diagram_types = match lookup("DEFAULT_DIAGRAM_TYPES") {
            Some(value) => parse_diagram_types(&value)?,
            None => defaults.default_diagram_types.clone(),
        };

        let job_timeout = match parse_u64("JOB_TIMEOUT")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.job_timeout,
        };

        Ok(Self {
            bind_addr: lookup("ORCHESTRATOR_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            generator: GeneratorConfig {
                api_key,
                base_url: lookup("GENERATOR_BASE_URL").unwrap_or(defaults.generator.base_url),
                model: lookup("GENERATOR_MODEL").unwrap_or(defaults.generator.model),
                timeout: parse_u64("GENERATOR_TIMEOUT")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.generator.timeout),
            },
            worker_pool_size: parse_u64("WORKER_POOL_SIZE")?
                .map(|n| n as usize)
                .unwrap_or(defaults.worker_pool_size),
            retry_base_delay: parse_u64("RETRY_BASE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            retry_max_delay: parse_u64("RETRY_MAX_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_max_delay),
            retry_jitter: parse_u64("RETRY_JITTER_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_jitter),
            job_timeout,
            default_language: lookup("DEFAULT_LANGUAGE").unwrap_or(defaults.default_language),
            default_diagram_types,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.generator.api_key.trim().is_empty() {
            anyhow::bail!("generator api_key cannot be empty");
        }

        if !self.generator.base_url.starts_with("http://")
            && !self.generator.base_url.starts_with("https://")
        {
            anyhow::bail!("generator base_url must start with http:// or https://");
        }

        if self.generator.model.trim().is_empty() {
            anyhow::bail!("generator model cannot be empty");
        }

        if self.generator.timeout.is_zero() {
            anyhow::bail!("generator timeout must be greater than 0");
        }

        if self.worker_pool_size == 0 {
            anyhow::bail!("worker_pool_size must be greater than 0");
        }

        if self.retry_max_delay < self.retry_base_delay {
            anyhow::bail!("retry_max_delay must not be smaller than retry_base_delay");
        }

        if self.default_language.trim().is_empty() {
            anyhow::bail!("default_language cannot be empty");
        }

        if self.default_diagram_types.is_empty() {
            anyhow::bail!("default_diagram_types cannot be empty");
        }

        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.retry_base_delay, self.retry_max_delay, self.retry_jitter)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            default_diagram_types: self.default_diagram_types.clone(),
            ..PipelineSettings::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            generator: GeneratorConfig::default(),
            worker_pool_size: 4,
            retry_base_delay: backoff.base,
            retry_max_delay: backoff.max,
            retry_jitter: backoff.jitter,
            job_timeout: Some(Duration::from_secs(600)),
            default_language: "go".to_string(),
            default_diagram_types: DiagramType::DEFAULTS.to_vec(),
        }
    }
}

fn parse_diagram_types(value: &str) -> anyhow::Result<Vec<DiagramType>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            name.parse::<DiagramType>()
                .with_context(|| "invalid DEFAULT_DIAGRAM_TYPES")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.worker_pool_size, 4);
        assert_eq!(config.default_diagram_types, DiagramType::DEFAULTS.to_vec());
        assert_eq!(config.backoff(), Backoff::default());

        // No API key by default
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_requires_api_key() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("GENERATOR_API_KEY", "  ")])).is_err());

        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-legacy")])).unwrap();
        assert_eq!(config.generator.api_key, "sk-legacy");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GENERATOR_API_KEY", "sk-test"),
            ("ORCHESTRATOR_BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/plansmith"),
            ("GENERATOR_MODEL", "gpt-4o"),
            ("GENERATOR_TIMEOUT", "30"),
            ("WORKER_POOL_SIZE", "8"),
            ("RETRY_BASE_DELAY_MS", "10"),
            ("RETRY_MAX_DELAY_MS", "100"),
            ("RETRY_JITTER_MS", "0"),
            ("JOB_TIMEOUT", "0"),
            ("DEFAULT_LANGUAGE", "rust"),
            ("DEFAULT_DIAGRAM_TYPES", "class, er"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/plansmith"));
        assert_eq!(config.generator.model, "gpt-4o");
        assert_eq!(config.generator.timeout, Duration::from_secs(30));
        assert_eq!(config.worker_pool_size, 8);
        assert_eq!(
            config.backoff(),
            Backoff::new(Duration::from_millis(10), Duration::from_millis(100), Duration::ZERO)
        );
        assert_eq!(config.job_timeout, None);
        assert_eq!(config.default_language, "rust");
        assert_eq!(
            config.pipeline_settings().default_diagram_types,
            vec![DiagramType::Class, DiagramType::EntityRelationship]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(
            Config::from_lookup(lookup(&[
                ("GENERATOR_API_KEY", "sk-test"),
                ("WORKER_POOL_SIZE", "many"),
            ]))
            .is_err()
        );
        assert!(
            Config::from_lookup(lookup(&[
                ("GENERATOR_API_KEY", "sk-test"),
                ("DEFAULT_DIAGRAM_TYPES", "flowchart,gantt"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.generator.api_key = "sk-test".to_string();

        // Valid config should pass
        assert!(config.validate().is_ok());

        config.worker_pool_size = 0;
        assert!(config.validate().is_err());
        config.worker_pool_size = 2;

        // Invalid URL should fail
        config.generator.base_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
        config.generator.base_url = "http://localhost:11434/v1".to_string();

        config.retry_max_delay = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
