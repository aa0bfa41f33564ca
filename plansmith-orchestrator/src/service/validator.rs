//! Diagram validation
//!
//! Structural checks applied to every generated diagram before it is accepted.
//! Rules run in a fixed order and the first violation is reported.

use std::sync::LazyLock;

use plansmith_core::domain::diagram::DiagramType;
use regex::Regex;
use thiserror::Error;

static EMPTY_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<\s*>>").expect("valid regex"));
static MULTILINE_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<<[^>\n]*\n[^>]*>>").expect("valid regex"));
static CHAINED_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">>\s*<<").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("diagram is empty")]
    Empty,

    #[error("diagram is too short: at least two lines are required")]
    TooShort,

    #[error("diagram must start with '{expected}', found '{found}'")]
    MissingPrefix { expected: &'static str, found: String },

    #[error("invalid annotation syntax: {0}")]
    Syntax(&'static str),

    #[error("{diagram_type} diagram has no connector (expected one of {expected:?})")]
    MissingConnector {
        diagram_type: DiagramType,
        expected: &'static [&'static str],
    },
}

/// Checks a diagram body against its declared type
pub fn validate_diagram(body: &str, diagram_type: DiagramType) -> Result<(), ValidationError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ValidationError::Empty);
    }

    let mut lines = body.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next().unwrap_or_default();
    let rest: Vec<&str> = lines.collect();
    if rest.is_empty() {
        return Err(ValidationError::TooShort);
    }

    if !first.starts_with(diagram_type.prefix()) {
        return Err(ValidationError::MissingPrefix {
            expected: diagram_type.prefix(),
            found: first.chars().take(40).collect(),
        });
    }

    if EMPTY_ANNOTATION.is_match(body) {
        return Err(ValidationError::Syntax("empty <<>> annotation"));
    }
    if MULTILINE_ANNOTATION.is_match(body) {
        return Err(ValidationError::Syntax("annotation spans multiple lines"));
    }
    if CHAINED_ANNOTATION.is_match(body) {
        return Err(ValidationError::Syntax("annotations must not be chained"));
    }

    let connectors = diagram_type.connectors();
    let has_connector = rest
        .iter()
        .any(|line| connectors.iter().any(|token| line.contains(token)));
    if !has_connector {
        return Err(ValidationError::MissingConnector {
            diagram_type,
            expected: connectors,
        });
    }

    Ok(())
}
