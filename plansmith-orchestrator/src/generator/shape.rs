//! Output shapes
//!
//! Each shape names the artifact a Generator call must return and carries the
//! strict JSON schema sent to the model. The `Generated*` structs are the
//! deserialized forms.

use plansmith_core::domain::diagram::DiagramType;
use plansmith_core::domain::plan::PlanItem;
use plansmith_core::domain::segment::ExplainedSegment;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Artifact kind requested from the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// A development plan decomposed from a prompt
    Plan,
    /// Code implementing one plan item
    Code,
    /// Several code fragments merged into one
    Combined,
    /// Explained line ranges of a piece of code
    Segments,
    /// One Mermaid diagram of the given type
    Diagram(DiagramType),
    /// The diagram types best suited to a piece of code
    DiagramSelection,
}

impl OutputShape {
    /// Schema name sent with the request
    pub fn name(self) -> &'static str {
        match self {
            OutputShape::Plan => "development_plan",
            OutputShape::Code => "implement_result",
            OutputShape::Combined => "combined_result",
            OutputShape::Segments => "code_segment_analysis",
            OutputShape::Diagram(_) => "diagram_result",
            OutputShape::DiagramSelection => "diagram_type_selection",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OutputShape::Plan => "A development plan with annotations of functions and classes",
            OutputShape::Code => "code implemented from the development plan",
            OutputShape::Combined => "the result of analyzing and combining the codes",
            OutputShape::Segments => "analysis of important code segments with explanations",
            OutputShape::Diagram(_) => "mermaid diagram code",
            OutputShape::DiagramSelection => "diagram types selected for the code",
        }
    }

    /// Strict JSON schema of the artifact
    pub fn schema(self) -> Value {
        match self {
            OutputShape::Plan => json!({
                "type": "object",
                "properties": {
                    "language": { "type": "string", "description": "The programming language for development" },
                    "plans": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "class_name": { "type": "string", "description": "class name, empty for a free function" },
                                "annotations": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "properties": {
                                            "name": { "type": "string" },
                                            "params": { "type": "string" },
                                            "returns": { "type": "string" },
                                            "description": { "type": "string" }
                                        },
                                        "required": ["name", "params", "returns", "description"],
                                        "additionalProperties": false
                                    }
                                }
                            },
                            "required": ["class_name", "annotations"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["language", "plans"],
                "additionalProperties": false
            }),
            OutputShape::Code | OutputShape::Combined => json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string" }
                },
                "required": ["code"],
                "additionalProperties": false
            }),
            OutputShape::Segments => json!({
                "type": "object",
                "properties": {
                    "code_segments": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "start_line": { "type": "integer", "minimum": 1, "description": "first line, 1-based" },
                                "end_line": { "type": "integer", "minimum": 1, "description": "last line, inclusive" },
                                "explanation": { "type": "string" }
                            },
                            "required": ["start_line", "end_line", "explanation"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["code_segments"],
                "additionalProperties": false
            }),
            OutputShape::Diagram(_) => json!({
                "type": "object",
                "properties": {
                    "diagram": { "type": "string" }
                },
                "required": ["diagram"],
                "additionalProperties": false
            }),
            OutputShape::DiagramSelection => json!({
                "type": "object",
                "properties": {
                    "selected_types": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": DiagramType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>()
                        }
                    }
                },
                "required": ["selected_types"],
                "additionalProperties": false
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedPlan {
    pub language: String,
    pub plans: Vec<PlanItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedCode {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedSegments {
    pub code_segments: Vec<RawSegment>,
}

/// A segment as the model reported it; line numbers are not yet checked
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSegment {
    pub start_line: i64,
    pub end_line: i64,
    pub explanation: String,
}

impl RawSegment {
    /// Converts to an [`ExplainedSegment`] fitted to `total_lines`
    ///
    /// Segments starting before line 1, reversed, or starting past the end
    /// of the code are dropped.
    pub fn into_segment(self, total_lines: u32) -> Option<ExplainedSegment> {
        if self.start_line < 1 || self.end_line < self.start_line {
            return None;
        }
        let start_line = u32::try_from(self.start_line).ok()?;
        let end_line = u32::try_from(self.end_line).unwrap_or(u32::MAX);
        ExplainedSegment {
            start_line,
            end_line,
            explanation: self.explanation,
        }
        .normalized(total_lines)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedDiagram {
    pub diagram: String,
}

/// Names are kept as strings; unknown ones are dropped by the caller
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiagramSelection {
    pub selected_types: Vec<String>,
}
