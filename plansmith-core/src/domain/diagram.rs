//! Diagram domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of diagram rendering, each bound to one required syntax prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    Flowchart,
    Sequence,
    Class,
    #[serde(rename = "er")]
    EntityRelationship,
    Component,
    State,
}

impl DiagramType {
    pub const ALL: [DiagramType; 6] = [
        DiagramType::Flowchart,
        DiagramType::Sequence,
        DiagramType::Class,
        DiagramType::EntityRelationship,
        DiagramType::Component,
        DiagramType::State,
    ];

    /// Default set requested when a job names no diagram types
    pub const DEFAULTS: [DiagramType; 3] = [
        DiagramType::Flowchart,
        DiagramType::Sequence,
        DiagramType::Class,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiagramType::Flowchart => "flowchart",
            DiagramType::Sequence => "sequence",
            DiagramType::Class => "class",
            DiagramType::EntityRelationship => "er",
            DiagramType::Component => "component",
            DiagramType::State => "state",
        }
    }

    /// Mermaid keyword the first line of the diagram must start with
    pub fn prefix(self) -> &'static str {
        match self {
            DiagramType::Flowchart => "flowchart",
            DiagramType::Sequence => "sequenceDiagram",
            DiagramType::Class => "classDiagram",
            DiagramType::EntityRelationship => "erDiagram",
            DiagramType::Component => "C4Component",
            DiagramType::State => "stateDiagram",
        }
    }

    /// Structural tokens of which at least one must appear in the body
    pub fn connectors(self) -> &'static [&'static str] {
        match self {
            DiagramType::Flowchart => &["-->", "---", "-.->", "-.-", "==>"],
            DiagramType::Sequence => &["->>", "-->>", "->", "-->", "-x", "--x", "-)"],
            DiagramType::Class => &["class ", ":"],
            DiagramType::EntityRelationship => &["||", "|o", "o|", "}|", "|{", "}o", "o{"],
            DiagramType::Component => &["Rel(", "BiRel(", "Rel_"],
            DiagramType::State => &["-->"],
        }
    }

    /// What the diagram shows, used when asking which types suit some code
    pub fn description(self) -> &'static str {
        match self {
            DiagramType::Flowchart => "control flow and function calls",
            DiagramType::Sequence => "interactions between components over time",
            DiagramType::Class => "classes/structs and their relationships",
            DiagramType::EntityRelationship => "data entities and their cardinalities",
            DiagramType::Component => "high-level components and their dependencies",
            DiagramType::State => "state machines and state transitions",
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown diagram type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDiagramType(pub String);

impl fmt::Display for UnknownDiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown diagram type '{}'", self.0)
    }
}

impl std::error::Error for UnknownDiagramType {}

impl FromStr for DiagramType {
    type Err = UnknownDiagramType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flowchart" => Ok(DiagramType::Flowchart),
            "sequence" | "sequencediagram" => Ok(DiagramType::Sequence),
            "class" | "classdiagram" => Ok(DiagramType::Class),
            "er" | "erdiagram" | "entity-relationship" => Ok(DiagramType::EntityRelationship),
            "component" => Ok(DiagramType::Component),
            "state" | "statediagram" => Ok(DiagramType::State),
            _ => Err(UnknownDiagramType(s.to_string())),
        }
    }
}

/// A generated diagram accepted by validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramArtifact {
    pub diagram_type: DiagramType,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diagram_types() {
        assert_eq!("flowchart".parse(), Ok(DiagramType::Flowchart));
        assert_eq!("sequenceDiagram".parse(), Ok(DiagramType::Sequence));
        assert_eq!(" ER ".parse(), Ok(DiagramType::EntityRelationship));
        assert_eq!("stateDiagram".parse(), Ok(DiagramType::State));
        assert!("gantt".parse::<DiagramType>().is_err());
    }

    #[test]
    fn test_as_str_round_trips_through_from_str() {
        for diagram_type in DiagramType::ALL {
            assert_eq!(diagram_type.as_str().parse(), Ok(diagram_type));
        }
    }

    #[test]
    fn test_serde_uses_short_names() {
        let json = serde_json::to_string(&DiagramType::EntityRelationship).unwrap();
        assert_eq!(json, r#""er""#);

        let parsed: Vec<DiagramType> =
            serde_json::from_str(r#"["flowchart","sequence","class"]"#).unwrap();
        assert_eq!(parsed, DiagramType::DEFAULTS.to_vec());
    }

    #[test]
    fn test_every_type_has_prefix_and_connectors() {
        for diagram_type in DiagramType::ALL {
            assert!(!diagram_type.prefix().is_empty());
            assert!(!diagram_type.connectors().is_empty());
        }
    }
}
