//! Test doubles shared by the orchestrator's unit tests

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use plansmith_core::domain::diagram::DiagramType;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::generator::{GenerationError, GenerationRequest, Generator, OutputShape};

type Handler = dyn Fn(&GenerationRequest) -> Result<Value, GenerationError> + Send + Sync;

/// Generator answering from a closure and recording every request
pub struct ScriptedGenerator {
    handler: Box<Handler>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<Value, GenerationError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Every call waits this long before answering, honouring cancellation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, shape: OutputShape) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.shape == shape)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Value, GenerationError> {
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        (self.handler)(&request)
    }
}

/// Combined program returned by [`canned_response`]; four lines long
pub const COMBINED_CODE: &str = "struct Stack;\nfn push() {}\nfn pop() {}\nfn main() {}";

/// A minimal diagram of each type that passes validation
pub fn valid_diagram(diagram_type: DiagramType) -> &'static str {
    match diagram_type {
        DiagramType::Flowchart => "flowchart TD\n  main --> push",
        DiagramType::Sequence => "sequenceDiagram\n  main->>Stack: push",
        DiagramType::Class => "classDiagram\n  class Stack",
        DiagramType::EntityRelationship => "erDiagram\n  STACK ||--o{ ITEM : holds",
        DiagramType::Component => "C4Component\n  Rel(main, stack, \"uses\")",
        DiagramType::State => "stateDiagram-v2\n  [*] --> Empty",
    }
}

/// Name of the first function an implementation task asks for
pub fn requested_function(task: &str) -> Option<&str> {
    task.lines()
        .find_map(|line| line.strip_prefix("functionName: "))
        .map(str::trim)
}

/// Well-formed answer for every output shape
pub fn canned_response(request: &GenerationRequest) -> Result<Value, GenerationError> {
    let value = match request.shape {
        OutputShape::Plan => json!({
            "language": "rust",
            "plans": [
                {
                    "class_name": "Stack",
                    "annotations": [
                        { "name": "push", "params": "value: i32", "returns": "()", "description": "pushes a value" },
                        { "name": "pop", "params": "", "returns": "Option<i32>", "description": "pops a value" }
                    ]
                },
                {
                    "class_name": "",
                    "annotations": [
                        { "name": "main", "params": "", "returns": "()", "description": "entry point" }
                    ]
                }
            ]
        }),
        OutputShape::Code => {
            let name = requested_function(&request.task).unwrap_or("anonymous");
            json!({ "code": format!("fn {name}() {{}}") })
        }
        OutputShape::Combined => json!({ "code": COMBINED_CODE }),
        OutputShape::Segments => json!({
            "code_segments": [
                { "start_line": 1, "end_line": 1, "explanation": "declares the stack" },
                { "start_line": 2, "end_line": 9, "explanation": "stack operations" },
                { "start_line": 0, "end_line": 1, "explanation": "zero-based, dropped" },
                { "start_line": 3, "end_line": 2, "explanation": "reversed, dropped" }
            ]
        }),
        OutputShape::Diagram(diagram_type) => json!({ "diagram": valid_diagram(diagram_type) }),
        OutputShape::DiagramSelection => json!({ "selected_types": ["flowchart", "class"] }),
    };
    Ok(value)
}
