//! Task descriptions handed to the generator

use std::fmt::Write;

use plansmith_core::domain::diagram::DiagramType;
use plansmith_core::domain::plan::PlanItem;

use crate::service::retry::MAX_ATTEMPTS;

pub fn plan_task(prompt: &str, default_language: &str) -> String {
    format!(
        "Decompose the following development request into a development plan.\n\
         List every class with its methods, and every free function with an empty class name.\n\
         For each function give its name, parameters, return type and a short description.\n\
         Use {default_language} unless the request names another language.\n\n\
         Request:\n{prompt}"
    )
}

pub fn implement_task(language: &str, item: &PlanItem) -> String {
    let mut task = format!(
        "Implement the following in {language}. Return only the code, without explanations.\n\n"
    );
    task.push_str(&item.describe());
    task
}

/// Fragments are numbered in the order given; blank ones must already be removed
pub fn combine_task(purpose: &str, fragments: &[String]) -> String {
    let mut task = format!(
        "Combine the following pieces of code into one complete program.\n\
         Remove duplicated definitions, resolve conflicts and keep every function.\n\
         The program is meant to: {purpose}\n"
    );
    for (index, fragment) in fragments.iter().enumerate() {
        let _ = write!(task, "\nCode {}:\n{}\n", index + 1, fragment);
    }
    task
}

pub fn segments_task(code: &str) -> String {
    format!(
        "Analyze the code below and pick its most important segments.\n\
         For each segment give start_line and end_line and explain what the segment does.\n\
         Line numbers are 1-based and inclusive: the first line of the code is line 1.\n\n\
         {code}"
    )
}

pub fn diagram_task(code: &str, purpose: &str, diagram_type: DiagramType, attempt: u32) -> String {
    let mut task = format!(
        "Draw a Mermaid {} diagram of the code below, showing {}.\n\
         The diagram must start with `{}` and must not be wrapped in a code fence.\n\
         The program is meant to: {}\n\n{}",
        diagram_type,
        diagram_type.description(),
        diagram_type.prefix(),
        purpose,
        code
    );
    if attempt > 1 {
        let _ = write!(
            task,
            "\n\nThis is attempt {attempt} of {MAX_ATTEMPTS}. The previous diagram was rejected; \
             check the syntax carefully and use only valid {} constructs.",
            diagram_type.prefix()
        );
    }
    task
}

pub fn diagram_selection_task(code: &str) -> String {
    let mut task = String::from(
        "Choose the diagram types that best explain the code below. Available types:\n",
    );
    for diagram_type in DiagramType::ALL {
        let _ = writeln!(task, "- {}: {}", diagram_type, diagram_type.description());
    }
    let _ = write!(task, "\n{code}");
    task
}
