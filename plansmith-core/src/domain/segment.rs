//! Explained code segments

use serde::{Deserialize, Serialize};

/// A line range of generated code with a natural-language description
///
/// Line numbers are 1-based and both ends are inclusive: a segment covering
/// only the first line is `start_line == end_line == 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainedSegment {
    pub start_line: u32,
    pub end_line: u32,
    pub explanation: String,
}

impl ExplainedSegment {
    /// Number of lines covered
    pub fn len(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end_line < self.start_line
    }

    /// Fits this segment into code with `total_lines` lines
    ///
    /// Returns `None` when the segment starts before line 1, is reversed, or
    /// starts past the end of the code. An end past the last line is clamped.
    pub fn normalized(mut self, total_lines: u32) -> Option<Self> {
        if self.start_line < 1 || self.end_line < self.start_line || self.start_line > total_lines
        {
            return None;
        }
        self.end_line = self.end_line.min(total_lines);
        Some(self)
    }
}
