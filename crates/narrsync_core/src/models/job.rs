//! Job specification.

use serde::{Deserialize, Serialize};

/// Inputs of one generation job.
///
/// The visual program and narration text come from an upstream content
/// generator; the engine treats both as opaque apart from the segment
/// boundary markers in the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job name (used for output and log file names).
    pub name: String,
    /// Source of the visual program, as produced by the generator.
    pub program: String,
    /// Narration text per segment, in timeline order.
    pub narration: Vec<String>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>, narration: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            narration,
        }
    }

    /// Number of narration segments.
    pub fn segment_count(&self) -> usize {
        self.narration.len()
    }
}
