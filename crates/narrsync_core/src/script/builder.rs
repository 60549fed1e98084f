//! Collects holds and commits them only after validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::dialect::{is_expressible_hold, ScriptDialect};
use super::layout::ProgramLayout;
use super::validate::{CandidateProgram, ProgramValidator};
use super::{ScriptError, ScriptResult};

/// A hold inserted into the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldInstruction {
    pub segment_index: usize,
    pub seconds: f64,
    /// 0-based line of the hold in the adjusted program.
    pub line: usize,
}

/// A rewritten program that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedProgram {
    pub source: String,
    pub holds: Vec<HoldInstruction>,
}

impl AdjustedProgram {
    /// Segments that received a hold, in order.
    pub fn segments(&self) -> Vec<usize> {
        self.holds.iter().map(|h| h.segment_index).collect()
    }
}

/// Accumulates `(segment, seconds)` holds against a parsed program.
#[derive(Debug)]
pub struct TimingAdjustmentBuilder<'a> {
    layout: &'a ProgramLayout,
    dialect: &'a ScriptDialect,
    holds: BTreeMap<usize, f64>,
}

impl<'a> TimingAdjustmentBuilder<'a> {
    pub fn new(layout: &'a ProgramLayout, dialect: &'a ScriptDialect) -> Self {
        Self {
            layout,
            dialect,
            holds: BTreeMap::new(),
        }
    }

    /// Hold segment `index` for `seconds` longer.
    pub fn extend(&mut self, index: usize, seconds: f64) -> ScriptResult<&mut Self> {
        if index >= self.layout.segment_count() {
            return Err(ScriptError::UnknownSegment {
                index,
                segments: self.layout.segment_count(),
            });
        }
        if !is_expressible_hold(seconds) {
            return Err(ScriptError::InvalidAmount {
                index,
                amount: seconds,
            });
        }
        if self.holds.contains_key(&index) {
            return Err(ScriptError::DuplicateSegment(index));
        }
        self.holds.insert(index, seconds);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.holds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    /// Build the adjusted program and run `validator` on it.
    pub fn commit(self, validator: &dyn ProgramValidator) -> ScriptResult<AdjustedProgram> {
        if self.holds.is_empty() {
            return Err(ScriptError::NoAdjustments);
        }

        // Insertion point -> hold line, keyed by original line number
        let mut inserts: BTreeMap<usize, (usize, f64, String)> = BTreeMap::new();
        for (&index, &seconds) in &self.holds {
            if let Some(block) = self.layout.block(index) {
                let text = self.dialect.hold_line(&block.indent, seconds);
                inserts.insert(block.insertion_line(), (index, seconds, text));
            }
        }

        let original = self.layout.lines();
        let mut lines = Vec::with_capacity(original.len() + inserts.len());
        let mut holds = Vec::with_capacity(inserts.len());

        for (i, line) in original.iter().enumerate() {
            lines.push(line.clone());
            if let Some((segment_index, seconds, text)) = inserts.remove(&i) {
                holds.push(HoldInstruction {
                    segment_index,
                    seconds,
                    line: lines.len(),
                });
                lines.push(text);
            }
        }

        let source = self.layout.join(&lines);
        let inserted_lines: Vec<usize> = holds.iter().map(|h| h.line).collect();
        let candidate = CandidateProgram {
            source: &source,
            inserted_lines: &inserted_lines,
            expected_markers: self.layout.marker_lines(),
            dialect: self.dialect,
        };

        validator
            .validate(&candidate)
            .map_err(|message| ScriptError::ValidationFailed {
                validator: validator.name().to_string(),
                message,
            })?;

        holds.sort_by_key(|h| h.segment_index);
        Ok(AdjustedProgram { source, holds })
    }
}
