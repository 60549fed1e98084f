//! Visual program rewriting.
//!
//! Narration that runs longer than its animation segment is absorbed by
//! holding the animation: a wait instruction is appended to the segment's
//! block in the visual program, which is then rendered again.
//!
//! The program is never edited as free text. It is first parsed into a
//! [`ProgramLayout`] (the segment blocks and their line ranges), holds are
//! collected on a [`TimingAdjustmentBuilder`], and the rewritten program is
//! only handed out by [`TimingAdjustmentBuilder::commit`] once it passed a
//! [`ProgramValidator`].
//!
//! ```text
//!         # SEGMENT 1                 <- marker (block start)
//!         self.play(Write(title))
//!         self.play(FadeIn(box))      <- last code line
//!         self.wait(2.23)  # narrsync: hold
//!         # SEGMENT 2
//! ```

mod builder;
mod dialect;
mod layout;
mod validate;

pub use builder::{AdjustedProgram, HoldInstruction, TimingAdjustmentBuilder};
pub use dialect::{format_seconds, is_expressible_hold, ScriptDialect};
pub use layout::{ProgramLayout, SegmentBlock};
pub use validate::{
    CandidateProgram, CommandValidator, ProgramValidator, StructuralValidator, ValidatorChain,
};

use thiserror::Error;

/// Errors from rewriting the visual program.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("Program has no segment markers (expected lines starting with '{prefix}')")]
    NoMarkers { prefix: String },

    #[error("Program already contains hold instructions (line {line})")]
    AlreadyAdjusted { line: usize },

    #[error("Segment {index} does not exist (program has {segments} segments)")]
    UnknownSegment { index: usize, segments: usize },

    #[error("Segment {index}: hold amount must be at least one millisecond (got {amount})")]
    InvalidAmount { index: usize, amount: f64 },

    #[error("Segment {0} already has a hold")]
    DuplicateSegment(usize),

    #[error("No holds to apply")]
    NoAdjustments,

    #[error("{validator} rejected the adjusted program: {message}")]
    ValidationFailed { validator: String, message: String },
}

/// Result type for program rewriting.
pub type ScriptResult<T> = Result<T, ScriptError>;
