//! Sequential narration assembly.
//!
//! Clips are placed strictly one after another: each segment starts where
//! the previous one ended, so the track never contains overlaps or gaps.
//! Clips are joined with the toolkit's concatenation and never mixed.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{MediaError, MediaToolkit};
use crate::models::MediaHandle;

/// Position of one clip in the assembled track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub start: f64,
    pub end: f64,
}

impl Placement {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Compute back-to-back placements for the given durations.
///
/// `start[0] == 0`, `start[i + 1] == end[i]`, `end[i] - start[i] == d[i]`.
pub fn place_sequentially(durations: &[f64]) -> Vec<Placement> {
    durations
        .iter()
        .scan(0.0_f64, |cursor, &duration| {
            let start = *cursor;
            *cursor += duration;
            Some(Placement {
                start,
                end: *cursor,
            })
        })
        .collect()
}

/// Errors from assembling the narration track.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("No narration clips to assemble")]
    Empty,

    #[error("Got {clips} clips but {durations} durations")]
    CountMismatch { clips: usize, durations: usize },

    #[error("Concatenation failed: {0}")]
    Concat(#[from] MediaError),
}

/// The assembled narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledTrack {
    pub media: MediaHandle,
    pub placements: Vec<Placement>,
    pub total_duration: f64,
}

/// Concatenates per-segment clips into one track.
pub struct SequentialAssembler<'a> {
    toolkit: &'a dyn MediaToolkit,
}

impl<'a> SequentialAssembler<'a> {
    pub fn new(toolkit: &'a dyn MediaToolkit) -> Self {
        Self { toolkit }
    }

    /// Concatenate `clips` in order into `output`.
    ///
    /// `durations` are the clip lengths the placements are computed from;
    /// the toolkit output is not re-measured.
    pub fn assemble(
        &self,
        clips: &[MediaHandle],
        durations: &[f64],
        output: &Path,
    ) -> Result<AssembledTrack, AssembleError> {
        if clips.is_empty() {
            return Err(AssembleError::Empty);
        }
        if clips.len() != durations.len() {
            return Err(AssembleError::CountMismatch {
                clips: clips.len(),
                durations: durations.len(),
            });
        }

        let placements = place_sequentially(durations);
        let total_duration = placements.last().map(|p| p.end).unwrap_or(0.0);

        tracing::debug!(
            "Assembling {} clips ({:.3}s) into {}",
            clips.len(),
            total_duration,
            output.display()
        );

        let media = self.toolkit.concatenate(clips, output)?;

        Ok(AssembledTrack {
            media,
            placements,
            total_duration,
        })
    }
}
