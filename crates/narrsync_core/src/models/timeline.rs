//! Segment timeline snapshots.
//!
//! A `Timeline` is created once the planned durations (render pass 1) and
//! the measured narration durations (synthesis) are both known. Stages
//! never mutate a timeline in place: padding and assembly each produce a
//! new snapshot, and cumulative times are always recomputed with a single
//! fold over the segment durations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::media::MediaHandle;
use crate::audio::{place_sequentially, PaddedClip, Placement};
use crate::reconcile::DurationPair;

/// Errors building a timeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    #[error("Timeline has no segments")]
    Empty,

    #[error("Render produced {planned} segments but narration has {narration}")]
    SegmentCountMismatch { planned: usize, narration: usize },

    #[error("Planned segment ends must increase: segment {index} ends at {end:.3}s after {previous:.3}s")]
    NonIncreasingPlan {
        index: usize,
        previous: f64,
        end: f64,
    },
}

/// Narration clip measured for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationClip {
    /// Narration text (audit only).
    pub text: String,
    /// Synthesized clip.
    pub media: MediaHandle,
    /// Measured duration in seconds.
    pub duration: f64,
}

/// One narration/animation unit of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the ordered timeline.
    pub index: usize,
    /// Start of the segment in the visual plan (seconds).
    pub planned_start: f64,
    /// End of the segment in the visual plan (seconds).
    pub planned_end: f64,
    /// Duration of the current narration clip (seconds).
    pub audio_duration: f64,
    /// Start in the sequential narration track (seconds).
    pub actual_start: f64,
    /// End in the sequential narration track (seconds).
    pub actual_end: f64,
    /// Narration text.
    pub text: String,
    /// Current narration clip (padded clip once padding succeeded).
    pub clip: MediaHandle,
}

impl Segment {
    /// Planned visual duration.
    pub fn planned_duration(&self) -> f64 {
        self.planned_end - self.planned_start
    }

    /// Length of this segment in the narration track.
    pub fn actual_duration(&self) -> f64 {
        self.actual_end - self.actual_start
    }
}

/// Ordered, immutable snapshot of all segments of one job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Timeline {
    segments: Vec<Segment>,
}

impl Timeline {
    /// Build a timeline from per-segment planned durations and narration clips.
    pub fn from_parts(
        planned_durations: &[f64],
        narration: Vec<NarrationClip>,
    ) -> Result<Self, TimelineError> {
        if planned_durations.len() != narration.len() {
            return Err(TimelineError::SegmentCountMismatch {
                planned: planned_durations.len(),
                narration: narration.len(),
            });
        }
        if narration.is_empty() {
            return Err(TimelineError::Empty);
        }

        let planned = place_sequentially(planned_durations);
        let audio_durations: Vec<f64> = narration.iter().map(|c| c.duration).collect();
        let actual = place_sequentially(&audio_durations);

        let segments = narration
            .into_iter()
            .enumerate()
            .map(|(index, clip)| Segment {
                index,
                planned_start: planned[index].start,
                planned_end: planned[index].end,
                audio_duration: clip.duration,
                actual_start: actual[index].start,
                actual_end: actual[index].end,
                text: clip.text,
                clip: clip.media,
            })
            .collect();

        Ok(Self { segments })
    }

    /// Build a timeline from a cumulative plan (segment end times, first
    /// segment starting at 0).
    pub fn from_planned_ends(
        planned_ends: &[f64],
        narration: Vec<NarrationClip>,
    ) -> Result<Self, TimelineError> {
        let mut durations = Vec::with_capacity(planned_ends.len());
        let mut previous = 0.0;
        for (index, &end) in planned_ends.iter().enumerate() {
            if end <= previous {
                return Err(TimelineError::NonIncreasingPlan {
                    index,
                    previous,
                    end,
                });
            }
            durations.push(end - previous);
            previous = end;
        }
        Self::from_parts(&durations, narration)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// `(planned, actual)` pairs in segment order, for the reconciler.
    pub fn duration_pairs(&self) -> Vec<DurationPair> {
        self.segments
            .iter()
            .map(|s| DurationPair::new(s.planned_duration(), s.audio_duration))
            .collect()
    }

    /// Current narration clip durations in segment order.
    pub fn audio_durations(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.audio_duration).collect()
    }

    /// Current narration clips in segment order.
    pub fn clips(&self) -> Vec<MediaHandle> {
        self.segments.iter().map(|s| s.clip.clone()).collect()
    }

    /// Total length of the sequential narration track.
    pub fn total_actual_duration(&self) -> f64 {
        self.segments.last().map(|s| s.actual_end).unwrap_or(0.0)
    }

    /// Total planned visual length.
    pub fn total_planned_duration(&self) -> f64 {
        self.segments.last().map(|s| s.planned_end).unwrap_or(0.0)
    }

    /// New snapshot with padded clips swapped in and the sequential
    /// placement recomputed.
    pub fn with_padded_clips(&self, padded: &[PaddedClip]) -> Self {
        let mut segments = self.segments.clone();
        for clip in padded {
            if let Some(segment) = segments.get_mut(clip.segment_index) {
                segment.clip = clip.media.clone();
                segment.audio_duration = clip.duration;
            }
        }
        let durations: Vec<f64> = segments.iter().map(|s| s.audio_duration).collect();
        Self { segments }.with_placements(&place_sequentially(&durations))
    }

    /// New snapshot with the given sequential placements.
    ///
    /// Placements are matched to segments by position; extra entries are
    /// ignored.
    pub fn with_placements(&self, placements: &[Placement]) -> Self {
        let segments = self
            .segments
            .iter()
            .zip(placements)
            .map(|(segment, placement)| Segment {
                actual_start: placement.start,
                actual_end: placement.end,
                ..segment.clone()
            })
            .collect();
        Self { segments }
    }
}
