//! Per-segment adjustment decisions.

use serde::{Deserialize, Serialize};

/// Corrective action for one segment.
///
/// Amounts are non-negative seconds. A segment never gets both kinds,
/// because the delta that produced the decision is strictly signed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Durations already agree within tolerance.
    None,
    /// Animation is longer; append this much silence to the narration clip.
    PadAudio(f64),
    /// Narration is longer; hold the animation segment for this much longer.
    ExtendVideo(f64),
}

impl AdjustmentKind {
    /// Seconds added by this adjustment (0 for `None`).
    pub fn amount(&self) -> f64 {
        match self {
            AdjustmentKind::None => 0.0,
            AdjustmentKind::PadAudio(amount) | AdjustmentKind::ExtendVideo(amount) => *amount,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AdjustmentKind::None)
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            AdjustmentKind::None => "none",
            AdjustmentKind::PadAudio(_) => "pad_audio",
            AdjustmentKind::ExtendVideo(_) => "extend_video",
        }
    }
}

impl std::fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjustmentKind::None => write!(f, "none"),
            AdjustmentKind::PadAudio(amount) => write!(f, "pad audio +{:.3}s", amount),
            AdjustmentKind::ExtendVideo(amount) => write!(f, "extend video +{:.3}s", amount),
        }
    }
}

/// Decision for one segment together with the durations it was made from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Position of the segment in the timeline.
    pub segment_index: usize,
    /// Planned (visual) duration in seconds.
    pub planned: f64,
    /// Measured narration duration in seconds.
    pub actual: f64,
    /// The corrective action.
    pub kind: AdjustmentKind,
}

impl Adjustment {
    /// Duration both streams share once the adjustment is applied.
    pub fn final_duration(&self) -> f64 {
        self.planned.max(self.actual)
    }

    /// Signed mismatch (`actual - planned`).
    pub fn delta(&self) -> f64 {
        self.actual - self.planned
    }
}
