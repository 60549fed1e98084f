//! Duration reconciliation.
//!
//! This module is the **single place** where a duration mismatch turns
//! into a corrective action. It is pure: no I/O, no logging side effects
//! beyond `tracing` events, and the input is never mutated.
//!
//! # Decision Rule
//!
//! ```text
//! delta = actual - planned
//!
//! delta >  ε   -> ExtendVideo(delta)     narration runs long
//! delta < -ε   -> PadAudio(-delta)       animation runs long
//! otherwise    -> None
//! ```
//!
//! Applying the returned adjustment makes both streams last
//! `max(planned, actual)` for that segment. Padding snaps the narration
//! to exactly the planned duration rather than to within ε.
//!
//! Setting ε very large effectively disables reconciliation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Adjustment, AdjustmentKind};

/// Default tolerance in seconds.
pub const DEFAULT_TOLERANCE_SECS: f64 = 0.1;

/// Errors for malformed reconciler input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// A duration was zero, negative or not a finite number.
    #[error("Segment {index} has invalid {which} duration: {value}")]
    InvalidDuration {
        index: usize,
        which: &'static str,
        value: f64,
    },

    /// Tolerance was negative or not a finite number.
    #[error("Tolerance must be a finite, non-negative number of seconds (got {0})")]
    InvalidThreshold(f64),
}

/// Planned visual duration and measured narration duration of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationPair {
    pub planned: f64,
    pub actual: f64,
}

impl DurationPair {
    pub fn new(planned: f64, actual: f64) -> Self {
        Self { planned, actual }
    }
}

/// Classify a signed mismatch against the tolerance.
pub fn classify(delta: f64, tolerance: f64) -> AdjustmentKind {
    if delta > tolerance {
        AdjustmentKind::ExtendVideo(delta)
    } else if delta < -tolerance {
        AdjustmentKind::PadAudio(-delta)
    } else {
        AdjustmentKind::None
    }
}

/// Compute one adjustment per segment.
///
/// Every pair is validated before any decision is made, so an invalid
/// segment anywhere rejects the whole input.
pub fn reconcile(pairs: &[DurationPair], tolerance: f64) -> Result<Vec<Adjustment>, ReconcileError> {
    validate_tolerance(tolerance)?;
    for (index, pair) in pairs.iter().enumerate() {
        validate_duration(index, "planned", pair.planned)?;
        validate_duration(index, "actual", pair.actual)?;
    }

    let adjustments: Vec<Adjustment> = pairs
        .iter()
        .enumerate()
        .map(|(segment_index, pair)| {
            let kind = classify(pair.actual - pair.planned, tolerance);
            tracing::debug!(
                "Segment {}: planned={:.3}s actual={:.3}s -> {}",
                segment_index,
                pair.planned,
                pair.actual,
                kind
            );
            Adjustment {
                segment_index,
                planned: pair.planned,
                actual: pair.actual,
                kind,
            }
        })
        .collect();

    Ok(adjustments)
}

fn validate_tolerance(tolerance: f64) -> Result<(), ReconcileError> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(ReconcileError::InvalidThreshold(tolerance));
    }
    Ok(())
}

fn validate_duration(index: usize, which: &'static str, value: f64) -> Result<(), ReconcileError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ReconcileError::InvalidDuration {
            index,
            which,
            value,
        });
    }
    Ok(())
}

/// Hold requested for one segment of the visual program.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub segment_index: usize,
    pub amount: f64,
}

/// Silence requested for one narration clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PadRequest {
    pub segment_index: usize,
    /// Current clip duration.
    pub current: f64,
    /// Duration the padded clip must reach.
    pub target: f64,
}

/// Whether the job needs a second render pass.
///
/// Computed once from the complete adjustment set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReconcileDecision {
    /// At least one segment needs its animation extended.
    Rerender { extensions: Vec<Extension> },
    /// Every adjustment is `None` or `PadAudio`.
    Skip,
}

impl ReconcileDecision {
    pub fn from_adjustments(adjustments: &[Adjustment]) -> Self {
        let extensions: Vec<Extension> = adjustments
            .iter()
            .filter_map(|adj| match adj.kind {
                AdjustmentKind::ExtendVideo(amount) => Some(Extension {
                    segment_index: adj.segment_index,
                    amount,
                }),
                _ => None,
            })
            .collect();

        if extensions.is_empty() {
            ReconcileDecision::Skip
        } else {
            ReconcileDecision::Rerender { extensions }
        }
    }

    pub fn is_rerender(&self) -> bool {
        matches!(self, ReconcileDecision::Rerender { .. })
    }

    /// Segments that need a longer animation.
    pub fn extended_segments(&self) -> Vec<usize> {
        match self {
            ReconcileDecision::Rerender { extensions } => {
                extensions.iter().map(|e| e.segment_index).collect()
            }
            ReconcileDecision::Skip => Vec::new(),
        }
    }
}

/// Padding work implied by a set of adjustments.
pub fn pad_requests(adjustments: &[Adjustment]) -> Vec<PadRequest> {
    adjustments
        .iter()
        .filter(|adj| matches!(adj.kind, AdjustmentKind::PadAudio(_)))
        .map(|adj| PadRequest {
            segment_index: adj.segment_index,
            current: adj.actual,
            target: adj.planned,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(planned: &[f64], actual: &[f64]) -> Vec<DurationPair> {
        planned
            .iter()
            .zip(actual)
            .map(|(&p, &a)| DurationPair::new(p, a))
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn within_tolerance_is_none() {
        let adjustments = reconcile(&pairs(&[3.0, 5.0, 7.0], &[3.05, 4.95, 7.1]), 0.1).unwrap();
        assert!(adjustments.iter().all(|a| a.kind.is_none()));
    }

    #[test]
    fn delta_exactly_at_tolerance_is_none() {
        assert_eq!(classify(0.5, 0.5), AdjustmentKind::None);
        assert_eq!(classify(-0.5, 0.5), AdjustmentKind::None);
    }

    #[test]
    fn scenario_a_classification() {
        let adjustments = reconcile(&pairs(&[3.0, 5.0, 7.0], &[5.0, 4.0, 6.0]), 0.1).unwrap();
        let kinds: Vec<AdjustmentKind> = adjustments.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AdjustmentKind::ExtendVideo(2.0),
                AdjustmentKind::PadAudio(1.0),
                AdjustmentKind::PadAudio(1.0),
            ]
        );
        let finals: Vec<f64> = adjustments.iter().map(|a| a.final_duration()).collect();
        assert_eq!(finals, vec![5.0, 5.0, 7.0]);
    }

    #[test]
    fn scenario_b_classification() {
        let adjustments =
            reconcile(&pairs(&[3.0, 5.0, 7.0], &[5.23, 4.24, 6.21]), 0.1).unwrap();

        match adjustments[0].kind {
            AdjustmentKind::ExtendVideo(amount) => assert!(approx(amount, 2.23)),
            other => panic!("expected extend, got {:?}", other),
        }
        match adjustments[1].kind {
            AdjustmentKind::PadAudio(amount) => assert!(approx(amount, 0.76)),
            other => panic!("expected pad, got {:?}", other),
        }
        match adjustments[2].kind {
            AdjustmentKind::PadAudio(amount) => assert!(approx(amount, 0.79)),
            other => panic!("expected pad, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_positive_durations() {
        let err = reconcile(&pairs(&[3.0, 0.0], &[3.0, 1.0]), 0.1).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InvalidDuration {
                index: 1,
                which: "planned",
                value: 0.0
            }
        );

        let err = reconcile(&pairs(&[3.0], &[-1.0]), 0.1).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::InvalidDuration {
                index: 0,
                which: "actual",
                ..
            }
        ));
    }

    #[test]
    fn rejects_nan_duration() {
        let err = reconcile(&pairs(&[f64::NAN], &[1.0]), 0.1).unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidDuration { index: 0, .. }));
    }

    #[test]
    fn rejects_negative_threshold() {
        let err = reconcile(&pairs(&[3.0], &[3.0]), -0.1).unwrap_err();
        assert_eq!(err, ReconcileError::InvalidThreshold(-0.1));
        assert!(reconcile(&pairs(&[3.0], &[3.0]), f64::INFINITY).is_err());
    }

    #[test]
    fn zero_tolerance_is_allowed() {
        let adjustments = reconcile(&pairs(&[3.0], &[3.0]), 0.0).unwrap();
        assert!(adjustments[0].kind.is_none());
    }

    #[test]
    fn large_tolerance_disables_reconciliation() {
        let adjustments = reconcile(&pairs(&[3.0, 5.0], &[9.0, 1.0]), 1e9).unwrap();
        assert!(adjustments.iter().all(|a| a.kind.is_none()));
        assert_eq!(
            ReconcileDecision::from_adjustments(&adjustments),
            ReconcileDecision::Skip
        );
    }

    #[test]
    fn reconcile_is_repeatable() {
        let input = pairs(&[3.0, 5.0, 7.0], &[5.23, 4.24, 6.21]);
        let snapshot = input.clone();
        let first = reconcile(&input, 0.1).unwrap();
        let second = reconcile(&input, 0.1).unwrap();
        assert_eq!(first, second);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn decision_collects_extensions() {
        let adjustments = reconcile(&pairs(&[3.0, 5.0, 7.0], &[5.0, 4.0, 9.5]), 0.1).unwrap();
        let decision = ReconcileDecision::from_adjustments(&adjustments);
        assert!(decision.is_rerender());
        assert_eq!(decision.extended_segments(), vec![0, 2]);
    }

    #[test]
    fn pad_requests_target_planned_duration() {
        let adjustments = reconcile(&pairs(&[3.0, 5.0, 7.0], &[5.0, 4.0, 6.0]), 0.1).unwrap();
        let requests = pad_requests(&adjustments);
        assert_eq!(
            requests,
            vec![
                PadRequest {
                    segment_index: 1,
                    current: 4.0,
                    target: 5.0
                },
                PadRequest {
                    segment_index: 2,
                    current: 6.0,
                    target: 7.0
                },
            ]
        );
    }
}
