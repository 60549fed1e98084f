//! Adjustment report and degradation warnings.
//!
//! A job always ends with a report, even when some corrections could not
//! be applied. Warnings name the affected segments so a partially
//! synchronized result can be told apart from a fully synchronized one.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{Adjustment, AdjustmentKind};

/// A correction that could not be applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncWarning {
    /// Silence could not be appended; the clip stays short.
    PaddingFailed {
        segment_index: usize,
        shortfall_secs: f64,
        reason: String,
    },
    /// The visual program could not be rewritten; pass 1 video is used.
    ScriptModificationFailed { segments: Vec<usize>, reason: String },
    /// The second render pass failed; pass 1 video is used.
    RerenderFailed { segments: Vec<usize>, reason: String },
}

impl SyncWarning {
    pub fn affected_segments(&self) -> Vec<usize> {
        match self {
            SyncWarning::PaddingFailed { segment_index, .. } => vec![*segment_index],
            SyncWarning::ScriptModificationFailed { segments, .. }
            | SyncWarning::RerenderFailed { segments, .. } => segments.clone(),
        }
    }
}

fn join_indices(segments: &[usize]) -> String {
    segments
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::PaddingFailed {
                segment_index,
                shortfall_secs,
                reason,
            } => write!(
                f,
                "Padding failed for segment {} (narration {:.3}s short): {}",
                segment_index, shortfall_secs, reason
            ),
            SyncWarning::ScriptModificationFailed { segments, reason } => write!(
                f,
                "Script modification failed, segments [{}] keep their pass 1 timing: {}",
                join_indices(segments),
                reason
            ),
            SyncWarning::RerenderFailed { segments, reason } => write!(
                f,
                "Second render failed, segments [{}] keep their pass 1 timing: {}",
                join_indices(segments),
                reason
            ),
        }
    }
}

/// Per-segment line of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentReport {
    pub index: usize,
    pub planned: f64,
    pub actual: f64,
    pub final_duration: f64,
    pub kind: AdjustmentKind,
    /// False when a warning prevented the correction.
    pub applied: bool,
}

/// Audit record of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub job_name: String,
    pub generated_at: String,
    pub tolerance_secs: f64,
    /// Whether a second-pass video was produced.
    pub rerendered: bool,
    pub segments: Vec<SegmentReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SyncWarning>,
}

impl AdjustmentReport {
    pub fn from_adjustments(
        job_name: impl Into<String>,
        tolerance_secs: f64,
        adjustments: &[Adjustment],
        warnings: Vec<SyncWarning>,
        rerendered: bool,
    ) -> Self {
        let affected: Vec<usize> = warnings.iter().flat_map(|w| w.affected_segments()).collect();

        let segments = adjustments
            .iter()
            .map(|adj| SegmentReport {
                index: adj.segment_index,
                planned: adj.planned,
                actual: adj.actual,
                final_duration: adj.final_duration(),
                kind: adj.kind,
                applied: !affected.contains(&adj.segment_index),
            })
            .collect();

        Self {
            job_name: job_name.into(),
            generated_at: chrono::Local::now().to_rfc3339(),
            tolerance_secs,
            rerendered,
            segments,
            warnings,
        }
    }

    /// True when at least one correction was not applied.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Segments named by any warning, sorted and unique.
    pub fn affected_segments(&self) -> Vec<usize> {
        let mut segments: Vec<usize> = self
            .warnings
            .iter()
            .flat_map(|w| w.affected_segments())
            .collect();
        segments.sort_unstable();
        segments.dedup();
        segments
    }

    /// Number of segments with a non-`None` adjustment.
    pub fn adjusted_count(&self) -> usize {
        self.segments.iter().filter(|s| !s.kind.is_none()).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::{reconcile, DurationPair};
    use tempfile::tempdir;

    fn scenario_a() -> Vec<Adjustment> {
        let pairs = [
            DurationPair::new(3.0, 5.0),
            DurationPair::new(5.0, 4.0),
            DurationPair::new(7.0, 6.0),
        ];
        reconcile(&pairs, 0.1).unwrap()
    }

    #[test]
    fn clean_report_is_not_degraded() {
        let report = AdjustmentReport::from_adjustments("lesson", 0.1, &scenario_a(), vec![], true);
        assert!(!report.is_degraded());
        assert_eq!(report.adjusted_count(), 3);
        assert!(report.segments.iter().all(|s| s.applied));
        let finals: Vec<f64> = report.segments.iter().map(|s| s.final_duration).collect();
        assert_eq!(finals, vec![5.0, 5.0, 7.0]);
    }

    #[test]
    fn warnings_mark_segments() {
        let warnings = vec![
            SyncWarning::PaddingFailed {
                segment_index: 2,
                shortfall_secs: 1.0,
                reason: "silence generation failed".to_string(),
            },
            SyncWarning::ScriptModificationFailed {
                segments: vec![0, 2],
                reason: "unbalanced".to_string(),
            },
        ];
        let report =
            AdjustmentReport::from_adjustments("lesson", 0.1, &scenario_a(), warnings, false);

        assert!(report.is_degraded());
        assert_eq!(report.affected_segments(), vec![0, 2]);
        assert!(!report.segments[0].applied);
        assert!(report.segments[1].applied);
        assert!(report.warnings[0].to_string().contains("segment 2"));
        assert!(report.warnings[1].to_string().contains("[0, 2]"));
    }

    #[test]
    fn writes_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lesson.report.json");
        let report = AdjustmentReport::from_adjustments(
            "lesson",
            0.1,
            &scenario_a(),
            vec![SyncWarning::RerenderFailed {
                segments: vec![0],
                reason: "timeout".to_string(),
            }],
            false,
        );
        report.write_json(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"type\": \"rerender_failed\""));
        let parsed: AdjustmentReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.segments.len(), 3);
    }
}
