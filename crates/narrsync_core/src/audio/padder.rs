//! Silence padding for narration clips that run short.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{MediaError, MediaToolkit};
use crate::models::MediaHandle;

/// Errors from padding a clip.
#[derive(Error, Debug)]
pub enum PadError {
    /// Target is not longer than the clip.
    #[error("Segment {segment_index}: target {target:.3}s is not longer than clip ({current:.3}s)")]
    InvalidTarget {
        segment_index: usize,
        current: f64,
        target: f64,
    },

    /// The toolkit could not produce the padded clip.
    #[error("Segment {segment_index}: padding failed: {source}")]
    PaddingFailed {
        segment_index: usize,
        #[source]
        source: MediaError,
    },
}

impl PadError {
    pub fn segment_index(&self) -> usize {
        match self {
            PadError::InvalidTarget { segment_index, .. }
            | PadError::PaddingFailed { segment_index, .. } => *segment_index,
        }
    }
}

/// A narration clip extended with trailing silence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddedClip {
    pub segment_index: usize,
    /// New clip file; the original is left untouched.
    pub media: MediaHandle,
    /// Recorded duration (the pad target).
    pub duration: f64,
    /// Seconds of silence appended.
    pub silence_added: f64,
}

/// Appends silence to narration clips.
///
/// Output files are segment-scoped (`segment_NNN_padded.<ext>`), so pads
/// for different segments can run concurrently against the same
/// `work_dir`.
pub struct AudioPadder<'a> {
    toolkit: &'a dyn MediaToolkit,
    work_dir: PathBuf,
    extension: String,
    verify_tolerance: Option<f64>,
}

impl<'a> AudioPadder<'a> {
    pub fn new(toolkit: &'a dyn MediaToolkit, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolkit,
            work_dir: work_dir.into(),
            extension: "mp3".to_string(),
            verify_tolerance: None,
        }
    }

    /// File extension of generated clips.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Probe padded clips and warn when they drift more than `tolerance`
    /// from the target.
    pub fn with_verification(mut self, tolerance: f64) -> Self {
        self.verify_tolerance = Some(tolerance);
        self
    }

    fn silence_path(&self, segment_index: usize) -> PathBuf {
        self.work_dir
            .join(format!("segment_{:03}_silence.{}", segment_index, self.extension))
    }

    fn padded_path(&self, segment_index: usize) -> PathBuf {
        self.work_dir
            .join(format!("segment_{:03}_padded.{}", segment_index, self.extension))
    }

    /// Pad `clip` from `current` to `target` seconds.
    pub fn pad(
        &self,
        clip: &MediaHandle,
        current: f64,
        target: f64,
        segment_index: usize,
    ) -> Result<PaddedClip, PadError> {
        if !(target > current) || !target.is_finite() {
            return Err(PadError::InvalidTarget {
                segment_index,
                current,
                target,
            });
        }

        let silence = target - current;
        let silence_path = self.silence_path(segment_index);
        let padded_path = self.padded_path(segment_index);

        tracing::debug!(
            "Segment {}: padding {} with {:.3}s of silence",
            segment_index,
            clip,
            silence
        );

        let result = self
            .toolkit
            .generate_silence(silence, &silence_path)
            .and_then(|silence_clip| {
                self.toolkit
                    .concatenate(&[clip.clone(), silence_clip], &padded_path)
            });

        // The silence clip is only an intermediate
        let _ = fs::remove_file(&silence_path);

        let media = match result {
            Ok(media) => media,
            Err(source) => {
                let _ = fs::remove_file(&padded_path);
                return Err(PadError::PaddingFailed {
                    segment_index,
                    source,
                });
            }
        };

        if let Some(tolerance) = self.verify_tolerance {
            self.verify(&media, target, tolerance, segment_index);
        }

        Ok(PaddedClip {
            segment_index,
            media,
            duration: target,
            silence_added: silence,
        })
    }

    fn verify(&self, media: &MediaHandle, target: f64, tolerance: f64, segment_index: usize) {
        match self.toolkit.probe_duration(media) {
            Ok(measured) if (measured - target).abs() > tolerance => {
                tracing::warn!(
                    "Segment {}: padded clip measures {:.3}s, expected {:.3}s",
                    segment_index,
                    measured,
                    target
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Segment {}: could not verify padded clip: {}", segment_index, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeToolkit;
    use tempfile::tempdir;

    #[test]
    fn pads_to_exact_target() {
        let dir = tempdir().unwrap();
        let toolkit = FakeToolkit::new();
        let clip = toolkit.add_clip(dir.path().join("segment_001.mp3"), 4.24);

        let padder = AudioPadder::new(&toolkit, dir.path());
        let padded = padder.pad(&clip, 4.24, 5.0, 1).unwrap();

        assert_eq!(padded.duration, 5.0);
        assert!((padded.silence_added - 0.76).abs() < 1e-9);
        assert_ne!(padded.media, clip);
        assert!(padded.media.path().ends_with("segment_001_padded.mp3"));
        // Original clip untouched and silence intermediate removed
        assert!(clip.exists());
        assert!(!dir.path().join("segment_001_silence.mp3").exists());
    }

    #[test]
    fn rejects_target_not_longer() {
        let dir = tempdir().unwrap();
        let toolkit = FakeToolkit::new();
        let clip = toolkit.add_clip(dir.path().join("a.mp3"), 5.0);

        let err = AudioPadder::new(&toolkit, dir.path())
            .pad(&clip, 5.0, 5.0, 0)
            .unwrap_err();
        assert!(matches!(err, PadError::InvalidTarget { segment_index: 0, .. }));
    }

    #[test]
    fn toolkit_failure_is_padding_failed() {
        let dir = tempdir().unwrap();
        let toolkit = FakeToolkit::new();
        toolkit.fail_silence();
        let clip = toolkit.add_clip(dir.path().join("a.mp3"), 4.0);

        let err = AudioPadder::new(&toolkit, dir.path())
            .pad(&clip, 4.0, 5.0, 2)
            .unwrap_err();
        assert_eq!(err.segment_index(), 2);
        assert!(matches!(err, PadError::PaddingFailed { .. }));
        assert!(!dir.path().join("segment_002_padded.mp3").exists());
    }

    #[test]
    fn verification_does_not_change_result() {
        let dir = tempdir().unwrap();
        let toolkit = FakeToolkit::new();
        let clip = toolkit.add_clip(dir.path().join("a.mp3"), 4.0);

        let padded = AudioPadder::new(&toolkit, dir.path())
            .with_extension("wav")
            .with_verification(0.1)
            .pad(&clip, 4.0, 5.0, 0)
            .unwrap();
        assert!(padded.media.path().ends_with("segment_000_padded.wav"));
        assert_eq!(padded.duration, 5.0);
    }
}
