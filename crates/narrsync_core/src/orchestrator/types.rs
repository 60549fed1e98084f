//! Core types for the orchestrator pipeline.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{StepError, StepResult};
use super::pipeline::CancelHandle;
use crate::audio::PaddedClip;
use crate::collaborators::{Renderer, Synthesizer};
use crate::config::Settings;
use crate::logging::JobLogger;
use crate::media::MediaToolkit;
use crate::models::{Adjustment, JobSpec, MediaHandle, RenderArtifact, RenderPass, Timeline};
use crate::reconcile::ReconcileDecision;
use crate::report::{AdjustmentReport, SyncWarning};
use crate::script::HoldInstruction;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// External services a job talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub toolkit: Arc<dyn MediaToolkit>,
    pub renderer: Arc<dyn Renderer>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// Read-only context passed to pipeline steps.
///
/// Contains job configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `JobState`.
pub struct Context {
    /// Job specification (program + narration).
    pub job_spec: JobSpec,
    /// Application settings.
    pub settings: Settings,
    /// Job name/identifier.
    pub job_name: String,
    /// Job-specific working directory (under work_root).
    pub work_dir: PathBuf,
    /// Output directory for the final video and sidecars.
    pub output_dir: PathBuf,
    /// Per-job logger.
    pub logger: Arc<JobLogger>,
    /// Media primitives.
    pub toolkit: Arc<dyn MediaToolkit>,
    /// Visual program renderer.
    pub renderer: Arc<dyn Renderer>,
    /// Narration synthesizer.
    pub synthesizer: Arc<dyn Synthesizer>,
    cancel: CancelHandle,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    /// Create a new context for a job.
    pub fn new(
        job_spec: JobSpec,
        settings: Settings,
        job_name: impl Into<String>,
        work_dir: PathBuf,
        output_dir: PathBuf,
        logger: Arc<JobLogger>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            job_spec,
            settings,
            job_name: job_name.into(),
            work_dir,
            output_dir,
            logger,
            toolkit: collaborators.toolkit,
            renderer: collaborators.renderer,
            synthesizer: collaborators.synthesizer,
            cancel: CancelHandle::new(),
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Use a shared cancellation flag.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report progress to the job log and the callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        self.logger.progress(step_name, percent);
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Reconciliation tolerance in seconds.
    pub fn tolerance(&self) -> f64 {
        self.settings.reconcile.tolerance_secs
    }

    /// Extension of generated audio files.
    pub fn audio_extension(&self) -> &str {
        &self.settings.media.audio_extension
    }

    /// Where synthesized clips go.
    pub fn narration_dir(&self) -> PathBuf {
        self.work_dir.join("narration")
    }

    /// Where padded clips go.
    pub fn padding_dir(&self) -> PathBuf {
        self.work_dir.join("padded")
    }

    /// Output directory handed to the renderer for a pass.
    pub fn render_dir(&self, pass: RenderPass) -> PathBuf {
        self.work_dir.join(format!("render_pass{}", pass.number()))
    }

    /// Program file written for a pass.
    pub fn program_path(&self, pass: RenderPass) -> PathBuf {
        self.work_dir.join(format!(
            "program_pass{}.{}",
            pass.number(),
            self.settings.script.program_extension
        ))
    }
}

/// Lifecycle of a job.
///
/// ```text
/// Drafted → Rendered1 → AudioSynthesized → Reconciled
///     → Rendered2 | SkippedRerender → Assembled → Done
/// ```
///
/// `Failed` can be entered from any non-terminal stage and is absorbing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "stage", content = "reason", rename_all = "snake_case")]
pub enum JobStage {
    #[default]
    Drafted,
    Rendered1,
    AudioSynthesized,
    Reconciled,
    Rendered2,
    SkippedRerender,
    Assembled,
    Done,
    Failed(String),
}

impl JobStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed(_))
    }

    /// Whether `next` directly follows this stage.
    pub fn can_advance_to(&self, next: &JobStage) -> bool {
        use JobStage::*;
        match (self, next) {
            (current, Failed(_)) => !current.is_terminal(),
            (Drafted, Rendered1)
            | (Rendered1, AudioSynthesized)
            | (AudioSynthesized, Reconciled)
            | (Reconciled, Rendered2)
            | (Reconciled, SkippedRerender)
            | (Rendered2, Assembled)
            | (SkippedRerender, Assembled)
            | (Assembled, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStage::Drafted => write!(f, "drafted"),
            JobStage::Rendered1 => write!(f, "rendered (pass 1)"),
            JobStage::AudioSynthesized => write!(f, "audio synthesized"),
            JobStage::Reconciled => write!(f, "reconciled"),
            JobStage::Rendered2 => write!(f, "rendered (pass 2)"),
            JobStage::SkippedRerender => write!(f, "re-render skipped"),
            JobStage::Assembled => write!(f, "assembled"),
            JobStage::Done => write!(f, "done"),
            JobStage::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Rewritten program used for pass 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedProgramOutput {
    pub path: PathBuf,
    pub holds: Vec<HoldInstruction>,
}

/// The assembled narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationTrackOutput {
    pub media: MediaHandle,
    pub total_duration: f64,
}

/// Output from the Mux step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxOutput {
    /// Final video with the narration track.
    pub output_path: PathBuf,
    /// Copy of the assembled narration track.
    pub narration: PathBuf,
    /// Subtitle sidecar, when enabled.
    pub subtitles: Option<PathBuf>,
    /// JSON report, when enabled.
    pub report: Option<PathBuf>,
}

/// Mutable job state that accumulates results from pipeline steps.
///
/// This is the "write-once manifest" - steps add their own section and
/// never rewrite another step's output. The timeline is replaced by a new
/// snapshot at each stage that changes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    /// Unique job identifier.
    pub job_id: String,
    /// When the job started.
    pub started_at: Option<String>,
    pub stage: JobStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass1: Option<RenderArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub planned_durations: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Timeline>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ReconcileDecision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub padded: Vec<PaddedClip>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_program: Option<AdjustedProgramOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass2: Option<RenderArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_track: Option<NarrationTrackOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mux: Option<MuxOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AdjustmentReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SyncWarning>,
}

impl JobState {
    /// Create a new job state with the given ID.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, next: JobStage) -> StepResult<()> {
        if !self.stage.can_advance_to(&next) {
            return Err(StepError::precondition_failed(format!(
                "cannot move job from '{}' to '{}'",
                self.stage, next
            )));
        }
        tracing::debug!("Job {}: {} -> {}", self.job_id, self.stage, next);
        self.stage = next;
        Ok(())
    }

    /// Mark the job failed. A terminal stage is kept.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.stage.is_terminal() {
            self.stage = JobStage::Failed(reason.into());
        }
    }

    /// Video the final mux uses: pass 2 when it exists, else pass 1.
    pub fn final_artifact(&self) -> Option<&RenderArtifact> {
        self.pass2.as_ref().or(self.pass1.as_ref())
    }

    pub fn require_timeline(&self) -> StepResult<&Timeline> {
        self.timeline
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("no timeline yet"))
    }
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (preconditions not met, but not an error).
    Skipped(String),
}
