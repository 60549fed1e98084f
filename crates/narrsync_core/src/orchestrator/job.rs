//! Job runner for driving one job through the two-pass pipeline.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::logging::{sanitize_filename, JobLogger, LogCallback, LogConfig};
use crate::models::{JobSpec, Timeline};
use crate::report::AdjustmentReport;

use super::create_two_pass_pipeline;
use super::errors::{PipelineError, PipelineResult};
use super::pipeline::{CancelHandle, PipelineRunResult};
use super::types::{Collaborators, Context, JobStage, JobState, ProgressCallback};

/// What a finished job produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: String,
    /// Final video with the narration track.
    pub video: PathBuf,
    /// The assembled narration track.
    pub audio: PathBuf,
    pub subtitles: Option<PathBuf>,
    /// Narration duration of every segment in the final track.
    pub final_durations: Vec<f64>,
    /// Final timeline. Segment clips live in the work directory and are
    /// only readable when `paths.keep_temp` is set; use `audio` for the
    /// narration otherwise.
    pub timeline: Timeline,
    pub report: AdjustmentReport,
    pub steps: PipelineRunResult,
}

impl JobOutcome {
    /// True when some correction could not be applied.
    pub fn is_degraded(&self) -> bool {
        self.report.is_degraded()
    }
}

/// Runs jobs with one set of settings and collaborators.
///
/// # Example
///
/// ```ignore
/// let runner = JobRunner::new(settings, collaborators);
/// let outcome = runner.run(job, None, None)?;
/// println!("{}", outcome.video.display());
/// ```
pub struct JobRunner {
    settings: Settings,
    collaborators: Collaborators,
    cancel: CancelHandle,
}

impl JobRunner {
    pub fn new(settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            settings,
            collaborators,
            cancel: CancelHandle::new(),
        }
    }

    /// Handle that cancels the job currently running (or the next one).
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn job_id(name: &str) -> String {
        format!(
            "{}_{}",
            sanitize_filename(name),
            chrono::Local::now().format("%Y%m%d_%H%M%S_%3f")
        )
    }

    /// Run one job to completion.
    ///
    /// The job's working directory is removed afterwards unless
    /// `paths.keep_temp` is set.
    pub fn run(
        &self,
        job: JobSpec,
        log_callback: Option<LogCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> PipelineResult<JobOutcome> {
        let job_name = job.name.clone();

        self.settings
            .validate()
            .map_err(|e| PipelineError::validation_failed(&job_name, e))?;
        if job.narration.is_empty() {
            return Err(PipelineError::validation_failed(
                &job_name,
                "no narration segments",
            ));
        }
        if job.program.trim().is_empty() {
            return Err(PipelineError::validation_failed(&job_name, "empty visual program"));
        }

        let job_id = Self::job_id(&job_name);
        let work_dir = PathBuf::from(&self.settings.paths.work_root).join(&job_id);
        let output_dir = PathBuf::from(&self.settings.paths.output_folder);

        fs::create_dir_all(&work_dir).map_err(|e| {
            PipelineError::setup_failed(&job_name, format!("Failed to create work directory: {}", e))
        })?;

        let logger = JobLogger::new(
            &job_name,
            &self.settings.paths.logs_folder,
            LogConfig::from(&self.settings.logging),
            log_callback,
        )
        .map(Arc::new)
        .map_err(|e| {
            PipelineError::setup_failed(&job_name, format!("Failed to create logger: {}", e))
        })?;

        let mut ctx = Context::new(
            job,
            self.settings.clone(),
            &job_name,
            work_dir.clone(),
            output_dir,
            Arc::clone(&logger),
            self.collaborators.clone(),
        )
        .with_cancel_handle(self.cancel.clone());
        if let Some(callback) = progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        logger.info(&format!("Starting job: {}", job_name));
        logger.info(&format!(
            "Segments: {}, tolerance {:.3}s",
            ctx.job_spec.segment_count(),
            ctx.tolerance()
        ));

        let mut state = JobState::new(&job_id);
        let pipeline = create_two_pass_pipeline().with_cancel_handle(self.cancel.clone());
        let result = pipeline.run(&ctx, &mut state);

        if !self.settings.paths.keep_temp {
            if let Err(e) = fs::remove_dir_all(&work_dir) {
                logger.warn(&format!("Failed to remove {}: {}", work_dir.display(), e));
            }
        }

        let outcome = result.and_then(|steps| Self::outcome(&job_name, state, steps));
        match &outcome {
            Ok(o) if o.is_degraded() => logger.warn(&format!(
                "Job finished with {} warning(s)",
                o.report.warnings.len()
            )),
            Ok(_) => logger.success("Job finished, all segments synchronized"),
            Err(e) => logger.error(&format!("Job failed: {}", e)),
        }
        logger.close();
        outcome
    }

    fn outcome(job_name: &str, state: JobState, steps: PipelineRunResult) -> PipelineResult<JobOutcome> {
        let incomplete = |what: &str| {
            PipelineError::validation_failed(job_name, format!("pipeline finished without {}", what))
        };

        if state.stage != JobStage::Done {
            return Err(incomplete("reaching the done stage"));
        }
        let mux = state.mux.ok_or_else(|| incomplete("a muxed video"))?;
        let timeline = state.timeline.ok_or_else(|| incomplete("a timeline"))?;
        let report = state.report.ok_or_else(|| incomplete("a report"))?;

        Ok(JobOutcome {
            job_id: state.job_id,
            video: mux.output_path,
            audio: mux.narration,
            subtitles: mux.subtitles,
            final_durations: timeline.audio_durations(),
            timeline,
            report,
            steps,
        })
    }
}

/// Run one job with default callbacks.
pub fn run_job(
    job: JobSpec,
    settings: Settings,
    collaborators: Collaborators,
) -> PipelineResult<JobOutcome> {
    JobRunner::new(settings, collaborators).run(job, None, None)
}
