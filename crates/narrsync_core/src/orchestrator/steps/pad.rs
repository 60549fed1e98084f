//! Pad step - appends silence to narration clips that run short.
//!
//! A failed pad only affects its own segment: the unpadded clip stays in
//! the timeline and a `PaddingFailed` warning is recorded.

use std::fs;

use crate::audio::AudioPadder;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::parallel::for_each_segment;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::reconcile::pad_requests;
use crate::report::SyncWarning;

pub struct PadStep;

impl PadStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PadStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PadStep {
    fn name(&self) -> &str {
        "Pad"
    }

    fn description(&self) -> &str {
        "Pad short narration clips with silence"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let requests = pad_requests(&state.adjustments);
        if requests.is_empty() {
            return Ok(StepOutcome::Skipped(
                "no narration clip needs padding".to_string(),
            ));
        }

        let timeline = state.require_timeline()?;
        let jobs: Vec<_> = requests
            .iter()
            .filter_map(|req| timeline.get(req.segment_index).map(|s| (*req, s.clip.clone())))
            .collect();

        let dir = ctx.padding_dir();
        fs::create_dir_all(&dir).map_err(|e| StepError::io_error("creating padding directory", e))?;

        let mut padder =
            AudioPadder::new(ctx.toolkit.as_ref(), &dir).with_extension(ctx.audio_extension());
        if ctx.settings.reconcile.verify_padding {
            padder = padder.with_verification(ctx.tolerance());
        }

        ctx.logger
            .info(&format!("Padding {} narration clips", jobs.len()));

        let results = for_each_segment(
            jobs.len(),
            ctx.settings.synthesis.max_parallel,
            ctx.cancel_handle(),
            false,
            |k, _| {
                let (req, clip) = &jobs[k];
                padder.pad(clip, req.current, req.target, req.segment_index)
            },
        )?;

        let mut padded = Vec::with_capacity(jobs.len());
        let mut warnings = Vec::new();
        for ((req, _), result) in jobs.iter().zip(results) {
            match result {
                Some(Ok(clip)) => {
                    ctx.logger.segment(
                        clip.segment_index,
                        &format!("padded +{:.3}s", clip.silence_added),
                    );
                    padded.push(clip);
                }
                Some(Err(e)) => {
                    let warning = SyncWarning::PaddingFailed {
                        segment_index: req.segment_index,
                        shortfall_secs: req.target - req.current,
                        reason: e.to_string(),
                    };
                    ctx.logger.warn(&warning.to_string());
                    warnings.push(warning);
                }
                None => return Err(StepError::Cancelled),
            }
        }

        let updated = timeline.with_padded_clips(&padded);
        ctx.logger.info(&format!(
            "Padded {} of {} clips, narration now {:.3}s",
            padded.len(),
            jobs.len(),
            updated.total_actual_duration()
        ));

        state.timeline = Some(updated);
        state.padded = padded;
        state.warnings.extend(warnings);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if let Some(clip) = state.padded.iter().find(|c| !c.media.exists()) {
            return Err(StepError::file_not_found(clip.media.to_string()));
        }
        Ok(())
    }
}
