//! Assemble step - concatenates the narration clips back to back.

use crate::audio::SequentialAssembler;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobStage, JobState, NarrationTrackOutput, StepOutcome};

pub struct AssembleStep;

impl AssembleStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AssembleStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for AssembleStep {
    fn name(&self) -> &str {
        "Assemble"
    }

    fn description(&self) -> &str {
        "Build the sequential narration track"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let timeline = state.require_timeline()?;
        let output = ctx
            .work_dir
            .join(format!("narration_track.{}", ctx.audio_extension()));

        let track = SequentialAssembler::new(ctx.toolkit.as_ref()).assemble(
            &timeline.clips(),
            &timeline.audio_durations(),
            &output,
        )?;
        let updated = timeline.with_placements(&track.placements);

        ctx.logger.info(&format!(
            "Narration track: {} segments, {:.3}s",
            track.placements.len(),
            track.total_duration
        ));

        if let Some(video) = state.final_artifact() {
            let gap = (video.measured_duration - track.total_duration).abs();
            if gap > ctx.tolerance() {
                ctx.logger.warn(&format!(
                    "Video ({}) is {:.3}s, narration is {:.3}s",
                    video.pass, video.measured_duration, track.total_duration
                ));
            }
        }

        state.narration_track = Some(NarrationTrackOutput {
            media: track.media,
            total_duration: track.total_duration,
        });
        state.timeline = Some(updated);
        state.advance(JobStage::Assembled)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.narration_track {
            Some(track) if track.media.exists() => Ok(()),
            Some(track) => Err(StepError::file_not_found(track.media.to_string())),
            None => Err(StepError::invalid_output("Narration track not recorded")),
        }
    }
}
