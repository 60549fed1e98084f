//! Render step - renders the visual program once to discover its timing.

use std::fs;
use std::path::Path;

use crate::collaborators::RenderRequest;
use crate::models::{RenderArtifact, RenderPass, TimelineError};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobStage, JobState, StepOutcome};

/// Render `program` for `pass` and measure the produced video.
///
/// Returns the artifact and the planned per-segment durations. The video
/// is measured with the toolkit; when probing fails the planned total is
/// used instead.
pub(super) fn render_pass(
    ctx: &Context,
    pass: RenderPass,
    program: &Path,
) -> StepResult<(RenderArtifact, Vec<f64>)> {
    let output_dir = ctx.render_dir(pass);
    let request = RenderRequest {
        pass,
        program,
        output_dir: &output_dir,
        cancel: ctx.cancel_handle(),
    };

    ctx.logger
        .info(&format!("Rendering {} ({})", program.display(), pass));
    let output = ctx
        .renderer
        .render(&request)
        .map_err(|e| StepError::render_failed(pass, e.to_string()))?;

    if output.planned_durations.len() != ctx.job_spec.segment_count() {
        return Err(StepError::Timeline(TimelineError::SegmentCountMismatch {
            planned: output.planned_durations.len(),
            narration: ctx.job_spec.segment_count(),
        }));
    }

    let planned_total: f64 = output.planned_durations.iter().sum();
    let measured = match ctx.toolkit.probe_duration(&output.video) {
        Ok(duration) => duration,
        Err(e) => {
            ctx.logger.warn(&format!(
                "Could not measure {}: {}; using planned total {:.3}s",
                output.video, e, planned_total
            ));
            planned_total
        }
    };

    ctx.logger.info(&format!(
        "{}: {} segments, {:.3}s planned, {:.3}s rendered",
        pass,
        output.planned_durations.len(),
        planned_total,
        measured
    ));

    Ok((
        RenderArtifact::new(output.video, measured, pass),
        output.planned_durations,
    ))
}

/// First render pass. Failure here is fatal for the job.
pub struct RenderStep;

impl RenderStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RenderStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for RenderStep {
    fn name(&self) -> &str {
        "Render"
    }

    fn description(&self) -> &str {
        "Render the visual program (pass 1)"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.job_spec.program.trim().is_empty() {
            return Err(StepError::invalid_input("Visual program is empty"));
        }
        if ctx.job_spec.narration.is_empty() {
            return Err(StepError::invalid_input("Job has no narration segments"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let program = ctx.program_path(RenderPass::First);
        fs::write(&program, &ctx.job_spec.program)
            .map_err(|e| StepError::io_error("writing pass 1 program", e))?;

        let (artifact, planned) = render_pass(ctx, RenderPass::First, &program)?;

        state.pass1 = Some(artifact);
        state.planned_durations = planned;
        state.advance(JobStage::Rendered1)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let artifact = state
            .pass1
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Pass 1 artifact not recorded"))?;
        if !artifact.media.exists() {
            return Err(StepError::file_not_found(artifact.media.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn records_pass1_artifact() {
        let fixture = Fixture::new(&[3.0, 5.0, 7.0], &[5.0, 4.0, 6.0]);
        let ctx = fixture.context();
        let mut state = JobState::new("job");

        let step = RenderStep::new();
        step.validate_input(&ctx).unwrap();
        step.execute(&ctx, &mut state).unwrap();
        step.validate_output(&ctx, &state).unwrap();

        assert_eq!(state.planned_durations, vec![3.0, 5.0, 7.0]);
        let artifact = state.pass1.unwrap();
        assert_eq!(artifact.measured_duration, 15.0);
        assert_eq!(state.stage, JobStage::Rendered1);
        assert!(ctx.program_path(RenderPass::First).exists());
    }

    #[test]
    fn render_failure_is_fatal() {
        let fixture = Fixture::new(&[3.0], &[3.0]);
        fixture.renderer.fail_on(RenderPass::First);
        let ctx = fixture.context();
        let mut state = JobState::new("job");

        let err = RenderStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(
            err,
            StepError::RenderFailed {
                pass: RenderPass::First,
                ..
            }
        ));
    }

    #[test]
    fn segment_count_must_match_narration() {
        let mut fixture = Fixture::new(&[3.0, 5.0], &[3.0, 5.0]);
        fixture.job.narration.pop();
        let ctx = fixture.context();
        let mut state = JobState::new("job");

        let err = RenderStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::Timeline(_)));
    }
}
