//! Rerender step - extends animation segments and renders pass 2.
//!
//! Runs only when reconciliation decided `Rerender`. If the program
//! cannot be rewritten, or pass 2 fails, the job falls back to the pass 1
//! video and records a warning naming the extended segments.

use std::fs;
use std::time::Duration;

use super::render::render_pass;
use crate::models::RenderPass;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{AdjustedProgramOutput, Context, JobStage, JobState, StepOutcome};
use crate::reconcile::{Extension, ReconcileDecision};
use crate::report::SyncWarning;
use crate::script::{
    is_expressible_hold, AdjustedProgram, CommandValidator, ProgramLayout, ScriptDialect,
    ScriptResult, StructuralValidator, TimingAdjustmentBuilder, ValidatorChain,
};

/// Limit for the external program validator.
const VALIDATOR_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RerenderStep;

impl RerenderStep {
    pub fn new() -> Self {
        Self
    }

    /// Insert a hold for every extension and validate the result.
    fn adjust_program(ctx: &Context, extensions: &[Extension]) -> ScriptResult<AdjustedProgram> {
        let dialect = ScriptDialect::from(&ctx.settings.script);
        let layout = ProgramLayout::parse(&ctx.job_spec.program, &dialect)?;

        let mut builder = TimingAdjustmentBuilder::new(&layout, &dialect);
        for ext in extensions {
            builder.extend(ext.segment_index, ext.amount)?;
        }

        let mut chain = ValidatorChain::new().with(StructuralValidator);
        let candidate = ctx.work_dir.join(format!(
            "program_candidate.{}",
            ctx.settings.script.program_extension
        ));
        if let Some(validator) =
            CommandValidator::new(ctx.settings.script.validator_command.clone(), candidate)
        {
            chain = chain.with(validator.with_timeout(VALIDATOR_TIMEOUT));
        }

        builder.commit(&chain)
    }

    fn fall_back(
        ctx: &Context,
        state: &mut JobState,
        warning: SyncWarning,
    ) -> StepResult<StepOutcome> {
        ctx.logger.warn(&warning.to_string());
        ctx.logger.warn("Falling back to the pass 1 video");
        state.warnings.push(warning);
        state.advance(JobStage::SkippedRerender)?;
        Ok(StepOutcome::Skipped("using pass 1 video".to_string()))
    }
}

impl Default for RerenderStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for RerenderStep {
    fn name(&self) -> &str {
        "Rerender"
    }

    fn description(&self) -> &str {
        "Extend animation segments and render pass 2"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let extensions = match &state.decision {
            Some(ReconcileDecision::Rerender { extensions }) => extensions.clone(),
            Some(ReconcileDecision::Skip) => {
                state.advance(JobStage::SkippedRerender)?;
                return Ok(StepOutcome::Skipped(
                    "no segment needs a longer animation".to_string(),
                ));
            }
            None => {
                return Err(StepError::precondition_failed("reconcile decision missing"));
            }
        };

        // Holds are written with millisecond precision
        let (extensions, negligible): (Vec<Extension>, Vec<Extension>) = extensions
            .into_iter()
            .partition(|e| is_expressible_hold(e.amount));
        for ext in &negligible {
            ctx.logger.segment(
                ext.segment_index,
                &format!("extension of {:.6}s is below a millisecond, not held", ext.amount),
            );
        }
        if extensions.is_empty() {
            state.advance(JobStage::SkippedRerender)?;
            return Ok(StepOutcome::Skipped(
                "extensions are below a millisecond".to_string(),
            ));
        }

        let segments: Vec<usize> = extensions.iter().map(|e| e.segment_index).collect();

        let adjusted = match Self::adjust_program(ctx, &extensions) {
            Ok(adjusted) => adjusted,
            Err(e) => {
                return Self::fall_back(
                    ctx,
                    state,
                    SyncWarning::ScriptModificationFailed {
                        segments,
                        reason: e.to_string(),
                    },
                );
            }
        };

        for hold in &adjusted.holds {
            ctx.logger.segment(
                hold.segment_index,
                &format!("hold {:.3}s at line {}", hold.seconds, hold.line + 1),
            );
        }

        let path = ctx.program_path(RenderPass::Second);
        fs::write(&path, &adjusted.source)
            .map_err(|e| StepError::io_error("writing pass 2 program", e))?;
        state.adjusted_program = Some(AdjustedProgramOutput {
            path: path.clone(),
            holds: adjusted.holds,
        });

        let (artifact, planned) = match render_pass(ctx, RenderPass::Second, &path) {
            Ok(rendered) => rendered,
            Err(e) => {
                return Self::fall_back(
                    ctx,
                    state,
                    SyncWarning::RerenderFailed {
                        segments,
                        reason: e.to_string(),
                    },
                );
            }
        };

        // Extended segments should now match their narration
        for ext in &extensions {
            let Some(adj) = state.adjustments.get(ext.segment_index) else {
                continue;
            };
            let rendered = planned[ext.segment_index];
            if (rendered - adj.final_duration()).abs() > ctx.tolerance() {
                ctx.logger.warn(&format!(
                    "Segment {}: pass 2 renders {:.3}s, expected {:.3}s",
                    ext.segment_index,
                    rendered,
                    adj.final_duration()
                ));
            }
        }

        state.pass2 = Some(artifact);
        state.advance(JobStage::Rendered2)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.pass2 {
            Some(artifact) if artifact.media.exists() => Ok(()),
            Some(artifact) => Err(StepError::file_not_found(artifact.media.to_string())),
            None => Err(StepError::invalid_output("Pass 2 artifact not recorded")),
        }
    }
}
