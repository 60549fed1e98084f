//! Reconcile step - decides the correction for every segment.

use crate::reconcile::{reconcile, ReconcileDecision};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobStage, JobState, StepOutcome};

pub struct ReconcileStep;

impl ReconcileStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReconcileStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ReconcileStep {
    fn name(&self) -> &str {
        "Reconcile"
    }

    fn description(&self) -> &str {
        "Compare planned and narration durations"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let timeline = state.require_timeline()?;
        let tolerance = ctx.tolerance();
        let adjustments = reconcile(&timeline.duration_pairs(), tolerance)?;

        for adj in adjustments.iter().filter(|a| !a.kind.is_none()) {
            ctx.logger.info(&format!(
                "Segment {}: planned {:.3}s, narration {:.3}s -> {}",
                adj.segment_index, adj.planned, adj.actual, adj.kind
            ));
        }

        let decision = ReconcileDecision::from_adjustments(&adjustments);
        let adjusted = adjustments.iter().filter(|a| !a.kind.is_none()).count();
        match &decision {
            ReconcileDecision::Rerender { extensions } => ctx.logger.info(&format!(
                "{} of {} segments need correction, {} need a longer animation",
                adjusted,
                adjustments.len(),
                extensions.len()
            )),
            ReconcileDecision::Skip => ctx.logger.info(&format!(
                "{} of {} segments need correction, no re-render needed (tolerance {:.3}s)",
                adjusted,
                adjustments.len(),
                tolerance
            )),
        }

        state.adjustments = adjustments;
        state.decision = Some(decision);
        state.advance(JobStage::Reconciled)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.decision.is_none() {
            return Err(StepError::invalid_output("Reconcile decision not recorded"));
        }
        Ok(())
    }
}
