//! Two-pass render orchestrator.
//!
//! A job is a sequence of pipeline steps that validate, execute, and
//! record their results in a [`JobState`], which also tracks the job's
//! lifecycle stage.
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── Step: Render      (pass 1, fatal on failure)
//!     ├── Step: Synthesize  (per segment, concurrent, fatal on failure)
//!     ├── Step: Reconcile   (Rerender | Skip decided once)
//!     ├── Step: Pad         (per segment, concurrent, non-fatal)
//!     ├── Step: Rerender    (pass 2, falls back to pass 1 on failure)
//!     ├── Step: Assemble    (sequential narration track)
//!     └── Step: Mux         (video + narration, subtitles, report)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use narrsync_core::orchestrator::{Collaborators, JobRunner};
//!
//! let runner = JobRunner::new(settings, Collaborators { toolkit, renderer, synthesizer });
//! let outcome = runner.run(job, None, None)?;
//! if outcome.is_degraded() {
//!     println!("segments {:?} keep a mismatch", outcome.report.affected_segments());
//! }
//! ```

mod errors;
mod job;
pub(crate) mod parallel;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use job::{run_job, JobOutcome, JobRunner};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    AssembleStep, MuxStep, PadStep, ReconcileStep, RenderStep, RerenderStep, SynthesizeStep,
};
pub use types::{
    AdjustedProgramOutput, Collaborators, Context, JobStage, JobState, MuxOutput,
    NarrationTrackOutput, ProgressCallback, StepOutcome,
};

/// Create the two-pass pipeline with all steps in order.
pub fn create_two_pass_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(RenderStep::new())
        .with_step(SynthesizeStep::new())
        .with_step(ReconcileStep::new())
        .with_step(PadStep::new())
        .with_step(RerenderStep::new())
        .with_step(AssembleStep::new())
        .with_step(MuxStep::new())
}
