//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Job → Step → Operation → Detail

use std::io;

use thiserror::Error;

use crate::audio::AssembleError;
use crate::media::MediaError;
use crate::models::{RenderPass, TimelineError};
use crate::reconcile::ReconcileError;

/// Top-level pipeline error with job context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Input validation failed before pipeline started.
    #[error("Job '{job_name}' failed validation: {message}")]
    ValidationFailed { job_name: String, message: String },

    /// Pipeline was cancelled.
    #[error("Job '{job_name}' was cancelled")]
    Cancelled { job_name: String },

    /// Failed to set up job (create directories, etc.).
    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    /// Create a step failed error.
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    /// Create a validation failed error.
    pub fn validation_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a setup failed error.
    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(job_name: impl Into<String>) -> Self {
        Self::Cancelled {
            job_name: job_name.into(),
        }
    }

    /// The step error behind a step failure, if any.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// A render pass could not produce a video.
    #[error("Render {pass} failed: {message}")]
    RenderFailed { pass: RenderPass, message: String },

    /// Narration for one segment could not be synthesized.
    #[error("Synthesis failed for segment {segment_index}: {message}")]
    SynthesisFailed {
        segment_index: usize,
        message: String,
    },

    /// Durations were rejected by the reconciler.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Render and narration do not form a timeline.
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    /// Narration track assembly failed.
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// A media toolkit call failed.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A required file was not found.
    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    /// A precondition was not met.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    /// The segment worker pool could not be started.
    #[error("Could not start segment workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// Work stopped because cancellation was requested.
    #[error("Cancelled")]
    Cancelled,
}

impl StepError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid output error.
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// Create a render failed error.
    pub fn render_failed(pass: RenderPass, message: impl Into<String>) -> Self {
        Self::RenderFailed {
            pass,
            message: message.into(),
        }
    }

    /// Create a synthesis failed error.
    pub fn synthesis_failed(segment_index: usize, message: impl Into<String>) -> Self {
        Self::SynthesisFailed {
            segment_index,
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a precondition failed error.
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::render_failed(RenderPass::First, "scene raised ValueError");
        let msg = err.to_string();
        assert!(msg.contains("pass 1"));
        assert!(msg.contains("ValueError"));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::synthesis_failed(2, "timed out after 120s");
        let pipeline_err = PipelineError::step_failed("lesson", "Synthesize", step_err);

        let msg = pipeline_err.to_string();
        assert!(msg.contains("lesson"));
        assert!(msg.contains("Synthesize"));
        assert!(matches!(
            pipeline_err.step_error(),
            Some(StepError::SynthesisFailed { segment_index: 2, .. })
        ));
    }

    #[test]
    fn reconcile_errors_convert() {
        let err: StepError = ReconcileError::InvalidThreshold(-1.0).into();
        assert!(matches!(err, StepError::Reconcile(_)));
    }
}
