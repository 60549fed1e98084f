//! External collaborators: the renderer and the speech synthesizer.
//!
//! Both are reached through traits so a job can be driven by the bundled
//! command adapters ([`CommandRenderer`], [`CommandSynthesizer`]) or by
//! in-process implementations.

mod command;

pub use command::{CommandRenderer, CommandSynthesizer, TimingManifest, TIMING_MANIFEST};

use std::io;
use std::path::Path;

use thiserror::Error;

use crate::media::MediaError;
use crate::models::{MediaHandle, RenderPass};
use crate::orchestrator::CancelHandle;

/// Errors from a collaborator.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{what} failed: {message}")]
    Failed { what: String, message: String },

    #[error("{what} timed out after {secs}s")]
    TimedOut { what: String, secs: u64 },

    #[error("{what} was cancelled")]
    Cancelled { what: String },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("{what} produced invalid output: {message}")]
    InvalidOutput { what: String, message: String },

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl CollaboratorError {
    pub fn failed(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn invalid_output(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// One render request.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub pass: RenderPass,
    /// Program file to render.
    pub program: &'a Path,
    /// Directory the renderer may write into.
    pub output_dir: &'a Path,
    /// Stops the render when the job is cancelled.
    pub cancel: &'a CancelHandle,
}

/// What a render pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    pub video: MediaHandle,
    /// Planned duration of every segment, in order.
    pub planned_durations: Vec<f64>,
}

/// Turns a visual program into a video.
pub trait Renderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> CollaboratorResult<RenderOutput>;
}

/// A synthesized narration clip.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    pub media: MediaHandle,
    /// Measured duration in seconds.
    pub duration: f64,
}

/// Turns narration text into speech.
///
/// Called concurrently for different segments; every call writes its own
/// `output` path. Implementations should give up early once `cancel` fires.
pub trait Synthesizer: Send + Sync {
    fn synthesize(
        &self,
        segment_index: usize,
        text: &str,
        output: &Path,
        cancel: &CancelHandle,
    ) -> CollaboratorResult<SynthesizedClip>;
}
