//! Media toolkit boundary.
//!
//! The engine never decodes audio or video itself. Everything it needs
//! from media files goes through [`MediaToolkit`]:
//!
//! - generate a silent clip of a given length
//! - concatenate clips in order into one file
//! - measure a file's duration
//! - combine a video stream with a narration track
//!
//! [`FfmpegToolkit`] implements the trait with ffmpeg/ffprobe.

mod ffmpeg;
mod probe;

pub use ffmpeg::FfmpegToolkit;
pub use probe::parse_ffprobe_duration;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::MediaHandle;

/// Errors from media operations.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Tool exited with a failure status.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// Tool could not be started.
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Media file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    /// Request rejected before running anything.
    #[error("Invalid media request: {0}")]
    InvalidRequest(String),
}

impl MediaError {
    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Low-level media primitives.
///
/// Implementations must be safe to call from several worker threads at
/// once as long as every call writes a distinct output path.
pub trait MediaToolkit: Send + Sync {
    /// Write `seconds` of silence to `output`.
    fn generate_silence(&self, seconds: f64, output: &Path) -> MediaResult<MediaHandle>;

    /// Concatenate `inputs` in order into `output`. Never mixes or overlays.
    fn concatenate(&self, inputs: &[MediaHandle], output: &Path) -> MediaResult<MediaHandle>;

    /// Measured duration of `media` in seconds.
    fn probe_duration(&self, media: &MediaHandle) -> MediaResult<f64>;

    /// Combine the video stream of `video` with `audio` into `output`
    /// without re-timing either stream.
    fn mux(&self, video: &MediaHandle, audio: &MediaHandle, output: &Path) -> MediaResult<MediaHandle>;
}
