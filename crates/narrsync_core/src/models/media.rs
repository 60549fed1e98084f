//! Media handles and render artifacts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::RenderPass;

/// Opaque reference to a media file consumed or produced by the toolkit.
///
/// The engine never looks inside media files; it only passes handles
/// between collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaHandle(PathBuf);

impl MediaHandle {
    /// Create a handle for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether the underlying file exists.
    pub fn exists(&self) -> bool {
        self.0.exists()
    }
}

impl From<PathBuf> for MediaHandle {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl AsRef<Path> for MediaHandle {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Video produced by a render pass.
///
/// A second-pass artifact supersedes the first-pass one when it exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderArtifact {
    /// Rendered video file.
    pub media: MediaHandle,
    /// Measured duration in seconds.
    pub measured_duration: f64,
    /// Pass that produced this artifact.
    pub pass: RenderPass,
}

impl RenderArtifact {
    pub fn new(media: MediaHandle, measured_duration: f64, pass: RenderPass) -> Self {
        Self {
            media,
            measured_duration,
            pass,
        }
    }
}
