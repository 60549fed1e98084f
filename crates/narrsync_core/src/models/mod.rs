//! Data models for narrsync.
//!
//! - Enums for render passes and subtitle formats
//! - Media handles and render artifacts
//! - The segment timeline and per-segment adjustments
//! - Job specification (program + narration)

mod adjustment;
mod enums;
mod job;
mod media;
mod timeline;

pub use adjustment::{Adjustment, AdjustmentKind};
pub use enums::{RenderPass, SubtitleFormat};
pub use job::JobSpec;
pub use media::{MediaHandle, RenderArtifact};
pub use timeline::{NarrationClip, Segment, Timeline, TimelineError};
