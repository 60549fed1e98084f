//! narrsync core - duration reconciliation and two-pass resync engine.
//!
//! Brings a rendered animation and its synthesized narration to identical
//! per-segment durations. Narration that runs short is padded with silence,
//! narration that runs long extends the animation through hold instructions
//! injected into the visual program, followed by a second render pass.
//!
//! This crate has no UI dependencies. Rendering, speech synthesis and the
//! media primitives are reached through traits so the engine can be driven
//! by the bundled command adapters, a CLI, or test doubles.

pub mod audio;
pub mod collaborators;
pub mod config;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod process;
pub mod reconcile;
pub mod report;
pub mod script;
pub mod subtitles;

#[cfg(test)]
pub(crate) mod testing;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
