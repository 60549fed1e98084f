//! Core enums used throughout the engine.

use serde::{Deserialize, Serialize};

/// Which render pass produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPass {
    /// Render of the original program; discovers planned timing.
    First,
    /// Re-render of the program after hold instructions were injected.
    Second,
}

impl RenderPass {
    /// 1-based pass number (used in file names and command templates).
    pub fn number(&self) -> u32 {
        match self {
            RenderPass::First => 1,
            RenderPass::Second => 2,
        }
    }
}

impl std::fmt::Display for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pass {}", self.number())
    }
}

/// Sidecar subtitle format written from the final timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// SubRip (`HH:MM:SS,mmm`).
    #[default]
    Srt,
    /// WebVTT (`HH:MM:SS.mmm`).
    Vtt,
    /// Do not write a subtitle file.
    None,
}

impl SubtitleFormat {
    /// File extension for this format, if it produces a file.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            SubtitleFormat::Srt => Some("srt"),
            SubtitleFormat::Vtt => Some("vtt"),
            SubtitleFormat::None => None,
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleFormat::Srt => write!(f, "srt"),
            SubtitleFormat::Vtt => write!(f, "vtt"),
            SubtitleFormat::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_pass_numbers() {
        assert_eq!(RenderPass::First.number(), 1);
        assert_eq!(RenderPass::Second.to_string(), "pass 2");
    }

    #[test]
    fn subtitle_format_serde_is_lowercase() {
        let json = serde_json::to_string(&SubtitleFormat::Vtt).unwrap();
        assert_eq!(json, "\"vtt\"");
        assert_eq!(SubtitleFormat::None.extension(), None);
    }
}
