//! Subtitle cues written from the final timeline.
//!
//! Cue times come from the sequential narration placements, so they line
//! up with the assembled track and, after reconciliation, with the video.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::models::{SubtitleFormat, Timeline};

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Cues for every segment with non-empty text.
pub fn cues_from_timeline(timeline: &Timeline) -> Vec<Cue> {
    timeline
        .segments()
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| Cue {
            start: s.actual_start,
            end: s.actual_end,
            text: s.text.trim().to_string(),
        })
        .collect()
}

/// Split seconds into (hours, minutes, seconds, millis), rounding to the
/// nearest millisecond.
fn split_time(seconds: f64) -> (u64, u64, u64, u64) {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    (total_mins / 60, total_mins % 60, secs, millis)
}

/// `HH:MM:SS,mmm`
pub fn format_srt_time(seconds: f64) -> String {
    let (h, m, s, ms) = split_time(seconds);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// `HH:MM:SS.mmm`
pub fn format_vtt_time(seconds: f64) -> String {
    let (h, m, s, ms) = split_time(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Render cues in the given format. `SubtitleFormat::None` renders nothing.
pub fn render(cues: &[Cue], format: SubtitleFormat) -> String {
    let mut output = String::new();

    match format {
        SubtitleFormat::None => {}
        SubtitleFormat::Srt => {
            for (i, cue) in cues.iter().enumerate() {
                if i > 0 {
                    output.push('\n');
                }
                output.push_str(&format!("{}\n", i + 1));
                output.push_str(&format!(
                    "{} --> {}\n",
                    format_srt_time(cue.start),
                    format_srt_time(cue.end)
                ));
                output.push_str(&cue.text);
                output.push('\n');
            }
        }
        SubtitleFormat::Vtt => {
            output.push_str("WEBVTT\n\n");
            for (i, cue) in cues.iter().enumerate() {
                if i > 0 {
                    output.push('\n');
                }
                output.push_str(&format!(
                    "{} --> {}\n",
                    format_vtt_time(cue.start),
                    format_vtt_time(cue.end)
                ));
                output.push_str(&cue.text);
                output.push('\n');
            }
        }
    }

    output
}

/// Write the subtitle file for `timeline` to `path` with the format's
/// extension. Returns the written path, or `None` when subtitles are off.
pub fn write_subtitle_file(
    timeline: &Timeline,
    format: SubtitleFormat,
    path: &Path,
) -> io::Result<Option<PathBuf>> {
    let Some(extension) = format.extension() else {
        return Ok(None);
    };

    let path = path.with_extension(extension);
    let content = render(&cues_from_timeline(timeline), format);
    fs::write(&path, content)?;
    tracing::debug!("Wrote {} subtitles to {}", format, path.display());
    Ok(Some(path))
}
