//! ffmpeg/ffprobe implementation of the media toolkit.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use super::probe::parse_ffprobe_duration;
use super::{MediaError, MediaResult, MediaToolkit};
use crate::config::MediaSettings;
use crate::logging::JobLogger;
use crate::models::MediaHandle;
use crate::process::{describe, last_output_line};

/// Media toolkit backed by the ffmpeg command line tools.
pub struct FfmpegToolkit {
    settings: MediaSettings,
    /// Job logger for commands and tool output (None = tracing only).
    logger: Option<Arc<JobLogger>>,
}

impl FfmpegToolkit {
    pub fn new(settings: MediaSettings) -> Self {
        Self {
            settings,
            logger: None,
        }
    }

    /// Route commands and tool output through a job logger.
    pub fn with_logger(mut self, logger: Arc<JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn ffmpeg(&self) -> Command {
        let mut cmd = Command::new(&self.settings.ffmpeg_path);
        cmd.arg("-hide_banner").arg("-nostdin").arg("-y");
        cmd
    }

    /// Run a tool and fail on a non-zero exit status.
    fn run(&self, tool: &str, mut cmd: Command) -> MediaResult<Output> {
        let line = describe(&cmd);
        match &self.logger {
            Some(logger) => logger.command(&line),
            None => tracing::debug!("$ {}", line),
        }

        let output = cmd.output().map_err(|source| MediaError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

        if let Some(logger) = &self.logger {
            for l in String::from_utf8_lossy(&output.stderr).lines() {
                logger.tool_output(l, true);
            }
        }

        if !output.status.success() {
            if let Some(logger) = &self.logger {
                logger.dump_tool_output(tool);
            }
            return Err(MediaError::command_failed(
                tool,
                output.status.code().unwrap_or(-1),
                last_output_line(&output),
            ));
        }

        Ok(output)
    }

    fn ensure_parent(output: &Path) -> MediaResult<()> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| MediaError::io("creating output directory", e))?;
            }
        }
        Ok(())
    }

    fn require(media: &MediaHandle) -> MediaResult<()> {
        if media.exists() {
            Ok(())
        } else {
            Err(MediaError::NotFound(media.path().to_path_buf()))
        }
    }

    fn silence_source(&self) -> String {
        format!(
            "anullsrc=channel_layout={}:sample_rate={}",
            self.settings.channel_layout, self.settings.sample_rate
        )
    }
}

/// Concat demuxer list file content for `inputs`.
///
/// Single quotes are escaped the way the concat demuxer expects
/// (`'` becomes `'\''`).
fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl MediaToolkit for FfmpegToolkit {
    fn generate_silence(&self, seconds: f64, output: &Path) -> MediaResult<MediaHandle> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(MediaError::InvalidRequest(format!(
                "silence duration must be positive (got {})",
                seconds
            )));
        }
        Self::ensure_parent(output)?;

        let mut cmd = self.ffmpeg();
        cmd.arg("-f")
            .arg("lavfi")
            .arg("-i")
            .arg(self.silence_source())
            .arg("-t")
            .arg(format!("{:.3}", seconds))
            .arg("-c:a")
            .arg(&self.settings.audio_codec)
            .arg(output);

        self.run("ffmpeg", cmd)?;
        Ok(MediaHandle::new(output))
    }

    fn concatenate(&self, inputs: &[MediaHandle], output: &Path) -> MediaResult<MediaHandle> {
        if inputs.is_empty() {
            return Err(MediaError::InvalidRequest(
                "nothing to concatenate".to_string(),
            ));
        }
        for input in inputs {
            Self::require(input)?;
        }
        Self::ensure_parent(output)?;

        let list_path = output.with_extension("concat.txt");
        let paths: Vec<PathBuf> = inputs.iter().map(|m| absolute(m.path())).collect();
        fs::write(&list_path, concat_list(&paths))
            .map_err(|e| MediaError::io("writing concat list", e))?;

        // Re-encode so clips from different sources join cleanly
        let mut cmd = self.ffmpeg();
        cmd.arg("-f")
            .arg("concat")
            .arg("-safe")
            .arg("0")
            .arg("-i")
            .arg(&list_path)
            .arg("-ar")
            .arg(self.settings.sample_rate.to_string())
            .arg("-c:a")
            .arg(&self.settings.audio_codec)
            .arg(output);

        let result = self.run("ffmpeg", cmd);
        let _ = fs::remove_file(&list_path);
        result?;

        Ok(MediaHandle::new(output))
    }

    fn probe_duration(&self, media: &MediaHandle) -> MediaResult<f64> {
        Self::require(media)?;

        let mut cmd = Command::new(&self.settings.ffprobe_path);
        cmd.arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg(media.path());

        let output = self.run("ffprobe", cmd)?;
        let duration = parse_ffprobe_duration(&output.stdout)?;
        tracing::debug!("Probed {}: {:.3}s", media, duration);
        Ok(duration)
    }

    fn mux(&self, video: &MediaHandle, audio: &MediaHandle, output: &Path) -> MediaResult<MediaHandle> {
        Self::require(video)?;
        Self::require(audio)?;
        Self::ensure_parent(output)?;

        // Stream copy for video; narration replaces any existing audio
        let mut cmd = self.ffmpeg();
        cmd.arg("-i")
            .arg(video.path())
            .arg("-i")
            .arg(audio.path())
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .arg("-c:v")
            .arg("copy")
            .arg("-c:a")
            .arg(&self.settings.mux_audio_codec)
            .arg(output);

        self.run("ffmpeg", cmd)?;
        Ok(MediaHandle::new(output))
    }
}
