//! Collaborators backed by configured external commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{
    CollaboratorError, CollaboratorResult, RenderOutput, RenderRequest, Renderer,
    SynthesizedClip, Synthesizer,
};
use crate::config::{RenderSettings, SynthesisSettings};
use crate::logging::JobLogger;
use crate::media::MediaToolkit;
use crate::models::MediaHandle;
use crate::orchestrator::CancelHandle;
use crate::process::{describe, expand_args, last_output_line, run_with_timeout, CommandOutcome};

/// File the render command leaves in its output directory.
pub const TIMING_MANIFEST: &str = "timing.json";

/// Render result manifest.
///
/// ```json
/// {"video": "lesson.mp4", "segments": [{"duration": 3.0}, {"duration": 5.0}]}
/// ```
///
/// A relative `video` path is resolved against the output directory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimingManifest {
    pub video: PathBuf,
    pub segments: Vec<SegmentTiming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SegmentTiming {
    pub duration: f64,
}

impl TimingManifest {
    pub fn load(output_dir: &Path) -> CollaboratorResult<Self> {
        let path = output_dir.join(TIMING_MANIFEST);
        let content = fs::read_to_string(&path)
            .map_err(|e| CollaboratorError::io(format!("reading {}", path.display()), e))?;
        serde_json::from_str(&content)
            .map_err(|e| CollaboratorError::invalid_output("render", format!("{}: {}", TIMING_MANIFEST, e)))
    }

    pub fn planned_durations(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.duration).collect()
    }
}

fn timeout_of(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run one collaborator command, logging like the media toolkit does.
fn execute(
    what: &str,
    args: &[String],
    timeout_secs: u64,
    cancel: &CancelHandle,
    logger: Option<&JobLogger>,
) -> CollaboratorResult<()> {
    let Some((program, rest)) = args.split_first() else {
        return Err(CollaboratorError::failed(what, "no command configured"));
    };

    let mut cmd = Command::new(program);
    cmd.args(rest);

    let line = describe(&cmd);
    match logger {
        Some(logger) => logger.command(&line),
        None => tracing::debug!("$ {}", line),
    }

    let outcome = run_with_timeout(&mut cmd, timeout_of(timeout_secs), Some(cancel))
        .map_err(|e| CollaboratorError::failed(what, format!("could not run {}: {}", program, e)))?;

    let output = match outcome {
        CommandOutcome::Finished(output) => output,
        CommandOutcome::TimedOut { .. } => {
            return Err(CollaboratorError::TimedOut {
                what: what.to_string(),
                secs: timeout_secs,
            })
        }
        CommandOutcome::Cancelled => {
            return Err(CollaboratorError::Cancelled {
                what: what.to_string(),
            })
        }
    };

    if let Some(logger) = logger {
        for l in String::from_utf8_lossy(&output.stdout).lines() {
            logger.tool_output(l, false);
        }
        for l in String::from_utf8_lossy(&output.stderr).lines() {
            logger.tool_output(l, true);
        }
    }

    if !output.status.success() {
        if let Some(logger) = logger {
            logger.dump_tool_output(what);
        }
        return Err(CollaboratorError::failed(
            what,
            format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                last_output_line(&output)
            ),
        ));
    }

    Ok(())
}

/// Renderer that runs `[render] command`.
///
/// Placeholders: `{program}`, `{output_dir}`, `{pass}`.
pub struct CommandRenderer {
    argv: Vec<String>,
    timeout_secs: u64,
    logger: Option<Arc<JobLogger>>,
}

impl CommandRenderer {
    pub fn new(settings: &RenderSettings) -> CollaboratorResult<Self> {
        if settings.command.is_empty() {
            return Err(CollaboratorError::failed(
                "render",
                "render.command is not configured",
            ));
        }
        Ok(Self {
            argv: settings.command.clone(),
            timeout_secs: settings.timeout_secs,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: Arc<JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> CollaboratorResult<RenderOutput> {
        let what = format!("render {}", request.pass);
        fs::create_dir_all(request.output_dir)
            .map_err(|e| CollaboratorError::io("creating render directory", e))?;

        // A manifest left by an earlier run must not be mistaken for this one
        let manifest_path = request.output_dir.join(TIMING_MANIFEST);
        if manifest_path.exists() {
            fs::remove_file(&manifest_path)
                .map_err(|e| CollaboratorError::io("removing stale timing manifest", e))?;
        }

        let args = expand_args(
            &self.argv,
            &[
                ("program", request.program.display().to_string()),
                ("output_dir", request.output_dir.display().to_string()),
                ("pass", request.pass.number().to_string()),
            ],
        );
        execute(
            &what,
            &args,
            self.timeout_secs,
            request.cancel,
            self.logger.as_deref(),
        )?;

        let manifest = TimingManifest::load(request.output_dir)?;
        let video = if manifest.video.is_absolute() {
            manifest.video.clone()
        } else {
            request.output_dir.join(&manifest.video)
        };
        if !video.exists() {
            return Err(CollaboratorError::invalid_output(
                &what,
                format!("video {} does not exist", video.display()),
            ));
        }

        let planned_durations = manifest.planned_durations();
        if planned_durations.is_empty() {
            return Err(CollaboratorError::invalid_output(&what, "no segments in timing manifest"));
        }
        if let Some((i, d)) = planned_durations
            .iter()
            .enumerate()
            .find(|(_, d)| !d.is_finite() || **d <= 0.0)
        {
            return Err(CollaboratorError::invalid_output(
                &what,
                format!("segment {} has invalid duration {}", i, d),
            ));
        }

        Ok(RenderOutput {
            video: MediaHandle::new(video),
            planned_durations,
        })
    }
}

/// Synthesizer that runs `[synthesis] command` once per segment.
///
/// Placeholders: `{text_file}` (narration text written to a file next to
/// the output), `{output}`, `{index}`. The clip is measured with the media
/// toolkit afterwards.
pub struct CommandSynthesizer {
    argv: Vec<String>,
    timeout_secs: u64,
    toolkit: Arc<dyn MediaToolkit>,
    logger: Option<Arc<JobLogger>>,
}

impl CommandSynthesizer {
    pub fn new(settings: &SynthesisSettings, toolkit: Arc<dyn MediaToolkit>) -> CollaboratorResult<Self> {
        if settings.command.is_empty() {
            return Err(CollaboratorError::failed(
                "synthesis",
                "synthesis.command is not configured",
            ));
        }
        Ok(Self {
            argv: settings.command.clone(),
            timeout_secs: settings.timeout_secs,
            toolkit,
            logger: None,
        })
    }

    pub fn with_logger(mut self, logger: Arc<JobLogger>) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl Synthesizer for CommandSynthesizer {
    fn synthesize(
        &self,
        segment_index: usize,
        text: &str,
        output: &Path,
        cancel: &CancelHandle,
    ) -> CollaboratorResult<SynthesizedClip> {
        let what = format!("synthesis of segment {}", segment_index);
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CollaboratorError::io("creating narration directory", e))?;
        }

        let text_file = output.with_extension("txt");
        fs::write(&text_file, text)
            .map_err(|e| CollaboratorError::io("writing narration text", e))?;

        let args = expand_args(
            &self.argv,
            &[
                ("text_file", text_file.display().to_string()),
                ("output", output.display().to_string()),
                ("index", segment_index.to_string()),
            ],
        );
        let result = execute(&what, &args, self.timeout_secs, cancel, self.logger.as_deref());
        let _ = fs::remove_file(&text_file);
        result?;

        let media = MediaHandle::new(output);
        if !media.exists() {
            return Err(CollaboratorError::invalid_output(
                &what,
                format!("{} was not created", output.display()),
            ));
        }

        let duration = self.toolkit.probe_duration(&media)?;
        Ok(SynthesizedClip { media, duration })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::RenderPass;
    use crate::orchestrator::parallel::for_each_segment;
    use crate::testing::FakeToolkit;
    use std::time::Instant;
    use tempfile::tempdir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn renderer_reads_timing_manifest() {
        let dir = tempdir().unwrap();
        let program = dir.path().join("program_pass1.py");
        fs::write(&program, "# SEGMENT 1\n").unwrap();
        let out = dir.path().join("render");

        let mut settings = RenderSettings::default();
        settings.command = sh(
            "cd \"$0\" && touch lesson.mp4 && \
             echo '{\"video\": \"lesson.mp4\", \"segments\": [{\"duration\": 3.0}, {\"duration\": 5.0}]}' > timing.json",
        );
        settings.command.push("{output_dir}".to_string());

        let renderer = CommandRenderer::new(&settings).unwrap();
        let cancel = CancelHandle::new();
        let output = renderer
            .render(&RenderRequest {
                pass: RenderPass::First,
                program: &program,
                output_dir: &out,
                cancel: &cancel,
            })
            .unwrap();

        assert_eq!(output.planned_durations, vec![3.0, 5.0]);
        assert_eq!(output.video.path(), out.join("lesson.mp4"));
    }

    #[test]
    fn renderer_failure_and_timeout() {
        let dir = tempdir().unwrap();
        let program = dir.path().join("p.py");
        let cancel = CancelHandle::new();
        let request = RenderRequest {
            pass: RenderPass::Second,
            program: &program,
            output_dir: dir.path(),
            cancel: &cancel,
        };

        let mut settings = RenderSettings::default();
        settings.command = sh("echo 'scene error' >&2; exit 2");
        let err = CommandRenderer::new(&settings).unwrap().render(&request).unwrap_err();
        assert!(err.to_string().contains("scene error"));

        settings.command = sh("sleep 5");
        settings.timeout_secs = 1;
        let err = CommandRenderer::new(&settings).unwrap().render(&request).unwrap_err();
        assert!(matches!(err, CollaboratorError::TimedOut { secs: 1, .. }));
    }

    #[test]
    fn renderer_requires_command() {
        assert!(CommandRenderer::new(&RenderSettings::default()).is_err());
    }

    #[test]
    fn synthesizer_measures_clip() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("narration").join("segment_000.mp3");
        let toolkit = Arc::new(FakeToolkit::new());
        toolkit.set_duration(&output, 2.5);

        let mut settings = SynthesisSettings::default();
        settings.command = sh("cp \"$0\" \"$1\"");
        settings.command.push("{text_file}".to_string());
        settings.command.push("{output}".to_string());

        let synthesizer = CommandSynthesizer::new(&settings, toolkit).unwrap();
        let clip = synthesizer
            .synthesize(0, "Hello there.", &output, &CancelHandle::new())
            .unwrap();

        assert_eq!(clip.duration, 2.5);
        assert_eq!(fs::read_to_string(&output).unwrap(), "Hello there.");
        // Text file is cleaned up
        assert!(!output.with_extension("txt").exists());
    }

    #[test]
    fn synthesizer_missing_output_is_invalid() {
        let dir = tempdir().unwrap();
        let mut settings = SynthesisSettings::default();
        settings.command = sh("true");
        let synthesizer = CommandSynthesizer::new(&settings, Arc::new(FakeToolkit::new())).unwrap();

        let err = synthesizer
            .synthesize(3, "text", &dir.path().join("segment_003.mp3"), &CancelHandle::new())
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidOutput { .. }));
    }

    #[test]
    fn failed_segment_kills_running_siblings() {
        let dir = tempdir().unwrap();
        let mut settings = SynthesisSettings::default();
        settings.command = sh("if [ \"$0\" = 0 ]; then sleep 0.05; exit 1; else sleep 3; fi");
        settings.command.push("{index}".to_string());
        let synthesizer = CommandSynthesizer::new(&settings, Arc::new(FakeToolkit::new())).unwrap();

        let started = Instant::now();
        let results = for_each_segment(2, 2, &CancelHandle::new(), true, |index, cancel| {
            let output = dir.path().join(format!("segment_{:03}.mp3", index));
            synthesizer
                .synthesize(index, "text", &output, cancel)
                .map_err(|e| e.to_string())
        })
        .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(results[0].as_ref().unwrap().is_err());
        // The killed sibling counts as not completed
        assert!(results[1].is_none());
    }

    #[test]
    fn cancelled_job_stops_synthesis_command() {
        let dir = tempdir().unwrap();
        let mut settings = SynthesisSettings::default();
        settings.command = sh("sleep 5");
        let synthesizer = CommandSynthesizer::new(&settings, Arc::new(FakeToolkit::new())).unwrap();

        let cancel = CancelHandle::new();
        cancel.cancel();
        let started = Instant::now();
        let err = synthesizer
            .synthesize(0, "text", &dir.path().join("segment_000.mp3"), &cancel)
            .unwrap_err();

        assert!(matches!(err, CollaboratorError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
