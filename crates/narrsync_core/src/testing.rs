//! In-memory collaborators and job fixtures for unit tests.
//!
//! The fakes write empty placeholder files so path checks behave like a
//! real run, and track clip durations in a shared table instead of
//! decoding media.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::collaborators::{
    CollaboratorError, CollaboratorResult, RenderOutput, RenderRequest, Renderer,
    SynthesizedClip, Synthesizer,
};
use crate::config::Settings;
use crate::logging::{JobLogger, LogConfig};
use crate::media::{MediaError, MediaResult, MediaToolkit};
use crate::models::{JobSpec, MediaHandle, NarrationClip, RenderArtifact, RenderPass, Timeline};
use crate::orchestrator::{CancelHandle, Collaborators, Context, JobRunner, JobStage, JobState};
use crate::script::ScriptDialect;

fn touch(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MediaError::io("creating directory", e))?;
    }
    fs::write(path, b"").map_err(|e| MediaError::io("writing placeholder", e))
}

#[derive(Default)]
struct ToolkitState {
    durations: HashMap<PathBuf, f64>,
    fail_silence: bool,
    fail_mux: bool,
    concat_calls: Vec<Vec<MediaHandle>>,
    mux_calls: Vec<(MediaHandle, MediaHandle)>,
}

/// Media toolkit that records calls and sums durations.
#[derive(Default)]
pub(crate) struct FakeToolkit {
    state: Mutex<ToolkitState>,
}

impl FakeToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty clip file with a known duration.
    pub fn add_clip(&self, path: impl Into<PathBuf>, duration: f64) -> MediaHandle {
        let path = path.into();
        touch(&path).expect("create clip");
        self.set_duration(&path, duration);
        MediaHandle::new(path)
    }

    pub fn set_duration(&self, path: &Path, duration: f64) {
        self.state.lock().durations.insert(path.to_path_buf(), duration);
    }

    /// Make every later silence request fail.
    pub fn fail_silence(&self) {
        self.state.lock().fail_silence = true;
    }

    /// Make every later mux leave a partial file behind and fail.
    pub fn fail_mux(&self) {
        self.state.lock().fail_mux = true;
    }

    pub fn concat_calls(&self) -> Vec<Vec<MediaHandle>> {
        self.state.lock().concat_calls.clone()
    }

    pub fn mux_calls(&self) -> Vec<(MediaHandle, MediaHandle)> {
        self.state.lock().mux_calls.clone()
    }
}

impl MediaToolkit for FakeToolkit {
    fn generate_silence(&self, seconds: f64, output: &Path) -> MediaResult<MediaHandle> {
        if self.state.lock().fail_silence {
            return Err(MediaError::command_failed("ffmpeg", 1, "anullsrc unavailable"));
        }
        touch(output)?;
        self.set_duration(output, seconds);
        Ok(MediaHandle::new(output))
    }

    fn concatenate(&self, inputs: &[MediaHandle], output: &Path) -> MediaResult<MediaHandle> {
        let mut state = self.state.lock();
        let mut total = 0.0;
        for input in inputs {
            total += state
                .durations
                .get(input.path())
                .copied()
                .ok_or_else(|| MediaError::NotFound(input.path().to_path_buf()))?;
        }
        touch(output)?;
        state.durations.insert(output.to_path_buf(), total);
        state.concat_calls.push(inputs.to_vec());
        Ok(MediaHandle::new(output))
    }

    fn probe_duration(&self, media: &MediaHandle) -> MediaResult<f64> {
        self.state
            .lock()
            .durations
            .get(media.path())
            .copied()
            .ok_or_else(|| MediaError::NotFound(media.path().to_path_buf()))
    }

    fn mux(&self, video: &MediaHandle, audio: &MediaHandle, output: &Path) -> MediaResult<MediaHandle> {
        touch(output)?;
        if self.state.lock().fail_mux {
            return Err(MediaError::command_failed("ffmpeg", 1, "muxer aborted"));
        }
        self.state
            .lock()
            .mux_calls
            .push((video.clone(), audio.clone()));
        Ok(MediaHandle::new(output))
    }
}

/// Renderer that reports fixed planned durations plus any inserted holds.
pub(crate) struct FakeRenderer {
    planned: Vec<f64>,
    toolkit: Arc<FakeToolkit>,
    failing: Mutex<Vec<RenderPass>>,
    calls: Mutex<Vec<RenderPass>>,
}

impl FakeRenderer {
    pub fn new(planned: &[f64], toolkit: Arc<FakeToolkit>) -> Self {
        Self {
            planned: planned.to_vec(),
            toolkit,
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn planned(&self) -> &[f64] {
        &self.planned
    }

    pub fn fail_on(&self, pass: RenderPass) {
        self.failing.lock().push(pass);
    }

    pub fn calls(&self) -> Vec<RenderPass> {
        self.calls.lock().clone()
    }

    /// Add the seconds of every tagged hold to the segment it sits in.
    fn with_holds(&self, program: &str) -> Vec<f64> {
        let dialect = ScriptDialect::default();
        let mut durations = self.planned.clone();
        let mut current: Option<usize> = None;
        for line in program.lines() {
            if dialect.is_marker(line) {
                current = Some(current.map_or(0, |i| i + 1));
                continue;
            }
            if !dialect.is_hold(line) {
                continue;
            }
            let seconds = line
                .split_once('(')
                .and_then(|(_, rest)| rest.split_once(')'))
                .and_then(|(value, _)| value.trim().parse::<f64>().ok());
            if let (Some(index), Some(seconds)) = (current, seconds) {
                if let Some(duration) = durations.get_mut(index) {
                    *duration += seconds;
                }
            }
        }
        durations
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> CollaboratorResult<RenderOutput> {
        self.calls.lock().push(request.pass);
        if self.failing.lock().contains(&request.pass) {
            return Err(CollaboratorError::failed("renderer", "scene raised an exception"));
        }

        let planned_durations = match request.pass {
            RenderPass::First => self.planned.clone(),
            RenderPass::Second => {
                let program = fs::read_to_string(request.program)
                    .map_err(|e| CollaboratorError::io("reading program", e))?;
                self.with_holds(&program)
            }
        };

        let video = request.output_dir.join("video.mp4");
        let handle = self.toolkit.add_clip(&video, planned_durations.iter().sum());
        Ok(RenderOutput {
            video: handle,
            planned_durations,
        })
    }
}

/// Synthesizer that produces clips of preset durations.
pub(crate) struct FakeSynthesizer {
    durations: Vec<f64>,
    toolkit: Arc<FakeToolkit>,
    failing: Mutex<Vec<usize>>,
    calls: Mutex<Vec<usize>>,
}

impl FakeSynthesizer {
    pub fn new(durations: &[f64], toolkit: Arc<FakeToolkit>) -> Self {
        Self {
            durations: durations.to_vec(),
            toolkit,
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_on(&self, segment_index: usize) {
        self.failing.lock().push(segment_index);
    }

    pub fn calls(&self) -> Vec<usize> {
        let mut calls = self.calls.lock().clone();
        calls.sort_unstable();
        calls
    }
}

impl Synthesizer for FakeSynthesizer {
    fn synthesize(
        &self,
        segment_index: usize,
        _text: &str,
        output: &Path,
        _cancel: &CancelHandle,
    ) -> CollaboratorResult<SynthesizedClip> {
        self.calls.lock().push(segment_index);
        if self.failing.lock().contains(&segment_index) {
            return Err(CollaboratorError::failed("synthesizer", "voice unavailable"));
        }
        let duration = self.durations.get(segment_index).copied().ok_or_else(|| {
            CollaboratorError::invalid_output("synthesizer", "no duration configured")
        })?;
        let media = self.toolkit.add_clip(output, duration);
        Ok(SynthesizedClip { media, duration })
    }
}

fn lesson_program(segments: usize) -> String {
    let mut program = String::from("from manim import *\n\nclass Lesson(Scene):\n    def construct(self):\n");
    for i in 0..segments {
        program.push_str(&format!("        # SEGMENT {}\n", i + 1));
        program.push_str(&format!(
            "        self.play(Write(Text(\"Part {}\")))\n",
            i + 1
        ));
    }
    program
}

/// A job wired to fakes, with every path inside a temp directory.
pub(crate) struct Fixture {
    pub dir: TempDir,
    pub toolkit: Arc<FakeToolkit>,
    pub renderer: Arc<FakeRenderer>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub job: JobSpec,
    pub settings: Settings,
}

impl Fixture {
    /// `planned` are pass 1 segment durations, `actual` the clip durations.
    pub fn new(planned: &[f64], actual: &[f64]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let toolkit = Arc::new(FakeToolkit::new());
        let renderer = Arc::new(FakeRenderer::new(planned, Arc::clone(&toolkit)));
        let synthesizer = Arc::new(FakeSynthesizer::new(actual, Arc::clone(&toolkit)));

        let narration = (0..planned.len())
            .map(|i| format!("This is the narration for part {}.", i + 1))
            .collect();
        let job = JobSpec::new("lesson", lesson_program(planned.len()), narration);

        let mut settings = Settings::default();
        settings.paths.work_root = dir.path().join("work").to_string_lossy().to_string();
        settings.paths.output_folder = dir.path().join("out").to_string_lossy().to_string();
        settings.paths.logs_folder = dir.path().join("logs").to_string_lossy().to_string();
        // Structural checks only; no Python needed
        settings.script.validator_command.clear();

        Self {
            dir,
            toolkit,
            renderer,
            synthesizer,
            job,
            settings,
        }
    }

    /// Replace the visual program.
    pub fn with_program(mut self, program: &str) -> Self {
        self.job.program = program.to_string();
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            toolkit: self.toolkit.clone(),
            renderer: self.renderer.clone(),
            synthesizer: self.synthesizer.clone(),
        }
    }

    pub fn context(&self) -> Context {
        let work_dir = self.dir.path().join("work").join("job");
        fs::create_dir_all(&work_dir).expect("create work dir");
        let logger = JobLogger::new(
            &self.job.name,
            self.dir.path().join("logs"),
            LogConfig::from(&self.settings.logging),
            None,
        )
        .expect("create logger");

        Context::new(
            self.job.clone(),
            self.settings.clone(),
            self.job.name.clone(),
            work_dir,
            self.dir.path().join("out"),
            Arc::new(logger),
            self.collaborators(),
        )
    }

    /// State right after synthesis, with a pass 1 video on record.
    pub fn synthesized_state(&self) -> JobState {
        let planned = self.renderer.planned().to_vec();
        let mut state = JobState::new("job");

        let video = self
            .toolkit
            .add_clip(self.dir.path().join("render").join("video.mp4"), planned.iter().sum());
        state.pass1 = Some(RenderArtifact::new(
            video,
            planned.iter().sum(),
            RenderPass::First,
        ));

        let clips = self
            .job
            .narration
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let duration = self.synthesizer.durations[i];
                NarrationClip {
                    text: text.clone(),
                    media: self.toolkit.add_clip(
                        self.dir.path().join("narration").join(format!("segment_{:03}.mp3", i)),
                        duration,
                    ),
                    duration,
                }
            })
            .collect();

        state.timeline = Some(Timeline::from_parts(&planned, clips).expect("timeline"));
        state.planned_durations = planned;
        state.stage = JobStage::AudioSynthesized;
        state
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(self.settings.clone(), self.collaborators())
    }

    pub fn work_root_is_empty(&self) -> bool {
        fs::read_dir(self.dir.path().join("work"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}
