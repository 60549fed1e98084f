//! Synthesize step - speaks every narration segment and measures it.
//!
//! Segments are synthesized concurrently on a bounded worker pool. The
//! first failure stops unstarted segments and cancels running ones; clips
//! that were produced are deleted and the job fails.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::{NarrationClip, Timeline};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::parallel::for_each_segment;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobStage, JobState, StepOutcome};

/// Text sent to the synthesizer for very short narration.
const FILLER_TEXT: &str = "Pause.";

/// Narration shorter than this is replaced with [`FILLER_TEXT`].
const MIN_SPEAKABLE_CHARS: usize = 3;

/// Text actually spoken for a segment.
fn speakable(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_SPEAKABLE_CHARS {
        FILLER_TEXT
    } else {
        trimmed
    }
}

pub struct SynthesizeStep;

impl SynthesizeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SynthesizeStep {
    fn default() -> Self {
        Self::new()
    }
}

fn discard(clips: &[NarrationClip]) {
    for clip in clips {
        let _ = fs::remove_file(clip.media.path());
    }
}

impl PipelineStep for SynthesizeStep {
    fn name(&self) -> &str {
        "Synthesize"
    }

    fn description(&self) -> &str {
        "Synthesize and measure narration clips"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        if ctx.job_spec.narration.is_empty() {
            return Err(StepError::invalid_input("Job has no narration segments"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let narration = &ctx.job_spec.narration;
        let dir = ctx.narration_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| StepError::io_error("creating narration directory", e))?;

        let max_parallel = ctx.settings.synthesis.max_parallel;
        ctx.logger.info(&format!(
            "Synthesizing {} segments ({} at a time)",
            narration.len(),
            max_parallel
        ));

        let finished = AtomicUsize::new(0);
        let results = for_each_segment(
            narration.len(),
            max_parallel,
            ctx.cancel_handle(),
            true,
            |index, cancel| {
                let output = dir.join(format!("segment_{:03}.{}", index, ctx.audio_extension()));
                let text = speakable(&narration[index]);

                let clip = match ctx.synthesizer.synthesize(index, text, &output, cancel) {
                    Ok(clip) => clip,
                    Err(e) => {
                        let _ = fs::remove_file(&output);
                        return Err(e.to_string());
                    }
                };

                if !clip.duration.is_finite() || clip.duration <= 0.0 {
                    let _ = fs::remove_file(clip.media.path());
                    return Err(format!("clip measures {}s", clip.duration));
                }

                ctx.logger
                    .segment(index, &format!("narration {:.3}s", clip.duration));
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.report_progress(
                    "Synthesize",
                    (done * 100 / narration.len()) as u32,
                    &format!("{} of {} clips", done, narration.len()),
                );
                Ok(NarrationClip {
                    text: narration[index].clone(),
                    media: clip.media,
                    duration: clip.duration,
                })
            },
        )?;

        let mut clips = Vec::with_capacity(results.len());
        let mut failure: Option<(usize, String)> = None;
        let mut missing = false;

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Some(Ok(clip)) => clips.push(clip),
                Some(Err(message)) => {
                    if failure.is_none() {
                        failure = Some((index, message));
                    }
                }
                None => missing = true,
            }
        }

        if let Some((index, message)) = failure {
            ctx.logger.error(&format!(
                "Segment {} synthesis failed: {}; discarding {} finished clips",
                index,
                message,
                clips.len()
            ));
            discard(&clips);
            return Err(StepError::synthesis_failed(index, message));
        }
        if missing {
            discard(&clips);
            return Err(StepError::Cancelled);
        }

        let total: f64 = clips.iter().map(|c| c.duration).sum();
        ctx.logger
            .info(&format!("Narration total: {:.3}s", total));

        let timeline = Timeline::from_parts(&state.planned_durations, clips)?;
        state.timeline = Some(timeline);
        state.advance(JobStage::AudioSynthesized)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let timeline = state.require_timeline()?;
        if timeline.len() != ctx.job_spec.segment_count() {
            return Err(StepError::invalid_output(format!(
                "Timeline has {} segments, expected {}",
                timeline.len(),
                ctx.job_spec.segment_count()
            )));
        }
        Ok(())
    }
}
