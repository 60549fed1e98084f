//! Mux step - combines the final video with the narration track.
//!
//! The video stream is copied and the narration track is added as the
//! only audio stream; nothing is mixed or trimmed. Subtitles and the
//! adjustment report are written next to the result.

use std::fs;
use std::path::PathBuf;

use crate::logging::sanitize_filename;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobStage, JobState, MuxOutput, StepOutcome};
use crate::report::AdjustmentReport;
use crate::subtitles::write_subtitle_file;

pub struct MuxStep;

impl MuxStep {
    pub fn new() -> Self {
        Self
    }

    fn output_stem(ctx: &Context) -> String {
        sanitize_filename(&ctx.job_name)
    }
}

impl Default for MuxStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for MuxStep {
    fn name(&self) -> &str {
        "Mux"
    }

    fn description(&self) -> &str {
        "Mux video and narration into the final file"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let video = state
            .final_artifact()
            .ok_or_else(|| StepError::precondition_failed("no rendered video"))?;
        let track = state
            .narration_track
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("no narration track"))?;
        let timeline = state.require_timeline()?;

        fs::create_dir_all(&ctx.output_dir)
            .map_err(|e| StepError::io_error("creating output directory", e))?;

        let stem = Self::output_stem(ctx);
        let extension = video
            .media
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let output_path = ctx.output_dir.join(format!("{}.{}", stem, extension));

        ctx.logger.info(&format!(
            "Muxing {} video with {:.3}s narration",
            video.pass, track.total_duration
        ));
        // Keep the narration track; the work dir may be removed
        let narration_path = ctx.output_dir.join(format!(
            "{}_narration.{}",
            stem,
            ctx.audio_extension()
        ));
        let muxed = ctx
            .toolkit
            .mux(&video.media, &track.media, &output_path)
            .map_err(StepError::from)
            .and_then(|_| {
                fs::copy(track.media.path(), &narration_path)
                    .map_err(|e| StepError::io_error("copying narration track", e))
            });
        if let Err(e) = muxed {
            // No half-finished results in the output directory
            for path in [&output_path, &narration_path] {
                if path.exists() {
                    let _ = fs::remove_file(path);
                }
            }
            return Err(e);
        }

        let subtitles = match write_subtitle_file(
            timeline,
            ctx.settings.output.subtitles,
            &output_path,
        ) {
            Ok(path) => path,
            Err(e) => {
                ctx.logger.warn(&format!("Failed to write subtitles: {}", e));
                None
            }
        };

        let report = AdjustmentReport::from_adjustments(
            &ctx.job_name,
            ctx.tolerance(),
            &state.adjustments,
            state.warnings.clone(),
            state.pass2.is_some(),
        );

        let mut report_path = None;
        if ctx.settings.output.write_report {
            let path = ctx.output_dir.join(format!("{}.report.json", stem));
            match report.write_json(&path) {
                Ok(()) => report_path = Some(path),
                Err(e) => ctx.logger.warn(&format!("Failed to write report: {}", e)),
            }
        }

        if report.is_degraded() {
            ctx.logger.warn(&format!(
                "Partially synchronized: segments {:?} keep a mismatch",
                report.affected_segments()
            ));
        }
        ctx.logger
            .info(&format!("Output: {}", output_path.display()));

        state.mux = Some(MuxOutput {
            output_path,
            narration: narration_path,
            subtitles,
            report: report_path,
        });
        state.report = Some(report);
        state.advance(JobStage::Done)?;
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let output: &PathBuf = state
            .mux
            .as_ref()
            .map(|m| &m.output_path)
            .ok_or_else(|| StepError::invalid_output("Mux output not recorded"))?;
        if !output.exists() {
            return Err(StepError::file_not_found(output.display().to_string()));
        }
        Ok(())
    }
}
