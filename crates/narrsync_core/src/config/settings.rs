//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::SubtitleFormat;
use crate::reconcile::DEFAULT_TOLERANCE_SECS;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Reconciliation settings.
    #[serde(default)]
    pub reconcile: ReconcileSettings,

    /// Media toolkit settings.
    #[serde(default)]
    pub media: MediaSettings,

    /// Visual program rewriting.
    #[serde(default)]
    pub script: ScriptSettings,

    /// Render command adapter.
    #[serde(default)]
    pub render: RenderSettings,

    /// Speech synthesis command adapter.
    #[serde(default)]
    pub synthesis: SynthesisSettings,

    /// Final output options.
    #[serde(default)]
    pub output: OutputSettings,
}

impl Settings {
    /// Check values serde cannot constrain.
    pub fn validate(&self) -> Result<(), String> {
        let tolerance = self.reconcile.tolerance_secs;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(format!(
                "reconcile.tolerance_secs must be a non-negative number (got {})",
                tolerance
            ));
        }
        if self.synthesis.max_parallel == 0 {
            return Err("synthesis.max_parallel must be at least 1".to_string());
        }
        if !self.script.hold_template.contains("{seconds}") {
            return Err("script.hold_template must contain {seconds}".to_string());
        }
        if self.script.marker_prefix.trim().is_empty() {
            return Err("script.marker_prefix must not be empty".to_string());
        }
        if self.script.hold_tag.trim().is_empty() {
            return Err("script.hold_tag must not be empty".to_string());
        }
        Ok(())
    }
}

/// Path configuration for work, output, and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder for per-job working directories.
    #[serde(default = "default_work_root")]
    pub work_root: String,

    /// Output folder for final videos, subtitles and reports.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Keep the job working directory after a successful run.
    #[serde(default)]
    pub keep_temp: bool,
}

fn default_work_root() -> String {
    ".narrsync/work".to_string()
}

fn default_output_folder() -> String {
    "narrsync_output".to_string()
}

fn default_logs_folder() -> String {
    ".narrsync/logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            output_folder: default_output_folder(),
            logs_folder: default_logs_folder(),
            keep_temp: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of tool output lines to show on failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Log every external command line.
    #[serde(default = "default_true")]
    pub show_commands: bool,

    /// Minimum level written to the job log.
    #[serde(default)]
    pub level: LogLevel,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_commands: true,
            level: LogLevel::default(),
        }
    }
}

/// Duration reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Mismatches up to this many seconds are left alone.
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: f64,

    /// Probe padded clips and warn when they drift from the target.
    #[serde(default)]
    pub verify_padding: bool,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_SECS
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance(),
            verify_padding: false,
        }
    }
}

/// ffmpeg toolkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    /// Encoder for narration clips, silence and the assembled track.
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// File extension matching `audio_codec`.
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_channel_layout")]
    pub channel_layout: String,

    /// Audio encoder used when muxing the final video.
    #[serde(default = "default_mux_audio_codec")]
    pub mux_audio_codec: String,
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_audio_codec() -> String {
    "libmp3lame".to_string()
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channel_layout() -> String {
    "stereo".to_string()
}

fn default_mux_audio_codec() -> String {
    "aac".to_string()
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            audio_codec: default_audio_codec(),
            audio_extension: default_audio_extension(),
            sample_rate: default_sample_rate(),
            channel_layout: default_channel_layout(),
            mux_audio_codec: default_mux_audio_codec(),
        }
    }
}

/// Visual program rewriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptSettings {
    /// Line prefix marking the start of a segment.
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,

    /// Hold instruction; `{seconds}` is replaced with the amount.
    #[serde(default = "default_hold_template")]
    pub hold_template: String,

    /// Comment tag appended to inserted holds.
    #[serde(default = "default_hold_tag")]
    pub hold_tag: String,

    /// Extension used when writing program files.
    #[serde(default = "default_program_extension")]
    pub program_extension: String,

    /// External check for the rewritten program, run after the structural
    /// check. `{path}` is replaced with the candidate file. Empty =
    /// structural check only.
    #[serde(default = "default_validator_command")]
    pub validator_command: Vec<String>,
}

fn default_marker_prefix() -> String {
    "# SEGMENT".to_string()
}

fn default_hold_template() -> String {
    "self.wait({seconds})".to_string()
}

fn default_hold_tag() -> String {
    "narrsync: hold".to_string()
}

fn default_program_extension() -> String {
    "py".to_string()
}

fn default_validator_command() -> Vec<String> {
    ["python3", "-m", "py_compile", "{path}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            marker_prefix: default_marker_prefix(),
            hold_template: default_hold_template(),
            hold_tag: default_hold_tag(),
            program_extension: default_program_extension(),
            validator_command: default_validator_command(),
        }
    }
}

/// Render command adapter.
///
/// Placeholders: `{program}`, `{output_dir}`, `{pass}`. The command must
/// leave a `timing.json` manifest in `{output_dir}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub command: Vec<String>,

    /// Kill the renderer after this many seconds (0 = no limit).
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

fn default_render_timeout() -> u64 {
    1800
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_render_timeout(),
        }
    }
}

/// Speech synthesis command adapter.
///
/// Placeholders: `{text_file}`, `{output}`, `{index}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSettings {
    #[serde(default)]
    pub command: Vec<String>,

    /// Kill a synthesis call after this many seconds (0 = no limit).
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,

    /// Segments synthesized (and padded) at the same time.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_synthesis_timeout() -> u64 {
    120
}

fn default_max_parallel() -> usize {
    4
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: default_synthesis_timeout(),
            max_parallel: default_max_parallel(),
        }
    }
}

/// Final output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Subtitle file written next to the final video.
    #[serde(default)]
    pub subtitles: SubtitleFormat,

    /// Write `<job>.report.json` next to the final video.
    #[serde(default = "default_true")]
    pub write_report: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            subtitles: SubtitleFormat::default(),
            write_report: true,
        }
    }
}

/// Configuration sections for atomic updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Reconcile,
    Media,
    Script,
    Render,
    Synthesis,
    Output,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 8] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Reconcile,
        ConfigSection::Media,
        ConfigSection::Script,
        ConfigSection::Render,
        ConfigSection::Synthesis,
        ConfigSection::Output,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Reconcile => "reconcile",
            ConfigSection::Media => "media",
            ConfigSection::Script => "script",
            ConfigSection::Render => "render",
            ConfigSection::Synthesis => "synthesis",
            ConfigSection::Output => "output",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Working, output and log directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Reconcile => "Duration reconciliation",
            ConfigSection::Media => "ffmpeg toolkit",
            ConfigSection::Script => "Visual program rewriting (hold instructions)",
            ConfigSection::Render => {
                "Render command: {program} {output_dir} {pass}; must write timing.json"
            }
            ConfigSection::Synthesis => "Speech synthesis command: {text_file} {output} {index}",
            ConfigSection::Output => "Final output",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[reconcile]"));
        assert!(toml.contains("tolerance_secs = 0.1"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[reconcile]\ntolerance_secs = 0.25";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.reconcile.tolerance_secs, 0.25);
        assert!(!parsed.reconcile.verify_padding);
        assert_eq!(parsed.synthesis.max_parallel, 4);
        assert_eq!(parsed.script.marker_prefix, "# SEGMENT");
        assert_eq!(parsed.output.subtitles, SubtitleFormat::Srt);
        assert_eq!(
            parsed.script.validator_command,
            vec!["python3", "-m", "py_compile", "{path}"]
        );
    }

    #[test]
    fn compile_check_can_be_turned_off() {
        let parsed: Settings = toml::from_str("[script]\nvalidator_command = []").unwrap();
        assert!(parsed.script.validator_command.is_empty());
    }

    #[test]
    fn parses_commands_and_enums() {
        let content = r#"
[render]
command = ["render.sh", "{program}", "{output_dir}"]

[output]
subtitles = "vtt"

[logging]
level = "debug"
"#;
        let parsed: Settings = toml::from_str(content).unwrap();
        assert_eq!(parsed.render.command.len(), 3);
        assert_eq!(parsed.output.subtitles, SubtitleFormat::Vtt);
        assert_eq!(parsed.logging.level, LogLevel::Debug);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.reconcile.tolerance_secs = -0.1;
        assert!(settings.validate().is_err());

        settings.reconcile.tolerance_secs = 0.1;
        settings.synthesis.max_parallel = 0;
        assert!(settings.validate().is_err());

        settings.synthesis.max_parallel = 2;
        settings.script.hold_template = "self.wait()".to_string();
        assert!(settings.validate().is_err());
    }
}
