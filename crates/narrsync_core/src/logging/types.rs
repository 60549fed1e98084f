//! Logging types and configuration.

use serde::{Deserialize, Serialize};

use crate::config::LoggingSettings;

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Runtime configuration of a [`JobLogger`](super::JobLogger).
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level written.
    pub level: LogLevel,
    /// Keep external tool output out of the log unless a tool fails, and
    /// thin out progress lines.
    pub compact: bool,
    /// Progress is logged at most once per this many percent.
    pub progress_step: u32,
    /// Tool output lines kept for failure diagnosis.
    pub error_tail: usize,
    /// Log every external command line.
    pub show_commands: bool,
    /// Prefix lines with the wall clock time.
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingSettings::default())
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level,
            compact: settings.compact,
            progress_step: settings.progress_step.max(1),
            error_tail: settings.error_tail as usize,
            show_commands: settings.show_commands,
            timestamps: true,
        }
    }
}

/// Callback receiving every formatted log line (e.g. to echo job logs to
/// a terminal).
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Decoration applied to a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    /// `$ ffmpeg ...`
    Command,
    /// `=== Render ===`
    Phase,
    /// `[segment 003] ...`
    Segment(usize),
    Success,
    Warning,
    Error,
}

impl LineStyle {
    pub fn apply(&self, message: &str) -> String {
        match self {
            LineStyle::Plain => message.to_string(),
            LineStyle::Command => format!("$ {}", message),
            LineStyle::Phase => format!("=== {} ===", message),
            LineStyle::Segment(index) => format!("[segment {:03}] {}", index, message),
            LineStyle::Success => format!("[OK] {}", message),
            LineStyle::Warning => format!("[WARNING] {}", message),
            LineStyle::Error => format!("[ERROR] {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settings() {
        let mut settings = LoggingSettings::default();
        settings.progress_step = 0;
        settings.error_tail = 7;
        let config = LogConfig::from(&settings);
        assert_eq!(config.progress_step, 1);
        assert_eq!(config.error_tail, 7);
    }

    #[test]
    fn styles_decorate_lines() {
        assert_eq!(LineStyle::Phase.apply("Reconcile"), "=== Reconcile ===");
        assert_eq!(LineStyle::Segment(2).apply("padded"), "[segment 002] padded");
        assert_eq!(LineStyle::Warning.apply("x"), "[WARNING] x");
    }

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_filter(), "warn");
    }
}
