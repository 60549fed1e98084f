//! Per-job log file with an optional line callback.
//!
//! The logger is shared by the segment workers during synthesis and
//! padding, so every piece of mutable state sits behind a `parking_lot`
//! mutex. Warnings and errors are mirrored to `tracing` as well.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineStyle, LogCallback, LogConfig, LogLevel};

/// Last lines printed by external tools (ffmpeg, renderer, synthesizer).
#[derive(Debug, Default)]
struct ToolTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl ToolTail {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn take(&mut self) -> Vec<String> {
        self.lines.drain(..).collect()
    }
}

/// Log of one job.
///
/// Lines go to `<logs>/<job>.log` (appended, one header per run) and to the
/// callback when one is set.
pub struct JobLogger {
    job_name: String,
    log_path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    callback: Option<LogCallback>,
    config: LogConfig,
    tail: Mutex<ToolTail>,
    /// Step and percentage of the last progress line written.
    last_progress: Mutex<Option<(String, u32)>>,
}

impl JobLogger {
    /// Open the log for `job_name` in `log_dir`, creating the directory.
    pub fn new(
        job_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let job_name = job_name.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_name)));
        let mut writer = BufWriter::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?,
        );
        writeln!(
            writer,
            "##### narrsync job '{}' started {} #####",
            job_name,
            Local::now().to_rfc3339()
        )?;

        Ok(Self {
            job_name,
            log_path,
            writer: Mutex::new(Some(writer)),
            callback,
            tail: Mutex::new(ToolTail::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(None),
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn info(&self, message: &str) {
        self.write(LogLevel::Info, LineStyle::Plain, message);
    }

    pub fn debug(&self, message: &str) {
        self.write(LogLevel::Debug, LineStyle::Plain, message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(job = %self.job_name, "{}", message);
        self.write(LogLevel::Warn, LineStyle::Warning, message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(job = %self.job_name, "{}", message);
        self.write(LogLevel::Error, LineStyle::Error, message);
    }

    pub fn success(&self, message: &str) {
        self.write(LogLevel::Info, LineStyle::Success, message);
    }

    /// Start of a pipeline step.
    pub fn phase(&self, step: &str) {
        self.write(LogLevel::Info, LineStyle::Phase, step);
    }

    /// Detail about one segment (debug level).
    pub fn segment(&self, index: usize, message: &str) {
        self.write(LogLevel::Debug, LineStyle::Segment(index), message);
    }

    /// External command about to run. Also resets the tool output tail.
    pub fn command(&self, command_line: &str) {
        self.tail.lock().take();
        if self.config.show_commands {
            self.write(LogLevel::Info, LineStyle::Command, command_line);
        }
    }

    /// Progress of a step. In compact mode a line is written only when the
    /// step changes or the percentage crosses a `progress_step` boundary.
    ///
    /// Returns whether a line was written.
    pub fn progress(&self, step: &str, percent: u32) -> bool {
        {
            let mut last = self.last_progress.lock();
            if self.config.compact {
                let bucket = percent / self.config.progress_step.max(1);
                if let Some((last_step, last_percent)) = last.as_ref() {
                    let same_bucket = *last_percent / self.config.progress_step.max(1) == bucket;
                    if last_step == step && same_bucket && percent < 100 {
                        return false;
                    }
                }
            }
            *last = Some((step.to_string(), percent));
        }
        self.write(
            LogLevel::Info,
            LineStyle::Plain,
            &format!("{}: {}%", step, percent),
        );
        true
    }

    /// One output line of an external tool. Kept for [`dump_tool_output`]
    /// and written straight away unless the logger is compact.
    ///
    /// [`dump_tool_output`]: JobLogger::dump_tool_output
    pub fn tool_output(&self, line: &str, is_stderr: bool) {
        self.tail.lock().push(line);
        if !self.config.compact {
            let line = if is_stderr {
                format!("  ! {}", line)
            } else {
                format!("  | {}", line)
            };
            self.write(LogLevel::Debug, LineStyle::Plain, &line);
        }
    }

    /// Write the buffered tool output, typically after the tool failed.
    pub fn dump_tool_output(&self, tool: &str) {
        let lines = self.tail.lock().take();
        if lines.is_empty() {
            return;
        }
        self.emit(&format!("last {} lines from {}:", lines.len(), tool));
        for line in &lines {
            self.emit(&format!("  {}", line));
        }
    }

    pub fn flush(&self) {
        if let Some(writer) = self.writer.lock().as_mut() {
            let _ = writer.flush();
        }
    }

    /// Flush and close the file. Later lines only reach the callback.
    pub fn close(&self) {
        if let Some(mut writer) = self.writer.lock().take() {
            let _ = writer.flush();
        }
    }

    fn write(&self, level: LogLevel, style: LineStyle, message: &str) {
        if level < self.config.level {
            return;
        }
        self.emit(&style.apply(message));
    }

    fn emit(&self, line: &str) {
        let line = if self.config.timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), line)
        } else {
            line.to_string()
        };

        if let Some(writer) = self.writer.lock().as_mut() {
            let _ = writeln!(writer, "{}", line);
        }
        if let Some(callback) = &self.callback {
            callback(&line);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Replace characters that are not allowed in file names.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn quiet() -> LogConfig {
        LogConfig {
            timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn appends_runs_to_one_file() {
        let dir = tempdir().unwrap();
        for _ in 0..2 {
            let logger = JobLogger::new("lesson", dir.path(), quiet(), None).unwrap();
            logger.phase("Reconcile");
            logger.warn("Segment 2: padding failed");
        }

        let content = fs::read_to_string(dir.path().join("lesson.log")).unwrap();
        assert_eq!(content.matches("##### narrsync job 'lesson'").count(), 2);
        assert!(content.contains("=== Reconcile ==="));
        assert!(content.contains("[WARNING] Segment 2: padding failed"));
    }

    #[test]
    fn callback_respects_level() {
        let dir = tempdir().unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);

        let logger = JobLogger::new(
            "lesson",
            dir.path(),
            quiet(),
            Some(Box::new(move |_line: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        logger.info("Message 1");
        logger.segment(1, "debug detail");
        logger.success("done");

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn commands_can_be_hidden() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            show_commands: false,
            ..quiet()
        };
        let logger = JobLogger::new("lesson", dir.path(), config, None).unwrap();

        logger.command("ffmpeg -y out.mp3");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(!content.contains("ffmpeg"));
    }

    #[test]
    fn compact_progress_is_thinned_per_step() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: true,
            progress_step: 20,
            ..quiet()
        };
        let logger = JobLogger::new("lesson", dir.path(), config, None).unwrap();

        assert!(logger.progress("Synthesize", 5));
        assert!(!logger.progress("Synthesize", 15));
        assert!(logger.progress("Synthesize", 20));
        assert!(!logger.progress("Synthesize", 25));
        assert!(logger.progress("Pad", 25));
        assert!(logger.progress("Pad", 100));
    }

    #[test]
    fn tool_output_is_dumped_once() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: true,
            error_tail: 3,
            ..quiet()
        };
        let logger = JobLogger::new("lesson", dir.path(), config, None).unwrap();

        logger.command("renderer scene.py");
        for i in 0..10 {
            logger.tool_output(&format!("frame {}", i), false);
        }
        logger.dump_tool_output("renderer");
        logger.dump_tool_output("renderer");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert_eq!(content.matches("last 3 lines from renderer").count(), 1);
        assert!(content.contains("frame 7"));
        assert!(!content.contains("frame 6"));
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("lesson_01"), "lesson_01");
        assert_eq!(sanitize_filename("intro/part:2"), "intro_part_2");
        assert_eq!(sanitize_filename("  "), "job");
    }
}
