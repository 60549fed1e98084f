//! Logging for narrsync.
//!
//! Two layers work side by side:
//! - `tracing` events from library internals, installed once per process
//!   with [`init_tracing`]
//! - a [`JobLogger`] per job, writing the job's log file and echoing lines
//!   to an optional callback
//!
//! ```no_run
//! use narrsync_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("lesson_01", "/path/to/logs", LogConfig::default(), None).unwrap();
//! logger.phase("Render");
//! logger.command("manim render lesson_01.py");
//! logger.progress("Synthesize", 40);
//! logger.segment(2, "padded +0.760s");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub(crate) use job_logger::sanitize_filename;
pub use types::{LineStyle, LogCallback, LogConfig, LogLevel};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_filter()))
}

/// Install the process-wide subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], and also append events to a daily file
/// (`narrsync.log.YYYY-MM-DD`) in `dir`.
///
/// Events are written on a background thread; keep the returned guard
/// alive until exit so they are flushed.
pub fn init_tracing_with_file(default_level: LogLevel, dir: impl AsRef<Path>) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(dir.as_ref(), "narrsync.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(env_filter(default_level))
        .init();
    guard
}

/// Subscriber for tests; only warnings and errors, captured per test.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
