//! narrsync: command line front end for the two-pass narration sync engine.
//!
//! ## Usage
//!
//! ```bash
//! narrsync init-config                                  # Write default settings
//! narrsync reconcile --planned 3,5,7 --actual 5,4,6     # Plan adjustments only
//! narrsync run --program lesson.py --narration lines.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};

use narrsync_core::collaborators::{CommandRenderer, CommandSynthesizer};
use narrsync_core::config::{ConfigManager, ConfigSection, Settings};
use narrsync_core::logging::{init_tracing, init_tracing_with_file, LogLevel};
use narrsync_core::media::{FfmpegToolkit, MediaToolkit};
use narrsync_core::models::JobSpec;
use narrsync_core::orchestrator::{Collaborators, JobRunner};
use narrsync_core::reconcile::{reconcile, DurationPair, ReconcileDecision};
use narrsync_core::report::AdjustmentReport;

const DEFAULT_CONFIG: &str = "narrsync.toml";

#[derive(Parser, Debug)]
#[command(name = "narrsync", version, about = "Synchronize rendered animation with narration")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write diagnostics to a daily log file in this directory
    #[arg(long, env = "NARRSYNC_TRACE_DIR", global = true)]
    trace_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a settings file with every default filled in
    InitConfig {
        #[arg(long, env = "NARRSYNC_CONFIG", default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Store this reconcile tolerance in the file
        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Classify planned/actual duration pairs and print the report
    Reconcile {
        /// Planned segment durations, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        planned: Vec<f64>,

        /// Narration durations, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        actual: Vec<f64>,

        #[arg(long)]
        tolerance: Option<f64>,
    },

    /// Run a full two-pass job
    Run {
        /// Visual program source
        #[arg(long)]
        program: PathBuf,

        /// JSON array with the narration text of every segment
        #[arg(long)]
        narration: PathBuf,

        /// Job name (defaults to the program file stem)
        #[arg(long)]
        name: Option<String>,

        #[arg(long, env = "NARRSYNC_CONFIG", default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Override the reconcile tolerance in seconds
        #[arg(long)]
        tolerance: Option<f64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let _guard = match &cli.trace_dir {
        Some(dir) => Some(init_tracing_with_file(level, dir)),
        None => {
            init_tracing(level);
            None
        }
    };

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::InitConfig { config, tolerance } => {
            let mut manager = load_config(&config)?;
            if let Some(tolerance) = tolerance {
                manager.settings_mut().reconcile.tolerance_secs = tolerance;
                manager.settings().validate().map_err(anyhow::Error::msg)?;
                manager.update_section(ConfigSection::Reconcile)?;
            }
            manager.ensure_dirs_exist()?;
            println!("Settings written to {}", manager.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reconcile {
            planned,
            actual,
            tolerance,
        } => run_reconcile(&planned, &actual, tolerance),
        Commands::Run {
            program,
            narration,
            name,
            config,
            tolerance,
        } => {
            let mut settings = load_config(&config)?.into_settings();
            if let Some(tolerance) = tolerance {
                settings.reconcile.tolerance_secs = tolerance;
            }
            run_job(&program, &narration, name, settings)
        }
    }
}

fn load_config(path: &Path) -> Result<ConfigManager> {
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("loading settings from {}", path.display()))?;
    Ok(manager)
}

fn run_reconcile(planned: &[f64], actual: &[f64], tolerance: Option<f64>) -> Result<ExitCode> {
    if planned.len() != actual.len() {
        bail!(
            "{} planned durations but {} actual durations",
            planned.len(),
            actual.len()
        );
    }
    let tolerance = tolerance.unwrap_or_else(|| Settings::default().reconcile.tolerance_secs);

    let pairs: Vec<DurationPair> = planned
        .iter()
        .zip(actual)
        .map(|(&p, &a)| DurationPair::new(p, a))
        .collect();
    let adjustments = reconcile(&pairs, tolerance)?;
    let decision = ReconcileDecision::from_adjustments(&adjustments);

    let report = AdjustmentReport::from_adjustments(
        "reconcile",
        tolerance,
        &adjustments,
        Vec::new(),
        decision.is_rerender(),
    );
    println!("{}", report.to_json()?);
    Ok(ExitCode::SUCCESS)
}

fn run_job(
    program: &Path,
    narration: &Path,
    name: Option<String>,
    settings: Settings,
) -> Result<ExitCode> {
    let source = fs::read_to_string(program)
        .with_context(|| format!("reading program {}", program.display()))?;
    let lines: Vec<String> = serde_json::from_str(
        &fs::read_to_string(narration)
            .with_context(|| format!("reading narration {}", narration.display()))?,
    )
    .with_context(|| format!("parsing narration {}", narration.display()))?;

    let name = name.unwrap_or_else(|| {
        program
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "job".to_string())
    });

    let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new(settings.media.clone()));
    let renderer = CommandRenderer::new(&settings.render)?;
    let synthesizer = CommandSynthesizer::new(&settings.synthesis, Arc::clone(&toolkit))?;
    let collaborators = Collaborators {
        toolkit,
        renderer: Arc::new(renderer),
        synthesizer: Arc::new(synthesizer),
    };

    let runner = JobRunner::new(settings, collaborators);
    let outcome = runner.run(
        JobSpec::new(name, source, lines),
        None,
        Some(Box::new(|step: &str, pct: u32, msg: &str| {
            tracing::info!("[{:>3}%] {}: {}", pct, step, msg);
        })),
    )?;

    println!("Video:     {}", outcome.video.display());
    println!("Narration: {}", outcome.audio.display());
    if let Some(subtitles) = &outcome.subtitles {
        println!("Subtitles: {}", subtitles.display());
    }
    for segment in &outcome.report.segments {
        println!(
            "  segment {:>3}: planned {:>7.3}s actual {:>7.3}s -> {}",
            segment.index, segment.planned, segment.actual, segment.kind
        );
    }

    if outcome.is_degraded() {
        eprintln!(
            "Partially synchronized: segments {:?} keep a mismatch",
            outcome.report.affected_segments()
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
