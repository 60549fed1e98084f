//! Configuration management for narrsync.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use narrsync_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/narrsync.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Tolerance: {}s", config.settings().reconcile.tolerance_secs);
//!
//! config.settings_mut().synthesis.max_parallel = 8;
//! config.update_section(ConfigSection::Synthesis).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, MediaSettings, OutputSettings, PathSettings,
    ReconcileSettings, RenderSettings, ScriptSettings, Settings, SynthesisSettings,
};
