//! Configuration loading for the supervisor binary.
//!
//! Reads one `SupervisorConfig` TOML file, runs the per-section bounds
//! checks from `bms_common`, then the cross-field checks that only make
//! sense once the whole file is known.

use std::path::{Path, PathBuf};

use bms_common::config::{ConfigError as CommonConfigError, ConfigLoader};
use bms_common::rack::config::SupervisorConfig;
use bms_common::rack::state::{OperatingMode, StartStopConfig};
use tracing::{info, warn};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    /// File missing or unreadable.
    IoError(String),
    /// TOML parse error.
    ParseError(String),
    /// Parameter validation error.
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "config I/O error: {e}"),
            Self::ParseError(e) => write!(f, "config parse error: {e}"),
            Self::ValidationError(e) => write!(f, "config validation: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<CommonConfigError> for ConfigError {
    fn from(e: CommonConfigError) -> Self {
        match e {
            CommonConfigError::FileNotFound => Self::IoError(e.to_string()),
            CommonConfigError::ParseError(msg) => Self::ParseError(msg),
            CommonConfigError::ValidationError(msg) => Self::ValidationError(msg),
        }
    }
}

// ─── Loaded Config ──────────────────────────────────────────────────

/// Validated configuration, ready for runtime use.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SupervisorConfig,
    /// File the configuration came from, `None` for in-memory sources.
    pub source: Option<PathBuf>,
}

/// Load and validate the supervisor configuration from `path`.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let config = SupervisorConfig::load(path).map_err(|e| match e {
        CommonConfigError::FileNotFound => {
            ConfigError::IoError(format!("{} not found", path.display()))
        }
        other => other.into(),
    })?;
    validate(&config)?;
    info!(
        path = %path.display(),
        service = %config.shared.service_name,
        modules = config.rack.module_count,
        "Configuration loaded"
    );
    Ok(LoadedConfig {
        config,
        source: Some(path.to_path_buf()),
    })
}

/// Load and validate from an in-memory TOML document (tests and tooling).
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    let config = SupervisorConfig::load_str(content)?;
    validate(&config)?;
    Ok(LoadedConfig {
        config,
        source: None,
    })
}

/// Section bounds plus cross-field rules.
pub fn validate(config: &SupervisorConfig) -> Result<(), ConfigError> {
    config.validate()?;

    let rack = &config.rack;
    if rack.max_start_time() < rack.cycle_time() {
        return Err(ConfigError::ValidationError(format!(
            "max_start_time_s {} is shorter than one cycle ({} ms)",
            rack.max_start_time_s, rack.cycle_time_ms
        )));
    }
    if rack.pending_tolerance() < rack.cycle_time() {
        return Err(ConfigError::ValidationError(format!(
            "pending_tolerance_s {} is shorter than one cycle ({} ms)",
            rack.pending_tolerance_s, rack.cycle_time_ms
        )));
    }
    if rack.operating_mode != OperatingMode::Default && rack.start_stop != StartStopConfig::Auto {
        warn!(
            mode = ?rack.operating_mode,
            start_stop = ?rack.start_stop,
            "start_stop only affects operating_mode = default"
        );
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
