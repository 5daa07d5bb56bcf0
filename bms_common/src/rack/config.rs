//! Configuration structures for the rack supervisor.
//!
//! All config types use `serde::Deserialize` for TOML loading. Numeric
//! parameters have const `MIN`/`MAX` bounds checked by `validate()`.
//! Optional fields use `#[serde(default = ...)]`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigError, SharedConfig};
use crate::consts::MAX_MODULES;

use super::module::{ModuleParameters, ModuleType};
use super::state::{OperatingMode, StartStopConfig};

// ─── Bounds ─────────────────────────────────────────────────────────

pub const WATCHDOG_S_MAX: u16 = 3600;
pub const SOC_PERCENT_MAX: u8 = 100;
pub const DELAY_S_MAX: u32 = 86_400;
pub const MAX_START_ATTEMPTS_MIN: u32 = 1;
pub const MAX_START_ATTEMPTS_MAX: u32 = 100;
pub const CYCLE_TIME_MS_MIN: u32 = 100;
pub const CYCLE_TIME_MS_MAX: u32 = 60_000;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete supervisor configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub shared: SharedConfig,
    pub rack: RackConfig,
    #[serde(default)]
    pub protection: ProtectionConfig,
}

impl SupervisorConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.rack.validate().map_err(ConfigError::ValidationError)?;
        self.protection
            .validate()
            .map_err(ConfigError::ValidationError)?;
        Ok(())
    }
}

// ─── Rack Config ────────────────────────────────────────────────────

/// Rack topology, operating mode and lifecycle timing.
///
/// Immutable after activation; the module count fixes the size of the
/// per-cell arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RackConfig {
    /// Number of slave modules (1..=20).
    pub module_count: u8,

    #[serde(default)]
    pub module_type: ModuleType,

    #[serde(default)]
    pub operating_mode: OperatingMode,

    #[serde(default)]
    pub start_stop: StartStopConfig,

    /// EMS communication timeout written on activation [s].
    #[serde(default = "default_watchdog_s")]
    pub watchdog_s: u16,

    /// SoC-low protection threshold written on activation [%].
    #[serde(default)]
    pub soc_low_alarm_percent: u8,

    /// Wait after a level-2 error before re-checking [s].
    #[serde(default = "default_error_level2_delay_s")]
    pub error_level2_delay_s: u32,

    /// Time allowed for the contactor to reach ON_GRID [s].
    #[serde(default = "default_max_start_time_s")]
    pub max_start_time_s: u32,

    /// Consecutive unsuccessful starts before the start-failure delay.
    #[serde(default = "default_max_start_attempts")]
    pub max_start_attempts: u32,

    /// Wait after exhausting start attempts [s].
    #[serde(default = "default_start_unsuccessful_delay_s")]
    pub start_unsuccessful_delay_s: u32,

    /// Maximum time in PENDING before a forced STOP [s].
    #[serde(default = "default_pending_tolerance_s")]
    pub pending_tolerance_s: u32,

    /// Drop the stop/warn parameter blocks from polling.
    #[serde(default)]
    pub reduce_tasks: bool,

    #[serde(default = "default_cycle_time_ms")]
    pub cycle_time_ms: u32,

    /// Cycles between `info!` status summaries.
    #[serde(default = "default_status_interval")]
    pub status_interval_cycles: u32,
}

fn default_watchdog_s() -> u16 {
    60
}
fn default_error_level2_delay_s() -> u32 {
    600
}
fn default_max_start_time_s() -> u32 {
    30
}
fn default_max_start_attempts() -> u32 {
    5
}
fn default_start_unsuccessful_delay_s() -> u32 {
    3600
}
fn default_pending_tolerance_s() -> u32 {
    15
}
fn default_cycle_time_ms() -> u32 {
    1000
}
fn default_status_interval() -> u32 {
    10
}

impl RackConfig {
    /// Minimal valid configuration for `module_count` modules.
    pub fn with_modules(module_count: u8) -> Self {
        Self {
            module_count,
            module_type: ModuleType::default(),
            operating_mode: OperatingMode::default(),
            start_stop: StartStopConfig::default(),
            watchdog_s: default_watchdog_s(),
            soc_low_alarm_percent: 0,
            error_level2_delay_s: default_error_level2_delay_s(),
            max_start_time_s: default_max_start_time_s(),
            max_start_attempts: default_max_start_attempts(),
            start_unsuccessful_delay_s: default_start_unsuccessful_delay_s(),
            pending_tolerance_s: default_pending_tolerance_s(),
            reduce_tasks: false,
            cycle_time_ms: default_cycle_time_ms(),
            status_interval_cycles: default_status_interval(),
        }
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.module_count == 0 || self.module_count > MAX_MODULES {
            return Err(format!(
                "module_count {} out of range [1, {}]",
                self.module_count, MAX_MODULES
            ));
        }
        if self.watchdog_s > WATCHDOG_S_MAX {
            return Err(format!(
                "watchdog_s {} out of range [0, {}]",
                self.watchdog_s, WATCHDOG_S_MAX
            ));
        }
        if self.soc_low_alarm_percent > SOC_PERCENT_MAX {
            return Err(format!(
                "soc_low_alarm_percent {} out of range [0, {}]",
                self.soc_low_alarm_percent, SOC_PERCENT_MAX
            ));
        }
        for (name, value) in [
            ("error_level2_delay_s", self.error_level2_delay_s),
            ("max_start_time_s", self.max_start_time_s),
            ("start_unsuccessful_delay_s", self.start_unsuccessful_delay_s),
            ("pending_tolerance_s", self.pending_tolerance_s),
        ] {
            if value > DELAY_S_MAX {
                return Err(format!("{name} {value} out of range [0, {DELAY_S_MAX}]"));
            }
        }
        if self.max_start_attempts < MAX_START_ATTEMPTS_MIN
            || self.max_start_attempts > MAX_START_ATTEMPTS_MAX
        {
            return Err(format!(
                "max_start_attempts {} out of range [{}, {}]",
                self.max_start_attempts, MAX_START_ATTEMPTS_MIN, MAX_START_ATTEMPTS_MAX
            ));
        }
        if self.cycle_time_ms < CYCLE_TIME_MS_MIN || self.cycle_time_ms > CYCLE_TIME_MS_MAX {
            return Err(format!(
                "cycle_time_ms {} out of range [{}, {}]",
                self.cycle_time_ms, CYCLE_TIME_MS_MIN, CYCLE_TIME_MS_MAX
            ));
        }
        if self.status_interval_cycles == 0 {
            return Err("status_interval_cycles must be at least 1".to_string());
        }
        Ok(())
    }

    #[inline]
    pub fn module_parameters(&self) -> ModuleParameters {
        self.module_type.parameters()
    }

    #[inline]
    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(u64::from(self.cycle_time_ms))
    }

    #[inline]
    pub fn error_level2_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.error_level2_delay_s))
    }

    #[inline]
    pub fn max_start_time(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_start_time_s))
    }

    #[inline]
    pub fn start_unsuccessful_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.start_unsuccessful_delay_s))
    }

    #[inline]
    pub fn pending_tolerance(&self) -> Duration {
        Duration::from_secs(u64::from(self.pending_tolerance_s))
    }
}

// ─── Protection Config ──────────────────────────────────────────────

/// Charge/discharge current derating applied in the pre-read phase.
///
/// Voltages in millivolt, temperatures in deci-degree Celsius.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtectionConfig {
    #[serde(default = "default_charge_derate_start_mv")]
    pub charge_derate_start_mv: i64,
    #[serde(default = "default_charge_stop_mv")]
    pub charge_stop_mv: i64,
    #[serde(default = "default_discharge_derate_start_mv")]
    pub discharge_derate_start_mv: i64,
    #[serde(default = "default_discharge_stop_mv")]
    pub discharge_stop_mv: i64,
    #[serde(default = "default_min_temperature_dc")]
    pub min_temperature_dc: i64,
    #[serde(default = "default_max_temperature_dc")]
    pub max_temperature_dc: i64,
}

fn default_charge_derate_start_mv() -> i64 {
    3450
}
fn default_charge_stop_mv() -> i64 {
    3600
}
fn default_discharge_derate_start_mv() -> i64 {
    3000
}
fn default_discharge_stop_mv() -> i64 {
    2900
}
fn default_min_temperature_dc() -> i64 {
    0
}
fn default_max_temperature_dc() -> i64 {
    550
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            charge_derate_start_mv: default_charge_derate_start_mv(),
            charge_stop_mv: default_charge_stop_mv(),
            discharge_derate_start_mv: default_discharge_derate_start_mv(),
            discharge_stop_mv: default_discharge_stop_mv(),
            min_temperature_dc: default_min_temperature_dc(),
            max_temperature_dc: default_max_temperature_dc(),
        }
    }
}

impl ProtectionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.charge_derate_start_mv >= self.charge_stop_mv {
            return Err(format!(
                "charge_derate_start_mv {} must be below charge_stop_mv {}",
                self.charge_derate_start_mv, self.charge_stop_mv
            ));
        }
        if self.discharge_derate_start_mv <= self.discharge_stop_mv {
            return Err(format!(
                "discharge_derate_start_mv {} must be above discharge_stop_mv {}",
                self.discharge_derate_start_mv, self.discharge_stop_mv
            ));
        }
        if self.min_temperature_dc >= self.max_temperature_dc {
            return Err(format!(
                "min_temperature_dc {} must be below max_temperature_dc {}",
                self.min_temperature_dc, self.max_temperature_dc
            ));
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;

    const MINIMAL: &str = r#"
[shared]
service_name = "rack-1"

[rack]
module_count = 8
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = SupervisorConfig::load_str(MINIMAL).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.rack.module_count, 8);
        assert_eq!(config.rack.watchdog_s, 60);
        assert_eq!(config.rack.error_level2_delay_s, 600);
        assert_eq!(config.rack.max_start_time_s, 30);
        assert_eq!(config.rack.max_start_attempts, 5);
        assert_eq!(config.rack.start_unsuccessful_delay_s, 3600);
        assert_eq!(config.rack.pending_tolerance_s, 15);
        assert_eq!(config.rack.operating_mode, OperatingMode::Default);
        assert_eq!(config.protection, ProtectionConfig::default());
    }

    #[test]
    fn module_count_bounds() {
        let mut rack = RackConfig::with_modules(0);
        assert!(rack.validate().is_err());
        rack.module_count = MAX_MODULES + 1;
        assert!(rack.validate().is_err());
        rack.module_count = MAX_MODULES;
        assert!(rack.validate().is_ok());
    }

    #[test]
    fn zero_start_attempts_rejected() {
        let mut rack = RackConfig::with_modules(4);
        rack.max_start_attempts = 0;
        let err = rack.validate().unwrap_err();
        assert!(err.contains("max_start_attempts"), "{err}");
    }

    #[test]
    fn soc_above_hundred_rejected() {
        let mut rack = RackConfig::with_modules(4);
        rack.soc_low_alarm_percent = 101;
        assert!(rack.validate().is_err());
    }

    #[test]
    fn unknown_rack_key_rejected() {
        let text = format!("{MINIMAL}\nnumber_of_racks = 2\n");
        assert!(SupervisorConfig::load_str(&text).is_err());
    }

    #[test]
    fn inverted_protection_window_rejected() {
        let protection = ProtectionConfig {
            charge_derate_start_mv: 3700,
            ..ProtectionConfig::default()
        };
        assert!(protection.validate().is_err());
    }

    #[test]
    fn durations_follow_seconds() {
        let rack = RackConfig::with_modules(4);
        assert_eq!(rack.pending_tolerance(), Duration::from_secs(15));
        assert_eq!(rack.cycle_time(), Duration::from_millis(1000));
    }
}
