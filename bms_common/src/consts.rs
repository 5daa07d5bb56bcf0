//! System-wide constants for the rack supervisor.
//!
//! Single source of truth for register bases, device command words,
//! sequencing delays and drift thresholds. Imported by all crates.

use std::time::Duration;

use static_assertions::const_assert;

// ─── Register Map ───────────────────────────────────────────────────

/// Base address of the rack register map.
pub const ADDRESS_OFFSET: u16 = 0x2000;

/// First per-cell voltage register.
pub const VOLTAGE_ADDRESS_OFFSET: u16 = ADDRESS_OFFSET + 0x800;

/// First per-cell temperature register.
pub const TEMPERATURE_ADDRESS_OFFSET: u16 = ADDRESS_OFFSET + 0xC00;

/// Voltage and temperature sensors per slave module.
pub const SENSORS_PER_MODULE: usize = 12;

/// Highest slave count the rack can address (slave comm-error bits 1..=20).
pub const MAX_MODULES: u8 = 20;

const_assert!(
    VOLTAGE_ADDRESS_OFFSET as usize + MAX_MODULES as usize * SENSORS_PER_MODULE
        <= TEMPERATURE_ADDRESS_OFFSET as usize
);

// ─── Device Command Words ───────────────────────────────────────────

/// Contactor control value closing the main contactor.
pub const SYSTEM_ON: u16 = 1;

/// Contactor control value opening the main contactor.
pub const SYSTEM_OFF: u16 = 0;

/// Value written to the system-reset register.
pub const SYSTEM_RESET: u16 = 0x1;

/// Value written to the sleep register.
pub const SYSTEM_SLEEP: u16 = 0x1;

// ─── Sequencing ─────────────────────────────────────────────────────

/// Settle time after triggering a slave/temperature auto-ID before the
/// result register is evaluated.
pub const AUTO_ID_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Settle time after provisioning voltage ranges before the system reset.
pub const CONFIGURING_FINISHED_DELAY: Duration = Duration::from_secs(5);

/// Upper bound of register writes queued in one cycle.
pub const MAX_WRITES_PER_CYCLE: usize = 16;

// ─── Drift Detection ────────────────────────────────────────────────

/// Minimum spread between max and min cell voltage [mV] for a drift.
pub const DRIFT_MAX_SPREAD_MV: i64 = 400;

/// Minimum per-cycle change of an extreme cell voltage [mV] for a drift.
pub const DRIFT_MAX_CHANGE_MV: i64 = 50;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/rack.toml";
