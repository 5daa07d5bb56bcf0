//! Charge/discharge current clamp applied before each read.
//!
//! Works on the previous cycle's telemetry. The BMS-reported limits are
//! derated linearly towards zero as the extreme cell voltages approach the
//! stop thresholds, and forced to zero outside the temperature window.

use bms_common::rack::config::ProtectionConfig;
use serde::Serialize;

use crate::codec::Quantity;
use crate::snapshot::TelemetrySnapshot;

/// Current limits [A] handed to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CurrentLimits {
    pub charge_max_current: i64,
    pub discharge_max_current: i64,
}

impl CurrentLimits {
    pub const ZERO: Self = Self {
        charge_max_current: 0,
        discharge_max_current: 0,
    };
}

/// Clamp the BMS limits from `previous`.
///
/// Returns [`CurrentLimits::ZERO`] when the rack was not ready for work in
/// the previous cycle, or when any input is undetermined.
pub fn clamp(
    config: &ProtectionConfig,
    previous: &TelemetrySnapshot,
    was_ready_for_work: bool,
) -> CurrentLimits {
    if !was_ready_for_work {
        return CurrentLimits::ZERO;
    }
    compute(config, previous).unwrap_or(CurrentLimits::ZERO)
}

fn compute(config: &ProtectionConfig, s: &TelemetrySnapshot) -> Option<CurrentLimits> {
    let charge_limit = s.get(Quantity::BmsChargeMaxCurrent)?;
    let discharge_limit = s.get(Quantity::BmsDischargeMaxCurrent)?;
    let max_cell_mv = s.get(Quantity::MaxCellVoltage)?;
    let min_cell_mv = s.get(Quantity::MinCellVoltage)?;
    let max_temp_dc = s.get(Quantity::ClusterMaxCellTemperature)?;
    let min_temp_dc = s.get(Quantity::ClusterMinCellTemperature)?;

    if min_temp_dc < config.min_temperature_dc || max_temp_dc > config.max_temperature_dc {
        return Some(CurrentLimits::ZERO);
    }

    Some(CurrentLimits {
        charge_max_current: derate(
            charge_limit,
            max_cell_mv,
            config.charge_derate_start_mv,
            config.charge_stop_mv,
        ),
        discharge_max_current: derate(
            discharge_limit,
            min_cell_mv,
            config.discharge_derate_start_mv,
            config.discharge_stop_mv,
        ),
    })
}

/// Linear ramp from `limit` at `start` to zero at `stop`.
///
/// Works in either direction: `stop > start` for charge, `stop < start`
/// for discharge.
fn derate(limit: i64, value: i64, start: i64, stop: i64) -> i64 {
    let limit = limit.max(0);
    let span = stop - start;
    if span == 0 {
        return 0;
    }
    // Position along the ramp, 0 at start and `span` at stop.
    let progressed = value - start;
    if progressed.signum() != span.signum() || progressed == 0 {
        return limit;
    }
    if progressed.abs() >= span.abs() {
        return 0;
    }
    limit * (stop - value) / span
}

// ─── Tests ──────────────────────────────────────────────────────────
