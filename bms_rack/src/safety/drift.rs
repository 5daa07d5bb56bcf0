//! Cell-voltage drift detection.
//!
//! Compares the extreme cell voltages of consecutive cycles. A drift is the
//! max cell rising while the min cell falls, both on adjacent cells, with a
//! wide spread and a large step. Normal charge or discharge moves both
//! extremes the same way and never matches.

use bms_common::consts::{DRIFT_MAX_CHANGE_MV, DRIFT_MAX_SPREAD_MV};

use crate::codec::Quantity;
use crate::snapshot::TelemetrySnapshot;

/// Max/min cell voltage [mV] and the cell index of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellExtremes {
    pub max_mv: i64,
    pub max_id: i64,
    pub min_mv: i64,
    pub min_id: i64,
}

impl CellExtremes {
    /// Extract from a snapshot. `None` if any of the four is undetermined.
    pub fn from_snapshot(snapshot: &TelemetrySnapshot) -> Option<Self> {
        Some(Self {
            max_mv: snapshot.get(Quantity::MaxCellVoltage)?,
            max_id: snapshot.get(Quantity::MaxCellVoltageId)?,
            min_mv: snapshot.get(Quantity::MinCellVoltage)?,
            min_id: snapshot.get(Quantity::MinCellVoltageId)?,
        })
    }

    #[inline]
    pub const fn spread_mv(&self) -> i64 {
        self.max_mv - self.min_mv
    }
}

/// Sliding one-cycle baseline of the cell extremes.
#[derive(Debug, Clone, Default)]
pub struct DriftGuard {
    baseline: Option<CellExtremes>,
}

impl DriftGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one cycle and slide the baseline.
    ///
    /// Undetermined extremes leave the baseline untouched and report no
    /// drift. The first cycle after [`reset`](Self::reset) only seeds it.
    pub fn check(&mut self, current: Option<CellExtremes>) -> bool {
        let Some(current) = current else {
            return false;
        };
        let Some(previous) = self.baseline.replace(current) else {
            return false;
        };

        let delta_max = previous.max_mv - current.max_mv;
        let delta_min = previous.min_mv - current.min_mv;

        delta_max < 0
            && delta_min > 0
            && current.spread_mv() > DRIFT_MAX_SPREAD_MV
            && (delta_max.abs() > DRIFT_MAX_CHANGE_MV || delta_min.abs() > DRIFT_MAX_CHANGE_MV)
            && (current.max_id - current.min_id).abs() == 1
    }

    /// Forget the baseline.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    pub fn baseline(&self) -> Option<CellExtremes> {
        self.baseline
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
