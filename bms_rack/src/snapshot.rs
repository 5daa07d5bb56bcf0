//! Per-cycle telemetry snapshot.
//!
//! Decoded fresh from the register image every cycle and never mutated
//! afterwards. Every accessor returns `Option`: `None` means the value is
//! undetermined (register not read yet, or stale).

use bms_common::consts::SENSORS_PER_MODULE;
use bms_common::rack::alarm::{FlagStatus, HardwareFailure, RackAlarm, SlaveCommError};
use bms_common::rack::state::{
    AutoSetFunction, ChargeIndication, ClusterRunState, ContactorFeedback, ContactorState,
    FanStatus, SystemRunMode,
};

use crate::codec::{self, Quantity, RegisterImage};

/// Immutable decoded telemetry for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    module_count: u8,
    values: Vec<Option<i64>>,
    cell_voltages_mv: Vec<Option<i64>>,
    cell_temperatures_dc: Vec<Option<i64>>,
}

impl TelemetrySnapshot {
    /// Decode the whole register image.
    pub fn decode(image: &RegisterImage, module_count: u8) -> Self {
        Self {
            module_count,
            values: codec::decode_all(image),
            cell_voltages_mv: codec::decode_cell_voltages(image, module_count),
            cell_temperatures_dc: codec::decode_cell_temperatures(image, module_count),
        }
    }

    /// Snapshot with every value undetermined.
    pub fn undetermined(module_count: u8) -> Self {
        let cells = usize::from(module_count) * SENSORS_PER_MODULE;
        Self {
            module_count,
            values: vec![None; Quantity::COUNT],
            cell_voltages_mv: vec![None; cells],
            cell_temperatures_dc: vec![None; cells],
        }
    }

    /// Start building a snapshot from semantic values.
    pub fn builder(module_count: u8) -> SnapshotBuilder {
        SnapshotBuilder {
            inner: Self::undetermined(module_count),
        }
    }

    #[inline]
    pub fn module_count(&self) -> u8 {
        self.module_count
    }

    /// Semantic value of `quantity`.
    #[inline]
    pub fn get(&self, quantity: Quantity) -> Option<i64> {
        self.values[quantity.index()]
    }

    // ── Bitfields ──

    fn bits(&self, quantity: Quantity) -> Option<u16> {
        self.get(quantity).and_then(|v| u16::try_from(v).ok())
    }

    pub fn level2_alarms(&self) -> Option<RackAlarm> {
        self.bits(Quantity::Level2Alarm).map(RackAlarm::from_bits_truncate)
    }

    pub fn level1_alarms(&self) -> Option<RackAlarm> {
        self.bits(Quantity::Level1Alarm).map(RackAlarm::from_bits_truncate)
    }

    pub fn alarm_flag_status(&self) -> Option<FlagStatus> {
        self.bits(Quantity::AlarmFlagStatus).map(FlagStatus::from_bits_truncate)
    }

    pub fn protect_flag_status(&self) -> Option<FlagStatus> {
        self.bits(Quantity::ProtectFlagStatus).map(FlagStatus::from_bits_truncate)
    }

    pub fn hardware_failure(&self) -> Option<HardwareFailure> {
        self.bits(Quantity::HardwareFailure).map(HardwareFailure::from_bits_truncate)
    }

    /// Both slave communication-error words merged. Undetermined unless
    /// both words have been read.
    pub fn slave_comm_errors(&self) -> Option<SlaveCommError> {
        let high = self.bits(Quantity::SlaveCommErrorHigh)?;
        let low = self.bits(Quantity::SlaveCommErrorLow)?;
        Some(SlaveCommError::from_words(high, low))
    }

    // ── Enumerations ──

    /// `None` until the control register has been read. An unrecognized
    /// value decodes as [`ContactorFeedback::Undefined`].
    pub fn contactor_feedback(&self) -> Option<ContactorFeedback> {
        self.get(Quantity::BmsContactorControl)
            .map(ContactorFeedback::from_raw)
    }

    pub fn auto_set_slaves_id(&self) -> Option<AutoSetFunction> {
        self.get(Quantity::AutoSetSlavesId)
            .and_then(AutoSetFunction::from_raw)
    }

    pub fn auto_set_slaves_temperature_id(&self) -> Option<AutoSetFunction> {
        self.get(Quantity::AutoSetSlavesTemperatureId)
            .and_then(AutoSetFunction::from_raw)
    }

    pub fn fan_status(&self) -> Option<FanStatus> {
        self.get(Quantity::FanStatus).and_then(FanStatus::from_raw)
    }

    pub fn main_contactor_state(&self) -> Option<ContactorState> {
        self.get(Quantity::MainContactorState)
            .and_then(ContactorState::from_raw)
    }

    pub fn pre_contactor_status(&self) -> Option<ContactorState> {
        self.get(Quantity::PreContactorStatus)
            .and_then(ContactorState::from_raw)
    }

    pub fn system_run_mode(&self) -> Option<SystemRunMode> {
        self.get(Quantity::SystemRunMode).and_then(SystemRunMode::from_raw)
    }

    pub fn cluster_run_state(&self) -> Option<ClusterRunState> {
        self.get(Quantity::ClusterRunState)
            .and_then(ClusterRunState::from_raw)
    }

    pub fn charge_indication(&self) -> Option<ChargeIndication> {
        self.get(Quantity::ChargeIndication)
            .and_then(ChargeIndication::from_raw)
    }

    // ── Per-cell arrays ──

    /// Cell voltage [mV] of `sensor` in `module` (both zero-based).
    pub fn cell_voltage(&self, module: u8, sensor: usize) -> Option<i64> {
        Self::cell(&self.cell_voltages_mv, module, sensor)
    }

    /// Cell temperature [deci-°C] of `sensor` in `module` (both zero-based).
    pub fn cell_temperature(&self, module: u8, sensor: usize) -> Option<i64> {
        Self::cell(&self.cell_temperatures_dc, module, sensor)
    }

    fn cell(cells: &[Option<i64>], module: u8, sensor: usize) -> Option<i64> {
        if sensor >= SENSORS_PER_MODULE {
            return None;
        }
        cells
            .get(usize::from(module) * SENSORS_PER_MODULE + sensor)
            .copied()
            .flatten()
    }

    /// All cell voltages, module-major.
    pub fn cell_voltages(&self) -> &[Option<i64>] {
        &self.cell_voltages_mv
    }

    /// All cell temperatures, module-major.
    pub fn cell_temperatures(&self) -> &[Option<i64>] {
        &self.cell_temperatures_dc
    }
}

/// Builder for snapshots assembled from semantic values.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    inner: TelemetrySnapshot,
}

impl SnapshotBuilder {
    pub fn value(mut self, quantity: Quantity, value: i64) -> Self {
        self.inner.values[quantity.index()] = Some(value);
        self
    }

    pub fn contactor(self, feedback: ContactorFeedback) -> Self {
        self.value(Quantity::BmsContactorControl, feedback as i64)
    }

    /// Cell extremes as reported by the summary block.
    pub fn cell_extremes(self, max_mv: i64, max_id: i64, min_mv: i64, min_id: i64) -> Self {
        self.value(Quantity::MaxCellVoltage, max_mv)
            .value(Quantity::MaxCellVoltageId, max_id)
            .value(Quantity::MinCellVoltage, min_mv)
            .value(Quantity::MinCellVoltageId, min_id)
    }

    pub fn cell_voltage(mut self, module: u8, sensor: usize, mv: i64) -> Self {
        let index = usize::from(module) * SENSORS_PER_MODULE + sensor;
        if let Some(cell) = self.inner.cell_voltages_mv.get_mut(index) {
            *cell = Some(mv);
        }
        self
    }

    pub fn build(self) -> TelemetrySnapshot {
        self.inner
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
