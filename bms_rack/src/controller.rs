//! Rack controller: one value holding everything that survives a cycle.
//!
//! The cycle runner calls [`RackController::pre_read`] before reading and
//! [`RackController::post_read`] with the freshly decoded snapshot. The
//! post-read phase evaluates alarms and drift, then advances exactly one
//! of the lifecycle machine, the configuring sequencer, or the forced
//! ON/OFF command, and returns the register writes for this cycle.

use std::fmt::Write as _;
use std::time::Instant;

use bms_common::consts::{SYSTEM_RESET, SYSTEM_SLEEP};
use bms_common::rack::config::{ProtectionConfig, RackConfig, SupervisorConfig};
use bms_common::rack::state::{
    ConfiguringState, LifecycleState, OperatingMode, StartStop, StartStopConfig,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::codec::{self, CodecError, Quantity, RegisterWrite, Writes};
use crate::contactor::{self, ContactorDriver};
use crate::safety::alarms::{self, AlarmEdgeTracker, AlarmFlag, AlarmReport};
use crate::safety::drift::{CellExtremes, DriftGuard};
use crate::safety::protection::{self, CurrentLimits};
use crate::snapshot::TelemetrySnapshot;
use crate::state::configuring::{ConfiguringInputs, ConfiguringSequencer};
use crate::state::lifecycle::{LifecycleEffect, LifecycleInputs, LifecycleMachine, LifecycleTiming};

/// Registers written once on activation.
const ACTIVATION_QUANTITIES: [Quantity; 3] = [
    Quantity::EmsCommunicationTimeout,
    Quantity::StopSocLowProtection,
    Quantity::StopSocLowProtectionRecover,
];

// ─── Status ─────────────────────────────────────────────────────────

/// Host-facing status of the rack.
#[derive(Debug, Clone, Serialize)]
pub struct RackStatus {
    pub state: LifecycleState,
    pub configuring_state: ConfiguringState,
    pub operating_mode: OperatingMode,
    pub target: StartStop,
    pub ready_for_work: bool,
    pub is_error: bool,
    pub start_attempts_exhausted: bool,
    pub module_count: u8,
    pub capacity_wh: u32,
    pub voltage: Option<i64>,
    pub current: Option<i64>,
    pub soc: Option<i64>,
    pub min_cell_voltage: Option<i64>,
    pub max_cell_voltage: Option<i64>,
    pub min_cell_temperature: Option<i64>,
    pub max_cell_temperature: Option<i64>,
    pub charge_max_voltage: Option<i64>,
    pub discharge_min_voltage: Option<i64>,
    pub limits: CurrentLimits,
    pub alarms: Vec<AlarmFlag>,
}

// ─── Controller ─────────────────────────────────────────────────────

/// Supervisor for one rack.
#[derive(Debug)]
pub struct RackController {
    rack: RackConfig,
    protection: ProtectionConfig,
    timing: LifecycleTiming,

    lifecycle: LifecycleMachine,
    configuring: ConfiguringSequencer,
    contactor: ContactorDriver,
    drift: DriftGuard,
    alarm_edges: AlarmEdgeTracker,

    host_target: StartStop,
    effective_target: StartStop,
    activation_pending: bool,
    ready_for_work: bool,
    limits: CurrentLimits,
    alarms: AlarmReport,
    last_snapshot: TelemetrySnapshot,
    reported_modules: Option<i64>,
}

impl RackController {
    pub fn new(config: &SupervisorConfig) -> Self {
        let rack = config.rack.clone();
        let mut controller = Self {
            timing: LifecycleTiming::from(&rack),
            configuring: ConfiguringSequencer::new(rack.module_count, rack.module_parameters()),
            last_snapshot: TelemetrySnapshot::undetermined(rack.module_count),
            protection: config.protection.clone(),
            lifecycle: LifecycleMachine::new(),
            contactor: ContactorDriver::new(),
            drift: DriftGuard::new(),
            alarm_edges: AlarmEdgeTracker::new(),
            host_target: StartStop::Undefined,
            effective_target: StartStop::Undefined,
            activation_pending: true,
            ready_for_work: false,
            limits: CurrentLimits::ZERO,
            alarms: AlarmReport::default(),
            reported_modules: None,
            rack,
        };
        controller.effective_target = controller.resolve_target();
        controller
    }

    // ── Host inputs ──

    /// Commanded start/stop target. Only effective with `start_stop = auto`.
    pub fn set_start_stop(&mut self, target: StartStop) {
        self.host_target = target;
    }

    fn resolve_target(&self) -> StartStop {
        match self.rack.start_stop {
            StartStopConfig::Auto => self.host_target,
            StartStopConfig::Start => StartStop::Start,
            StartStopConfig::Stop => StartStop::Stop,
        }
    }

    // ── Cycle phases ──

    /// Pre-read phase: clamp current limits from the previous cycle.
    pub fn pre_read(&mut self) -> CurrentLimits {
        self.limits = protection::clamp(&self.protection, &self.last_snapshot, self.ready_for_work);
        self.limits
    }

    /// Post-read phase: evaluate `snapshot` and advance one step.
    pub fn post_read(&mut self, now: Instant, snapshot: TelemetrySnapshot) -> Writes {
        let mut writes = Writes::new();

        self.alarms = alarms::evaluate(&snapshot);
        self.alarm_edges.update(&self.alarms);
        let drift = self.drift.check(CellExtremes::from_snapshot(&snapshot));
        self.check_module_count(&snapshot);

        if self.activation_pending {
            self.queue_activation(&mut writes);
        }

        let target = self.resolve_target();
        if target != self.effective_target {
            info!(from = ?self.effective_target, to = ?target, "Start/stop target changed");
            self.effective_target = target;
            self.lifecycle.force_undefined();
            self.configuring.reset();
            self.contactor.reset();
            self.drift.reset();
            self.ready_for_work = false;
            self.last_snapshot = snapshot;
            return writes;
        }

        let feedback = snapshot.contactor_feedback();
        self.contactor.observe(feedback);
        self.ready_for_work = false;
        match self.rack.operating_mode {
            OperatingMode::Default => {
                let inputs = LifecycleInputs {
                    now,
                    feedback,
                    is_error: self.alarms.is_error(),
                    drift,
                };
                let outcome = if target == StartStop::Stop {
                    self.lifecycle
                        .step_stop_target(&inputs, &mut self.contactor, &self.timing)
                } else {
                    self.lifecycle.step(&inputs, &mut self.contactor, &self.timing)
                };
                self.ready_for_work = outcome.ready_for_work;
                if let Some(effect) = outcome.effect {
                    queue(&mut writes, effect_write(effect));
                }
            }
            OperatingMode::On => {
                if let Some(command) = self.contactor.start(feedback) {
                    queue(&mut writes, contactor::command_write(command));
                }
            }
            OperatingMode::Off => {
                if let Some(command) = self.contactor.stop(feedback) {
                    queue(&mut writes, contactor::command_write(command));
                }
            }
            OperatingMode::Configure => {
                let inputs = ConfiguringInputs {
                    now,
                    feedback,
                    auto_set_id: snapshot.auto_set_slaves_id(),
                    auto_set_temperature_id: snapshot.auto_set_slaves_temperature_id(),
                };
                let outcome = self.configuring.step(&inputs, &mut self.contactor);
                for write in outcome.writes {
                    queue(&mut writes, Ok(write));
                }
            }
        }

        self.last_snapshot = snapshot;
        writes
    }

    /// A queued write failed on the wire.
    pub fn on_write_failed(&mut self, write: &RegisterWrite) {
        warn!(
            address = format_args!("{:#06X}", write.address),
            quantity = %write.quantity,
            value = write.value,
            "Register write failed"
        );
        if write.quantity == Quantity::BmsContactorControl {
            self.contactor.on_write_failed();
        }
        if ACTIVATION_QUANTITIES.contains(&write.quantity) {
            self.activation_pending = true;
        }
        self.configuring.on_write_failed(write.address);
    }

    fn queue_activation(&mut self, writes: &mut Writes) {
        let values = [
            i64::from(self.rack.watchdog_s),
            i64::from(self.rack.soc_low_alarm_percent),
            i64::from(self.rack.soc_low_alarm_percent),
        ];
        for (quantity, value) in ACTIVATION_QUANTITIES.into_iter().zip(values) {
            queue(writes, codec::encode(quantity, value));
        }
        self.activation_pending = false;
    }

    fn check_module_count(&mut self, snapshot: &TelemetrySnapshot) {
        let Some(reported) = snapshot.get(Quantity::WorkParameterNumberOfModules) else {
            return;
        };
        if self.reported_modules != Some(reported) {
            if reported != i64::from(self.rack.module_count) {
                warn!(
                    reported,
                    configured = self.rack.module_count,
                    "Rack reports a different number of modules"
                );
            }
            self.reported_modules = Some(reported);
        }
    }

    // ── Outputs ──

    #[inline]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    #[inline]
    pub fn configuring_state(&self) -> ConfiguringState {
        self.configuring.state()
    }

    #[inline]
    pub fn ready_for_work(&self) -> bool {
        self.ready_for_work
    }

    #[inline]
    pub fn limits(&self) -> CurrentLimits {
        self.limits
    }

    pub fn alarms(&self) -> &AlarmReport {
        &self.alarms
    }

    pub fn unsuccessful_starts(&self) -> u32 {
        self.lifecycle.unsuccessful_starts()
    }

    pub fn configuring_completed(&self) -> bool {
        self.configuring.completed()
    }

    #[inline]
    pub fn capacity_wh(&self) -> u32 {
        self.rack
            .module_parameters()
            .rack_capacity_wh(self.rack.module_count)
    }

    pub fn config(&self) -> &RackConfig {
        &self.rack
    }

    /// Snapshot evaluated in the last post-read phase.
    pub fn last_snapshot(&self) -> &TelemetrySnapshot {
        &self.last_snapshot
    }

    pub fn status(&self) -> RackStatus {
        let s = &self.last_snapshot;
        RackStatus {
            state: self.lifecycle.state(),
            configuring_state: self.configuring.state(),
            operating_mode: self.rack.operating_mode,
            target: self.effective_target,
            ready_for_work: self.ready_for_work,
            is_error: self.alarms.is_error(),
            start_attempts_exhausted: self.lifecycle.start_attempts_exhausted(),
            module_count: self.rack.module_count,
            capacity_wh: self.capacity_wh(),
            voltage: s.get(Quantity::Voltage),
            current: s.get(Quantity::Current),
            soc: s.get(Quantity::Soc),
            min_cell_voltage: s.get(Quantity::MinCellVoltage),
            max_cell_voltage: s.get(Quantity::MaxCellVoltage),
            min_cell_temperature: s.get(Quantity::MinCellTemperature),
            max_cell_temperature: s.get(Quantity::MaxCellTemperature),
            charge_max_voltage: s.get(Quantity::ChargeMaxVoltage),
            discharge_min_voltage: s.get(Quantity::DischargeMinVoltage),
            limits: self.limits,
            alarms: self.alarms.active().to_vec(),
        }
    }

    /// One-line human-readable summary.
    pub fn debug_summary(&self) -> String {
        let s = &self.last_snapshot;
        let mut out = String::with_capacity(96);
        let _ = write!(
            out,
            "SoC:{}|Discharge:{};{}|Charge:{};{}|Cell Voltages: Min:{};Max:{}|State:{}",
            Dash(s.get(Quantity::Soc)),
            Dash(s.get(Quantity::DischargeMinVoltage)),
            self.limits.discharge_max_current,
            Dash(s.get(Quantity::ChargeMaxVoltage)),
            self.limits.charge_max_current,
            Dash(s.get(Quantity::MinCellVoltage)),
            Dash(s.get(Quantity::MaxCellVoltage)),
            self.lifecycle.state().as_camel_case(),
        );
        out
    }
}

/// Prints `-` for undetermined values.
struct Dash(Option<i64>);

impl std::fmt::Display for Dash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("-"),
        }
    }
}

fn effect_write(effect: LifecycleEffect) -> Result<RegisterWrite, CodecError> {
    match effect {
        LifecycleEffect::Contactor(command) => contactor::command_write(command),
        LifecycleEffect::Sleep => codec::encode(Quantity::Sleep, i64::from(SYSTEM_SLEEP)),
        LifecycleEffect::Reset => codec::encode(Quantity::SystemReset, i64::from(SYSTEM_RESET)),
    }
}

fn queue(writes: &mut Writes, write: Result<RegisterWrite, CodecError>) {
    match write {
        Ok(write) => {
            if writes.push(write).is_err() {
                error!(address = write.address, "Write queue full, write dropped");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode register write"),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bms_common::config::ConfigLoader;
    use bms_common::rack::alarm::RackAlarm;
    use bms_common::rack::state::ContactorFeedback;
    use std::time::Duration;

    fn config(extra: &str) -> SupervisorConfig {
        let text = format!(
            "[shared]\nservice_name = \"rack-test\"\n\n[rack]\nmodule_count = 4\nwatchdog_s = 90\nsoc_low_alarm_percent = 5\n{extra}\n"
        );
        SupervisorConfig::load_str(&text).unwrap()
    }

    fn snapshot(feedback: ContactorFeedback) -> TelemetrySnapshot {
        TelemetrySnapshot::builder(4)
            .contactor(feedback)
            .value(Quantity::Level2Alarm, 0)
            .build()
    }

    fn addresses(writes: &Writes) -> Vec<u16> {
        writes.iter().map(|w| w.address).collect()
    }

    #[test]
    fn first_cycle_queues_activation_writes_once() {
        let mut c = RackController::new(&config(""));
        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        assert_eq!(addresses(&writes), vec![0x201C, 0x2050, 0x2051]);
        assert_eq!(writes[0].raw, 90);
        assert_eq!(writes[1].raw, 5);

        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        assert_eq!(addresses(&writes), vec![0x2010]);
    }

    #[test]
    fn failed_activation_write_is_requeued() {
        let mut c = RackController::new(&config(""));
        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        c.on_write_failed(&writes[0]);
        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        assert!(addresses(&writes).contains(&0x201C));
    }

    #[test]
    fn ready_for_work_only_when_running() {
        let mut c = RackController::new(&config(""));
        let now = Instant::now();
        c.post_read(now, snapshot(ContactorFeedback::OnGrid));
        assert_eq!(c.lifecycle_state(), LifecycleState::Running);
        assert!(!c.ready_for_work());
        c.post_read(now, snapshot(ContactorFeedback::OnGrid));
        assert!(c.ready_for_work());
    }

    #[test]
    fn level2_alarm_drives_error() {
        let mut c = RackController::new(&config(""));
        let faulted = TelemetrySnapshot::builder(4)
            .contactor(ContactorFeedback::OnGrid)
            .value(Quantity::Level2Alarm, i64::from(RackAlarm::CELL_VOLTAGE_HIGH.bits()))
            .build();
        c.post_read(Instant::now(), faulted.clone());
        assert_eq!(c.lifecycle_state(), LifecycleState::Error);
        let writes = c.post_read(Instant::now(), faulted);
        assert_eq!(addresses(&writes), vec![0x2010]);
        assert_eq!(writes[0].raw, 0);
        assert_eq!(c.lifecycle_state(), LifecycleState::ErrorDelay);
        assert!(c.status().is_error);
    }

    #[test]
    fn target_change_forces_undefined_and_skips_step() {
        let mut c = RackController::new(&config(""));
        let now = Instant::now();
        c.post_read(now, snapshot(ContactorFeedback::OnGrid));
        assert_eq!(c.lifecycle_state(), LifecycleState::Running);

        c.set_start_stop(StartStop::Stop);
        let writes = c.post_read(now, snapshot(ContactorFeedback::OnGrid));
        assert!(writes.is_empty());
        assert_eq!(c.lifecycle_state(), LifecycleState::Undefined);

        let writes = c.post_read(now, snapshot(ContactorFeedback::OnGrid));
        assert_eq!(addresses(&writes), vec![0x2010]);
        assert_eq!(writes[0].raw, 0);
        assert_eq!(c.lifecycle_state(), LifecycleState::Stopping);
    }

    #[test]
    fn target_change_drops_drift_baseline() {
        let mut c = RackController::new(&config(""));
        let now = Instant::now();
        let with_cells = || {
            TelemetrySnapshot::builder(4)
                .contactor(ContactorFeedback::OnGrid)
                .value(Quantity::Level2Alarm, 0)
                .cell_extremes(3400, 7, 3300, 8)
                .build()
        };
        c.post_read(now, with_cells());
        assert!(c.drift.baseline().is_some());

        c.set_start_stop(StartStop::Stop);
        c.post_read(now, with_cells());
        assert_eq!(c.drift.baseline(), None);
    }

    #[test]
    fn forced_target_ignores_host() {
        let mut c = RackController::new(&config("start_stop = \"stop\""));
        c.set_start_stop(StartStop::Start);
        c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        assert_eq!(c.lifecycle_state(), LifecycleState::Off);
        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        assert!(writes.is_empty());
        assert_eq!(c.lifecycle_state(), LifecycleState::Off);
    }

    #[test]
    fn on_mode_starts_once() {
        let mut c = RackController::new(&config("operating_mode = \"on\""));
        let now = Instant::now();
        c.post_read(now, snapshot(ContactorFeedback::CutOff));
        for _ in 0..5 {
            let writes = c.post_read(now, snapshot(ContactorFeedback::CutOff));
            assert!(writes.is_empty());
        }
        assert!(!c.ready_for_work());
    }

    #[test]
    fn off_mode_stops() {
        let mut c = RackController::new(&config("operating_mode = \"off\""));
        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::OnGrid));
        assert_eq!(addresses(&writes), vec![0x201C, 0x2050, 0x2051, 0x2010]);
        assert_eq!(writes[3].raw, 0);
    }

    #[test]
    fn configure_mode_runs_sequencer() {
        let mut c = RackController::new(&config("operating_mode = \"configure\""));
        let writes = c.post_read(Instant::now(), snapshot(ContactorFeedback::CutOff));
        assert_eq!(addresses(&writes), vec![0x201C, 0x2050, 0x2051, 0x20C1]);
        assert_eq!(c.configuring_state(), ConfiguringState::SetIdAutoConfiguring);
        assert_eq!(c.lifecycle_state(), LifecycleState::Undefined);
    }

    #[test]
    fn protection_clamp_needs_previous_ready() {
        let mut c = RackController::new(&config(""));
        let running = TelemetrySnapshot::builder(4)
            .contactor(ContactorFeedback::OnGrid)
            .value(Quantity::BmsChargeMaxCurrent, 50)
            .value(Quantity::BmsDischargeMaxCurrent, 60)
            .value(Quantity::MaxCellVoltage, 3300)
            .value(Quantity::MinCellVoltage, 3250)
            .value(Quantity::ClusterMaxCellTemperature, 250)
            .value(Quantity::ClusterMinCellTemperature, 240)
            .build();
        let now = Instant::now();
        assert_eq!(c.pre_read(), CurrentLimits::ZERO);
        c.post_read(now, running.clone());
        assert_eq!(c.pre_read(), CurrentLimits::ZERO);
        c.post_read(now + Duration::from_secs(1), running);
        let limits = c.pre_read();
        assert_eq!(limits.charge_max_current, 50);
        assert_eq!(limits.discharge_max_current, 60);
    }

    #[test]
    fn debug_summary_marks_missing_values() {
        let c = RackController::new(&config(""));
        assert_eq!(
            c.debug_summary(),
            "SoC:-|Discharge:-;0|Charge:-;0|Cell Voltages: Min:-;Max:-|State:Undefined"
        );
    }

    #[test]
    fn debug_summary_with_values() {
        let mut c = RackController::new(&config(""));
        let s = TelemetrySnapshot::builder(4)
            .contactor(ContactorFeedback::OnGrid)
            .value(Quantity::Soc, 77)
            .value(Quantity::ChargeMaxVoltage, 876)
            .value(Quantity::DischargeMinVoltage, 696)
            .cell_extremes(3320, 4, 3290, 17)
            .build();
        c.post_read(Instant::now(), s);
        assert_eq!(
            c.debug_summary(),
            "SoC:77|Discharge:696;0|Charge:876;0|Cell Voltages: Min:3290;Max:3320|State:Running"
        );
    }

    #[test]
    fn capacity_follows_module_type() {
        let c = RackController::new(&config("module_type = \"module_3_5_kwh\""));
        assert_eq!(c.capacity_wh(), 14_000);
        assert_eq!(c.status().capacity_wh, 14_000);
    }

    #[test]
    fn status_serializes_to_json() {
        let c = RackController::new(&config(""));
        let json = serde_json::to_value(c.status()).unwrap();
        assert_eq!(json["state"], "Undefined");
        assert_eq!(json["module_count"], 4);
        assert_eq!(json["ready_for_work"], false);
    }
}
