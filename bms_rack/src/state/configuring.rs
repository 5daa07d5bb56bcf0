//! Slave auto-discovery and voltage-range provisioning.
//!
//! Runs instead of the lifecycle in CONFIGURE mode. One step per cycle;
//! every write is fire-and-forget and confirmed only by polling a result
//! register on a later cycle.
//!
//! ```text
//! NONE → STARTED → SET_ID → CHECK_ID ─┬→ SET_TEMP_ID → CHECK_TEMP_ID ─┬→ SET_VOLTAGE_RANGES
//!           ↑                         │                               │          │
//!           └──────── FAILURE ────────┴───────────────────────────────┘          ↓
//!                                            NONE ← RESTART_AFTER_SETTING ← FINISHED
//! ```

use std::time::Instant;

use bms_common::consts::{AUTO_ID_SETTLE_DELAY, CONFIGURING_FINISHED_DELAY, SYSTEM_RESET};
use bms_common::rack::module::ModuleParameters;
use bms_common::rack::state::{AutoSetFunction, ConfiguringState, ContactorFeedback};
use heapless::Vec;
use tracing::{error, info, warn};

use crate::codec::{self, CodecError, Quantity, RegisterWrite};
use crate::contactor::{self, ContactorDriver};

/// Writes of the voltage-range step, the largest step.
pub const VOLTAGE_RANGE_WRITES: usize = 8;

/// Writes produced by one sequencer step.
pub type StepWrites = Vec<RegisterWrite, VOLTAGE_RANGE_WRITES>;

/// Per-cycle inputs of the sequencer.
#[derive(Debug, Clone, Copy)]
pub struct ConfiguringInputs {
    pub now: Instant,
    pub feedback: Option<ContactorFeedback>,
    pub auto_set_id: Option<AutoSetFunction>,
    pub auto_set_temperature_id: Option<AutoSetFunction>,
}

/// Result of one sequencer step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfiguringOutcome {
    pub writes: StepWrites,
    pub transition: Option<(ConfiguringState, ConfiguringState)>,
}

/// Auto-ID and provisioning sequence state.
#[derive(Debug, Clone)]
pub struct ConfiguringSequencer {
    module_count: u8,
    parameters: ModuleParameters,
    state: ConfiguringState,
    auto_id_requested_at: Option<Instant>,
    finished_at: Option<Instant>,
    completed: bool,
    /// Step that produced the writes of the current cycle.
    last_step: ConfiguringState,
    produced: Vec<u16, VOLTAGE_RANGE_WRITES>,
}

impl ConfiguringSequencer {
    pub fn new(module_count: u8, parameters: ModuleParameters) -> Self {
        Self {
            module_count,
            parameters,
            state: ConfiguringState::None,
            auto_id_requested_at: None,
            finished_at: None,
            completed: false,
            last_step: ConfiguringState::None,
            produced: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> ConfiguringState {
        self.state
    }

    /// True once a full run reached NONE again. Cleared by [`reset`](Self::reset).
    #[inline]
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Discard all progress. The next step starts from the beginning.
    pub fn reset(&mut self) {
        if self.state != ConfiguringState::None {
            info!(from = ?self.state, "Configuring cancelled");
        }
        self.state = ConfiguringState::None;
        self.auto_id_requested_at = None;
        self.finished_at = None;
        self.completed = false;
        self.last_step = ConfiguringState::None;
        self.produced.clear();
    }

    /// A write failed. If this sequencer produced it, redo that step.
    pub fn on_write_failed(&mut self, address: u16) {
        if !self.produced.contains(&address) {
            return;
        }
        warn!(
            address = format_args!("{address:#06X}"),
            step = ?self.last_step,
            "Configuring write failed, repeating step"
        );
        self.state = self.last_step;
        self.completed = false;
        self.produced.clear();
    }

    /// Advance one cycle.
    pub fn step(
        &mut self,
        inputs: &ConfiguringInputs,
        contactor: &mut ContactorDriver,
    ) -> ConfiguringOutcome {
        let from = self.state;
        let mut outcome = ConfiguringOutcome::default();
        self.produced.clear();

        if self.state == ConfiguringState::None {
            if self.completed {
                return outcome;
            }
            self.state = ConfiguringState::ConfiguringStarted;
        }
        self.last_step = self.state;

        let result = match self.state {
            ConfiguringState::None => Ok(()),
            ConfiguringState::ConfiguringStarted => self.step_started(&mut outcome.writes),
            ConfiguringState::SetIdAutoConfiguring => self.step_set_auto_id(
                inputs,
                Quantity::AutoSetSlavesId,
                ConfiguringState::CheckIdAutoConfiguring,
                &mut outcome.writes,
            ),
            ConfiguringState::CheckIdAutoConfiguring => {
                self.step_check_auto_id(
                    inputs,
                    inputs.auto_set_id,
                    ConfiguringState::SetTemperatureIdAutoConfiguring,
                );
                Ok(())
            }
            ConfiguringState::SetTemperatureIdAutoConfiguring => self.step_set_auto_id(
                inputs,
                Quantity::AutoSetSlavesTemperatureId,
                ConfiguringState::CheckTemperatureIdAutoConfiguring,
                &mut outcome.writes,
            ),
            ConfiguringState::CheckTemperatureIdAutoConfiguring => {
                self.step_check_auto_id(
                    inputs,
                    inputs.auto_set_temperature_id,
                    ConfiguringState::SetVoltageRanges,
                );
                Ok(())
            }
            ConfiguringState::SetVoltageRanges => {
                self.step_voltage_ranges(inputs, &mut outcome.writes)
            }
            ConfiguringState::ConfiguringFinished => self.step_finished(inputs, &mut outcome.writes),
            ConfiguringState::RestartAfterSetting => {
                self.step_restart(inputs, contactor, &mut outcome.writes)
            }
        };

        if let Err(e) = result {
            error!(step = ?self.last_step, error = %e, "Configuring step could not encode its writes");
            outcome.writes.clear();
            self.state = self.last_step;
        }

        for write in &outcome.writes {
            let pushed = self.produced.push(write.address);
            debug_assert!(pushed.is_ok(), "produced addresses exceed the write queue");
        }
        if self.state != from {
            info!(from = ?from, to = ?self.state, "Configuring step");
            outcome.transition = Some((from, self.state));
        }
        outcome
    }

    // ── Steps ──

    fn step_started(&mut self, writes: &mut StepWrites) -> Result<(), CodecError> {
        push(
            writes,
            codec::encode(Quantity::WorkParameterNumberOfModules, i64::from(self.module_count))?,
        );
        self.state = ConfiguringState::SetIdAutoConfiguring;
        Ok(())
    }

    fn step_set_auto_id(
        &mut self,
        inputs: &ConfiguringInputs,
        register: Quantity,
        next: ConfiguringState,
        writes: &mut StepWrites,
    ) -> Result<(), CodecError> {
        push(
            writes,
            codec::encode(register, AutoSetFunction::StartAutoSetting as i64)?,
        );
        self.auto_id_requested_at = Some(inputs.now);
        self.state = next;
        Ok(())
    }

    fn step_check_auto_id(
        &mut self,
        inputs: &ConfiguringInputs,
        result: Option<AutoSetFunction>,
        next: ConfiguringState,
    ) {
        if let Some(requested) = self.auto_id_requested_at {
            if inputs.now <= requested + AUTO_ID_SETTLE_DELAY {
                return;
            }
        }
        match result {
            Some(AutoSetFunction::Failure) => {
                warn!(step = ?self.state, "Auto-ID failed, restarting configuring");
                self.auto_id_requested_at = None;
                self.state = ConfiguringState::ConfiguringStarted;
            }
            Some(AutoSetFunction::Success) => {
                self.auto_id_requested_at = None;
                self.state = next;
            }
            _ => {}
        }
    }

    fn step_voltage_ranges(
        &mut self,
        inputs: &ConfiguringInputs,
        writes: &mut StepWrites,
    ) -> Result<(), CodecError> {
        let n = i64::from(self.module_count);
        let p = &self.parameters;
        let ranges = [
            (Quantity::WarnSystemOverVoltageAlarm, p.level1_over_voltage_mv),
            (Quantity::WarnSystemOverVoltageRecover, p.level1_over_voltage_recover_mv),
            (Quantity::WarnSystemUnderVoltageAlarm, p.level1_under_voltage_mv),
            (Quantity::WarnSystemUnderVoltageRecover, p.level1_under_voltage_recover_mv),
            (Quantity::StopSystemOverVoltageProtection, p.level2_over_voltage_mv),
            (Quantity::StopSystemOverVoltageRecover, p.level2_over_voltage_recover_mv),
            (Quantity::StopSystemUnderVoltageProtection, p.level2_under_voltage_mv),
            (Quantity::StopSystemUnderVoltageRecover, p.level2_under_voltage_recover_mv),
        ];

        // Encode everything before queueing anything.
        let mut encoded = StepWrites::new();
        for (quantity, per_module) in ranges {
            push(&mut encoded, codec::encode(quantity, n * i64::from(per_module))?);
        }
        *writes = encoded;

        self.finished_at = Some(inputs.now);
        self.state = ConfiguringState::ConfiguringFinished;
        Ok(())
    }

    fn step_finished(
        &mut self,
        inputs: &ConfiguringInputs,
        writes: &mut StepWrites,
    ) -> Result<(), CodecError> {
        if let Some(finished) = self.finished_at {
            if inputs.now <= finished + CONFIGURING_FINISHED_DELAY {
                return Ok(());
            }
        }
        push(writes, codec::encode(Quantity::SystemReset, i64::from(SYSTEM_RESET))?);
        self.finished_at = None;
        self.state = ConfiguringState::RestartAfterSetting;
        Ok(())
    }

    fn step_restart(
        &mut self,
        inputs: &ConfiguringInputs,
        contactor: &mut ContactorDriver,
        writes: &mut StepWrites,
    ) -> Result<(), CodecError> {
        if let Some(command) = contactor.start(inputs.feedback) {
            push(writes, contactor::command_write(command)?);
        }
        info!("Configuring finished");
        self.completed = true;
        self.state = ConfiguringState::None;
        Ok(())
    }
}

fn push(writes: &mut StepWrites, write: RegisterWrite) {
    if writes.push(write).is_err() {
        error!(address = write.address, "Configuring write queue full, write dropped");
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
