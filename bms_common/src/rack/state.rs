//! State machine and register enums for the rack supervisor.
//!
//! Supervisor-side enums (lifecycle, drift recovery, configuring, operating
//! mode, start/stop target) and device-side enums decoded from single
//! registers. Device enums keep the exact wire values of the rack firmware.

use serde::{Deserialize, Serialize};

// ─── Supervisor State ───────────────────────────────────────────────

/// Top-level supervisory lifecycle state.
///
/// Perpetual loop without a terminal state. After a restart the machine
/// begins in `Undefined` and re-derives its position from contactor feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LifecycleState {
    /// Position unknown; resolved from feedback on the next step.
    Undefined = 0,
    /// Contactor open, about to issue START.
    Off = 1,
    /// START issued, waiting for ON_GRID within the start deadline.
    Init = 2,
    /// Contactor closed, ready for work.
    Running = 3,
    /// STOP issued, waiting for CUT_OFF.
    Stopping = 4,
    /// Fault detected; STOP is issued on the next step.
    Error = 5,
    /// Waiting out the error delay.
    ErrorDelay = 6,
    /// Ambiguous feedback, bounded wait.
    Pending = 7,
    /// Sleep/reset recovery after a cell-voltage drift.
    ErrorCellVoltagesDrift = 8,
}

impl LifecycleState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Undefined),
            1 => Some(Self::Off),
            2 => Some(Self::Init),
            3 => Some(Self::Running),
            4 => Some(Self::Stopping),
            5 => Some(Self::Error),
            6 => Some(Self::ErrorDelay),
            7 => Some(Self::Pending),
            8 => Some(Self::ErrorCellVoltagesDrift),
            _ => None,
        }
    }

    /// CamelCase name used in the debug summary.
    pub const fn as_camel_case(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Off => "Off",
            Self::Init => "Init",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Error => "Error",
            Self::ErrorDelay => "Errordelay",
            Self::Pending => "Pending",
            Self::ErrorCellVoltagesDrift => "ErrorCellVoltagesDrift",
        }
    }
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Undefined
    }
}

/// Drift recovery sub-sequence, advanced one step per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DriftRecoveryStep {
    None = 0,
    /// Next step writes the sleep register.
    Sleep = 1,
    /// Next step writes the system-reset register.
    Reset = 2,
    /// Next step returns the lifecycle to `Undefined`.
    Finished = 3,
}

impl DriftRecoveryStep {
    /// Successor step; `Finished` wraps to `None`.
    #[inline]
    pub const fn next(self) -> Self {
        match self {
            Self::None => Self::Sleep,
            Self::Sleep => Self::Reset,
            Self::Reset => Self::Finished,
            Self::Finished => Self::None,
        }
    }
}

impl Default for DriftRecoveryStep {
    fn default() -> Self {
        Self::None
    }
}

/// Slave auto-discovery and threshold provisioning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConfiguringState {
    None = 0,
    ConfiguringStarted = 1,
    SetIdAutoConfiguring = 2,
    CheckIdAutoConfiguring = 3,
    SetTemperatureIdAutoConfiguring = 4,
    CheckTemperatureIdAutoConfiguring = 5,
    SetVoltageRanges = 6,
    ConfiguringFinished = 7,
    RestartAfterSetting = 8,
}

impl ConfiguringState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::ConfiguringStarted),
            2 => Some(Self::SetIdAutoConfiguring),
            3 => Some(Self::CheckIdAutoConfiguring),
            4 => Some(Self::SetTemperatureIdAutoConfiguring),
            5 => Some(Self::CheckTemperatureIdAutoConfiguring),
            6 => Some(Self::SetVoltageRanges),
            7 => Some(Self::ConfiguringFinished),
            8 => Some(Self::RestartAfterSetting),
            _ => None,
        }
    }
}

impl Default for ConfiguringState {
    fn default() -> Self {
        Self::None
    }
}

/// Operating mode selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    /// Run the lifecycle state machine.
    #[default]
    Default,
    /// Issue START unconditionally.
    On,
    /// Issue STOP unconditionally.
    Off,
    /// Run the configuring sequence.
    Configure,
}

/// Commanded start/stop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartStop {
    #[default]
    Undefined,
    Start,
    Stop,
}

/// Where the start/stop target comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartStopConfig {
    /// Follow the host's commanded target.
    #[default]
    Auto,
    /// Force START.
    Start,
    /// Force STOP.
    Stop,
}

// ─── Device Enums ───────────────────────────────────────────────────

/// Contactor command written to the BMS contactor control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ContactorCommand {
    Stop = 0,
    Start = 1,
}

/// Observed contactor feedback read back from the contactor control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ContactorFeedback {
    CutOff = 0,
    ConnectionInitiating = 1,
    OnGrid = 3,
    /// A value was read but matches no known feedback (2, or 4 and up).
    Undefined = 0xFFFF,
}

impl ContactorFeedback {
    #[inline]
    pub const fn from_raw(value: i64) -> Self {
        match value {
            0 => Self::CutOff,
            1 => Self::ConnectionInitiating,
            3 => Self::OnGrid,
            _ => Self::Undefined,
        }
    }

    /// True for every value except [`ContactorFeedback::Undefined`].
    #[inline]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Undefined)
    }
}

/// Result/command values of the auto-set registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum AutoSetFunction {
    Init = 0,
    StartAutoSetting = 1,
    Success = 2,
    Failure = 3,
}

impl AutoSetFunction {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::StartAutoSetting),
            2 => Some(Self::Success),
            3 => Some(Self::Failure),
            _ => None,
        }
    }
}

/// Charge direction reported by the summary block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ChargeIndication {
    Standing = 0,
    Discharging = 1,
    Charging = 2,
}

impl ChargeIndication {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Standing),
            1 => Some(Self::Discharging),
            2 => Some(Self::Charging),
            _ => None,
        }
    }
}

/// Cluster run state from the critical block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ClusterRunState {
    Normal = 0,
    StopCharging = 1,
    StopDischarge = 2,
    Standby = 3,
}

impl ClusterRunState {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::StopCharging),
            2 => Some(Self::StopDischarge),
            3 => Some(Self::Standby),
            _ => None,
        }
    }
}

/// Fan status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum FanStatus {
    Open = 1,
    Close = 2,
}

impl FanStatus {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Open),
            2 => Some(Self::Close),
            _ => None,
        }
    }
}

/// Main contactor state and pre-contactor status registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ContactorState {
    Start = 1,
    Open = 2,
}

impl ContactorState {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Start),
            2 => Some(Self::Open),
            _ => None,
        }
    }
}

/// System run mode register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum SystemRunMode {
    Normal = 0,
    Debug = 1,
}

impl SystemRunMode {
    #[inline]
    pub const fn from_raw(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Debug),
            _ => None,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_state_roundtrips_through_u8() {
        for raw in 0..=8u8 {
            let state = LifecycleState::from_u8(raw).unwrap();
            assert_eq!(state as u8, raw);
        }
        assert_eq!(LifecycleState::from_u8(9), None);
        assert_eq!(LifecycleState::default(), LifecycleState::Undefined);
    }

    #[test]
    fn drift_recovery_cycles_back_to_none() {
        let mut step = DriftRecoveryStep::None;
        let mut seen = Vec::new();
        for _ in 0..4 {
            step = step.next();
            seen.push(step);
        }
        assert_eq!(
            seen,
            vec![
                DriftRecoveryStep::Sleep,
                DriftRecoveryStep::Reset,
                DriftRecoveryStep::Finished,
                DriftRecoveryStep::None,
            ]
        );
    }

    #[test]
    fn contactor_feedback_skips_value_two() {
        assert_eq!(ContactorFeedback::from_raw(0), ContactorFeedback::CutOff);
        assert_eq!(
            ContactorFeedback::from_raw(1),
            ContactorFeedback::ConnectionInitiating
        );
        assert_eq!(ContactorFeedback::from_raw(2), ContactorFeedback::Undefined);
        assert_eq!(ContactorFeedback::from_raw(3), ContactorFeedback::OnGrid);
        assert_eq!(ContactorFeedback::from_raw(9), ContactorFeedback::Undefined);
        assert!(!ContactorFeedback::Undefined.is_known());
        assert!(ContactorFeedback::CutOff.is_known());
    }

    #[test]
    fn auto_set_function_wire_values() {
        assert_eq!(AutoSetFunction::StartAutoSetting as u16, 1);
        assert_eq!(AutoSetFunction::from_raw(2), Some(AutoSetFunction::Success));
        assert_eq!(AutoSetFunction::from_raw(3), Some(AutoSetFunction::Failure));
        assert_eq!(AutoSetFunction::from_raw(7), None);
    }

    #[test]
    fn camel_case_names_for_debug_summary() {
        assert_eq!(LifecycleState::ErrorDelay.as_camel_case(), "Errordelay");
        assert_eq!(
            LifecycleState::ErrorCellVoltagesDrift.as_camel_case(),
            "ErrorCellVoltagesDrift"
        );
    }

    #[test]
    fn operating_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: OperatingMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"configure\"").unwrap();
        assert_eq!(parsed.mode, OperatingMode::Configure);
    }
}
