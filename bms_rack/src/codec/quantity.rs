//! Semantic quantities decoded from the rack register map.
//!
//! One variant per target field of the register table. The discriminant is
//! the quantity's index into a decoded value vector, so variants are kept
//! in register-address order and must stay dense.

use serde::Serialize;

/// A decoded semantic value.
///
/// Units follow the fan-out target: `Voltage`, `Current`, `ChargeMaxVoltage`
/// and `DischargeMinVoltage` are in V/A, cluster and threshold voltages in
/// mV, cell temperatures in deci-degree Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u16)]
pub enum Quantity {
    // ── Main control block (0x2000..=0x201E) ──
    FanStatus,
    MainContactorState,
    DryContact1Export,
    DryContact2Export,
    SystemReset,
    SystemRunMode,
    PreContactorStatus,
    AlarmFlagStatus,
    ProtectFlagStatus,
    AlarmFlagRegister1,
    AlarmFlagRegister2,
    ProtectFlagRegister1,
    ProtectFlagRegister2,
    ShortCircuitFunction,
    TestingIo,
    SoftShutdown,
    BmsContactorControl,
    CurrentBoxSelfCalibration,
    PcsAlarmReset,
    InsulationSensorFunction,
    AutoSetSlavesId,
    AutoSetSlavesTemperatureId,
    TransparentMaster,
    SetEmsAddress,
    EmsCommunicationTimeout,
    Sleep,
    VoltageLowProtection,

    // ── Stop (level-2 protection) parameters (0x2040..=0x2061) ──
    StopCellOverVoltageProtection,
    StopCellOverVoltageRecover,
    StopSystemOverVoltageProtection,
    StopSystemOverVoltageRecover,
    StopSystemChargeOverCurrentProtection,
    StopSystemChargeOverCurrentRecover,
    StopCellUnderVoltageProtection,
    StopCellUnderVoltageRecover,
    StopSystemUnderVoltageProtection,
    StopSystemUnderVoltageRecover,
    StopSystemDischargeOverCurrentProtection,
    StopSystemDischargeOverCurrentRecover,
    StopCellOverTemperatureProtection,
    StopCellOverTemperatureRecover,
    StopCellUnderTemperatureProtection,
    StopCellUnderTemperatureRecover,
    StopSocLowProtection,
    StopSocLowProtectionRecover,
    StopSocHighProtection,
    StopSocHighProtectionRecover,
    StopConnectorTemperatureHighProtection,
    StopConnectorTemperatureHighProtectionRecover,
    StopInsulationProtection,
    StopInsulationProtectionRecover,
    StopCellVoltageDifferenceProtection,
    StopCellVoltageDifferenceProtectionRecover,
    StopTotalVoltageDifferenceProtection,
    StopTotalVoltageDifferenceProtectionRecover,
    StopDischargeTemperatureHighProtection,
    StopDischargeTemperatureHighProtectionRecover,
    StopDischargeTemperatureLowProtection,
    StopDischargeTemperatureLowProtectionRecover,
    StopTemperatureDifferenceProtection,
    StopTemperatureDifferenceProtectionRecover,

    // ── Warn (level-1 alarm) parameters (0x2080..=0x20A2) ──
    WarnCellOverVoltageAlarm,
    WarnCellOverVoltageRecover,
    WarnSystemOverVoltageAlarm,
    ChargeMaxVoltage,
    WarnSystemOverVoltageRecover,
    WarnSystemChargeOverCurrentAlarm,
    WarnSystemChargeOverCurrentRecover,
    WarnCellUnderVoltageAlarm,
    WarnCellUnderVoltageRecover,
    WarnSystemUnderVoltageAlarm,
    DischargeMinVoltage,
    WarnSystemUnderVoltageRecover,
    WarnSystemDischargeOverCurrentAlarm,
    WarnSystemDischargeOverCurrentRecover,
    WarnCellOverTemperatureAlarm,
    WarnCellOverTemperatureRecover,
    WarnCellUnderTemperatureAlarm,
    WarnCellUnderTemperatureRecover,
    WarnSocLowAlarm,
    WarnSocLowAlarmRecover,
    WarnSocHighAlarm,
    WarnSocHighAlarmRecover,
    WarnConnectorTemperatureHighAlarm,
    WarnConnectorTemperatureHighAlarmRecover,
    WarnInsulationAlarm,
    WarnInsulationAlarmRecover,
    WarnCellVoltageDifferenceAlarm,
    WarnCellVoltageDifferenceAlarmRecover,
    WarnTotalVoltageDifferenceAlarm,
    WarnTotalVoltageDifferenceAlarmRecover,
    WarnDischargeTemperatureHighAlarm,
    WarnDischargeTemperatureHighAlarmRecover,
    WarnDischargeTemperatureLowAlarm,
    WarnDischargeTemperatureLowAlarmRecover,
    WarnTemperatureDifferenceAlarm,
    WarnTemperatureDifferenceAlarmRecover,

    // ── Work parameters ──
    WorkParameterNumberOfModules,
    SetSoc,

    // ── Summary state (0x2100..=0x211A) ──
    ClusterVoltage,
    Voltage,
    ClusterCurrent,
    Current,
    ChargeIndication,
    Soc,
    Soh,
    MaxCellVoltageId,
    MaxCellVoltage,
    MinCellVoltageId,
    MinCellVoltage,
    MaxCellTemperatureId,
    ClusterMaxCellTemperature,
    MaxCellTemperature,
    MinCellTemperatureId,
    ClusterMinCellTemperature,
    MinCellTemperature,
    MaxCellResistanceId,
    MaxCellResistance,
    MinCellResistanceId,
    MinCellResistance,
    PositiveInsulation,
    NegativeInsulation,
    MainContactorFlag,
    EnvironmentTemperature,
    SystemInsulation,
    CellVoltageDifference,
    TotalVoltageDifference,
    PowerTemperature,
    PowerSupplyVoltage,

    // ── Critical state (0x2140..=0x2161) ──
    Level2Alarm,
    Level1Alarm,
    ClusterRunState,
    MaxCellVoltageNumberWhenAlarm,
    MaxCellVoltageWhenAlarm,
    MaxCellVoltageNumberWhenStopped,
    MaxCellVoltageWhenStopped,
    MinCellVoltageNumberWhenAlarm,
    MinCellVoltageWhenAlarm,
    MinCellVoltageNumberWhenStopped,
    MinCellVoltageWhenStopped,
    OverVoltageValueWhenAlarm,
    OverVoltageValueWhenStopped,
    UnderVoltageValueWhenAlarm,
    UnderVoltageValueWhenStopped,
    OverChargeCurrentWhenAlarm,
    OverChargeCurrentWhenStopped,
    OverDischargeCurrentWhenAlarm,
    OverDischargeCurrentWhenStopped,
    NumberOfTemperatureWhenAlarm,
    OtherAlarmEquipmentFailure,
    BmsChargeMaxCurrent,
    BmsDischargeMaxCurrent,

    // ── History / diagnostics (0x2180..=0x21B5) ──
    CycleCount,
    TotalCapacity,
    SlaveCommErrorHigh,
    SlaveCommErrorLow,
    HardwareFailure,
    SystemTime,
    LastChargeCapacity,
    LastChargeEndTime,
    LastDischargeCapacity,
    LastDischargeEndTime,
    CellOverVoltageStopTimes,
    BatteryOverVoltageStopTimes,
    BatteryChargeOverCurrentStopTimes,
    CellVoltageLowStopTimes,
    BatteryVoltageLowStopTimes,
    BatteryDischargeOverCurrentStopTimes,
    BatteryOverTemperatureStopTimes,
    BatteryTemperatureLowStopTimes,
    CellOverVoltageAlarmTimes,
    BatteryOverVoltageAlarmTimes,
    BatteryChargeOverCurrentAlarmTimes,
    CellVoltageLowAlarmTimes,
    BatteryVoltageLowAlarmTimes,
    BatteryDischargeOverCurrentAlarmTimes,
    BatteryOverTemperatureAlarmTimes,
    BatteryTemperatureLowAlarmTimes,
    SystemShortCircuitProtectionTimes,
    SystemGrOverTemperatureStopTimes,
    SystemGrOverTemperatureAlarmTimes,
    BatteryVoltageDifferenceAlarmTimes,
    BatteryVoltageDifferenceStopTimes,
    SlaveTemperatureCommErrorHigh,
    SlaveTemperatureCommErrorLow,
}

impl Quantity {
    /// Number of quantities; length of a decoded value vector.
    pub const COUNT: usize = Self::SlaveTemperatureCommErrorLow as usize + 1;

    /// Index into a decoded value vector.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}
