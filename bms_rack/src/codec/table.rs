//! The rack register table.
//!
//! One ordered, data-driven list of every register field the supervisor
//! decodes or encodes, plus the per-module cell blocks. All conversions go
//! through the generic routines in [`super`].

use bms_common::consts::{SENSORS_PER_MODULE, TEMPERATURE_ADDRESS_OFFSET, VOLTAGE_ADDRESS_OFFSET};

use super::field::{Access, FieldKind, RegisterField, Target};
use super::quantity::Quantity;

macro_rules! reg {
    ($addr:literal, $kind:ident, $access:ident, $q:ident) => {
        reg!($addr, 1, $kind, $access, [($q, 0)])
    };
    ($addr:literal, $kind:ident, $access:ident, $q:ident, $e:literal) => {
        reg!($addr, 1, $kind, $access, [($q, $e)])
    };
    ($addr:literal, $words:literal, $kind:ident, $access:ident, [$(($q:ident, $e:literal)),+ $(,)?]) => {
        RegisterField {
            address: $addr,
            words: $words,
            kind: FieldKind::$kind,
            access: Access::$access,
            targets: &[$(Target { quantity: Quantity::$q, exponent: $e }),+],
        }
    };
}

/// Every register field, sorted by address.
pub static REGISTER_TABLE: &[RegisterField] = &[
    // ── Main control ──
    reg!(0x2000, Unsigned, Read, FanStatus),
    reg!(0x2001, Unsigned, Read, MainContactorState),
    reg!(0x2002, Unsigned, Read, DryContact1Export),
    reg!(0x2003, Unsigned, Read, DryContact2Export),
    reg!(0x2004, Unsigned, ReadWrite, SystemReset),
    reg!(0x2005, Unsigned, Read, SystemRunMode),
    reg!(0x2006, Unsigned, Read, PreContactorStatus),
    reg!(0x2007, Bits, Read, AlarmFlagStatus),
    reg!(0x2008, Bits, Read, ProtectFlagStatus),
    reg!(0x2009, Unsigned, Read, AlarmFlagRegister1),
    reg!(0x200A, Unsigned, Read, AlarmFlagRegister2),
    reg!(0x200B, Unsigned, Read, ProtectFlagRegister1),
    reg!(0x200C, Unsigned, Read, ProtectFlagRegister2),
    reg!(0x200D, Unsigned, Read, ShortCircuitFunction),
    reg!(0x200E, Unsigned, Read, TestingIo),
    reg!(0x200F, Unsigned, Read, SoftShutdown),
    reg!(0x2010, Unsigned, ReadWrite, BmsContactorControl),
    reg!(0x2011, Unsigned, Read, CurrentBoxSelfCalibration),
    reg!(0x2012, Unsigned, Read, PcsAlarmReset),
    reg!(0x2013, Unsigned, Read, InsulationSensorFunction),
    reg!(0x2014, Unsigned, ReadWrite, AutoSetSlavesId),
    reg!(0x2019, Unsigned, ReadWrite, AutoSetSlavesTemperatureId),
    reg!(0x201A, Unsigned, Read, TransparentMaster),
    reg!(0x201B, Unsigned, Read, SetEmsAddress),
    reg!(0x201C, Unsigned, ReadWrite, EmsCommunicationTimeout),
    reg!(0x201D, Unsigned, ReadWrite, Sleep),
    reg!(0x201E, Unsigned, Read, VoltageLowProtection),
    // ── Stop parameters ──
    reg!(0x2040, Unsigned, ReadWrite, StopCellOverVoltageProtection),
    reg!(0x2041, Unsigned, ReadWrite, StopCellOverVoltageRecover),
    reg!(0x2042, Unsigned, ReadWrite, StopSystemOverVoltageProtection, 2),
    reg!(0x2043, Unsigned, ReadWrite, StopSystemOverVoltageRecover, 2),
    reg!(0x2044, Unsigned, ReadWrite, StopSystemChargeOverCurrentProtection, 2),
    reg!(0x2045, Unsigned, ReadWrite, StopSystemChargeOverCurrentRecover, 2),
    reg!(0x2046, Unsigned, ReadWrite, StopCellUnderVoltageProtection),
    reg!(0x2047, Unsigned, ReadWrite, StopCellUnderVoltageRecover),
    reg!(0x2048, Unsigned, ReadWrite, StopSystemUnderVoltageProtection, 2),
    reg!(0x2049, Unsigned, ReadWrite, StopSystemUnderVoltageRecover, 2),
    reg!(0x204A, Unsigned, ReadWrite, StopSystemDischargeOverCurrentProtection, 2),
    reg!(0x204B, Unsigned, ReadWrite, StopSystemDischargeOverCurrentRecover, 2),
    reg!(0x204C, Signed, ReadWrite, StopCellOverTemperatureProtection),
    reg!(0x204D, Signed, ReadWrite, StopCellOverTemperatureRecover),
    reg!(0x204E, Signed, ReadWrite, StopCellUnderTemperatureProtection),
    reg!(0x204F, Signed, ReadWrite, StopCellUnderTemperatureRecover),
    reg!(0x2050, Unsigned, ReadWrite, StopSocLowProtection),
    reg!(0x2051, Unsigned, ReadWrite, StopSocLowProtectionRecover),
    reg!(0x2052, Unsigned, ReadWrite, StopSocHighProtection),
    reg!(0x2053, Unsigned, ReadWrite, StopSocHighProtectionRecover),
    reg!(0x2054, Signed, ReadWrite, StopConnectorTemperatureHighProtection),
    reg!(0x2055, Signed, ReadWrite, StopConnectorTemperatureHighProtectionRecover),
    reg!(0x2056, Unsigned, ReadWrite, StopInsulationProtection),
    reg!(0x2057, Unsigned, ReadWrite, StopInsulationProtectionRecover),
    reg!(0x2058, Unsigned, ReadWrite, StopCellVoltageDifferenceProtection),
    reg!(0x2059, Unsigned, ReadWrite, StopCellVoltageDifferenceProtectionRecover),
    reg!(0x205A, Unsigned, ReadWrite, StopTotalVoltageDifferenceProtection, 2),
    reg!(0x205B, Unsigned, ReadWrite, StopTotalVoltageDifferenceProtectionRecover, 2),
    reg!(0x205C, Signed, ReadWrite, StopDischargeTemperatureHighProtection),
    reg!(0x205D, Signed, ReadWrite, StopDischargeTemperatureHighProtectionRecover),
    reg!(0x205E, Signed, ReadWrite, StopDischargeTemperatureLowProtection),
    reg!(0x205F, Signed, ReadWrite, StopDischargeTemperatureLowProtectionRecover),
    reg!(0x2060, Signed, ReadWrite, StopTemperatureDifferenceProtection),
    reg!(0x2061, Signed, ReadWrite, StopTemperatureDifferenceProtectionRecover),
    // ── Warn parameters ──
    reg!(0x2080, Unsigned, ReadWrite, WarnCellOverVoltageAlarm),
    reg!(0x2081, Unsigned, ReadWrite, WarnCellOverVoltageRecover),
    reg!(0x2082, 1, Unsigned, ReadWrite, [(WarnSystemOverVoltageAlarm, 2), (ChargeMaxVoltage, -1)]),
    reg!(0x2083, Unsigned, ReadWrite, WarnSystemOverVoltageRecover, 2),
    reg!(0x2084, Unsigned, ReadWrite, WarnSystemChargeOverCurrentAlarm, 2),
    reg!(0x2085, Unsigned, ReadWrite, WarnSystemChargeOverCurrentRecover, 2),
    reg!(0x2086, Unsigned, ReadWrite, WarnCellUnderVoltageAlarm),
    reg!(0x2087, Unsigned, ReadWrite, WarnCellUnderVoltageRecover),
    reg!(0x2088, 1, Unsigned, ReadWrite, [(WarnSystemUnderVoltageAlarm, 2), (DischargeMinVoltage, -1)]),
    reg!(0x2089, Unsigned, ReadWrite, WarnSystemUnderVoltageRecover, 2),
    reg!(0x208A, Unsigned, ReadWrite, WarnSystemDischargeOverCurrentAlarm, 2),
    reg!(0x208B, Unsigned, ReadWrite, WarnSystemDischargeOverCurrentRecover, 2),
    reg!(0x208C, Signed, ReadWrite, WarnCellOverTemperatureAlarm),
    reg!(0x208D, Signed, ReadWrite, WarnCellOverTemperatureRecover),
    reg!(0x208E, Signed, ReadWrite, WarnCellUnderTemperatureAlarm),
    reg!(0x208F, Signed, ReadWrite, WarnCellUnderTemperatureRecover),
    reg!(0x2090, Unsigned, ReadWrite, WarnSocLowAlarm),
    reg!(0x2091, Unsigned, ReadWrite, WarnSocLowAlarmRecover),
    reg!(0x2092, Unsigned, ReadWrite, WarnSocHighAlarm),
    reg!(0x2093, Unsigned, ReadWrite, WarnSocHighAlarmRecover),
    reg!(0x2094, Signed, ReadWrite, WarnConnectorTemperatureHighAlarm),
    reg!(0x2095, Signed, ReadWrite, WarnConnectorTemperatureHighAlarmRecover),
    reg!(0x2096, Unsigned, ReadWrite, WarnInsulationAlarm),
    reg!(0x2097, Unsigned, ReadWrite, WarnInsulationAlarmRecover),
    reg!(0x2098, Unsigned, ReadWrite, WarnCellVoltageDifferenceAlarm),
    reg!(0x2099, Unsigned, ReadWrite, WarnCellVoltageDifferenceAlarmRecover),
    reg!(0x209A, Unsigned, ReadWrite, WarnTotalVoltageDifferenceAlarm, 2),
    reg!(0x209B, Unsigned, ReadWrite, WarnTotalVoltageDifferenceAlarmRecover, 2),
    reg!(0x209C, Signed, ReadWrite, WarnDischargeTemperatureHighAlarm),
    reg!(0x209D, Signed, ReadWrite, WarnDischargeTemperatureHighAlarmRecover),
    reg!(0x209F, Signed, ReadWrite, WarnDischargeTemperatureLowAlarm),
    reg!(0x20A0, Signed, ReadWrite, WarnDischargeTemperatureLowAlarmRecover),
    reg!(0x20A1, Signed, ReadWrite, WarnTemperatureDifferenceAlarm),
    reg!(0x20A2, Signed, ReadWrite, WarnTemperatureDifferenceAlarmRecover),
    // ── Work parameters ──
    reg!(0x20C1, Unsigned, ReadWrite, WorkParameterNumberOfModules),
    reg!(0x20DF, Unsigned, Write, SetSoc),
    // ── Summary state ──
    reg!(0x2100, 1, Unsigned, Read, [(ClusterVoltage, 2), (Voltage, -1)]),
    reg!(0x2101, 1, Signed, Read, [(ClusterCurrent, 2), (Current, -1)]),
    reg!(0x2102, Unsigned, Read, ChargeIndication),
    reg!(0x2103, Unsigned, Read, Soc),
    reg!(0x2104, Unsigned, Read, Soh),
    reg!(0x2105, Unsigned, Read, MaxCellVoltageId),
    reg!(0x2106, Unsigned, Read, MaxCellVoltage),
    reg!(0x2107, Unsigned, Read, MinCellVoltageId),
    reg!(0x2108, Unsigned, Read, MinCellVoltage),
    reg!(0x2109, Unsigned, Read, MaxCellTemperatureId),
    reg!(0x210A, 1, Signed, Read, [(ClusterMaxCellTemperature, 0), (MaxCellTemperature, -1)]),
    reg!(0x210B, Unsigned, Read, MinCellTemperatureId),
    reg!(0x210C, 1, Signed, Read, [(ClusterMinCellTemperature, 0), (MinCellTemperature, -1)]),
    reg!(0x210D, Unsigned, Read, MaxCellResistanceId),
    reg!(0x210E, Unsigned, Read, MaxCellResistance, 1),
    reg!(0x210F, Unsigned, Read, MinCellResistanceId),
    reg!(0x2110, Unsigned, Read, MinCellResistance, 1),
    reg!(0x2111, Unsigned, Read, PositiveInsulation),
    reg!(0x2112, Unsigned, Read, NegativeInsulation),
    reg!(0x2113, Unsigned, Read, MainContactorFlag),
    reg!(0x2115, Unsigned, Read, EnvironmentTemperature),
    reg!(0x2116, Unsigned, Read, SystemInsulation),
    reg!(0x2117, Unsigned, Read, CellVoltageDifference),
    reg!(0x2118, Unsigned, Read, TotalVoltageDifference, 2),
    reg!(0x2119, Unsigned, Read, PowerTemperature),
    reg!(0x211A, Unsigned, Read, PowerSupplyVoltage),
    // ── Critical state ──
    reg!(0x2140, Bits, Read, Level2Alarm),
    reg!(0x2141, Bits, Read, Level1Alarm),
    reg!(0x2142, Unsigned, Read, ClusterRunState),
    reg!(0x2143, Unsigned, Read, MaxCellVoltageNumberWhenAlarm),
    reg!(0x2144, Unsigned, Read, MaxCellVoltageWhenAlarm),
    reg!(0x2145, Unsigned, Read, MaxCellVoltageNumberWhenStopped),
    reg!(0x2146, Unsigned, Read, MaxCellVoltageWhenStopped),
    reg!(0x2147, Unsigned, Read, MinCellVoltageNumberWhenAlarm),
    reg!(0x2148, Unsigned, Read, MinCellVoltageWhenAlarm),
    reg!(0x2149, Unsigned, Read, MinCellVoltageNumberWhenStopped),
    reg!(0x214A, Unsigned, Read, MinCellVoltageWhenStopped),
    reg!(0x214B, Unsigned, Read, OverVoltageValueWhenAlarm),
    reg!(0x214C, Unsigned, Read, OverVoltageValueWhenStopped),
    reg!(0x214D, Unsigned, Read, UnderVoltageValueWhenAlarm),
    reg!(0x214E, Unsigned, Read, UnderVoltageValueWhenStopped),
    reg!(0x214F, Unsigned, Read, OverChargeCurrentWhenAlarm),
    reg!(0x2150, Unsigned, Read, OverChargeCurrentWhenStopped),
    reg!(0x2151, Unsigned, Read, OverDischargeCurrentWhenAlarm),
    reg!(0x2152, Unsigned, Read, OverDischargeCurrentWhenStopped),
    reg!(0x2153, Unsigned, Read, NumberOfTemperatureWhenAlarm),
    reg!(0x215B, Unsigned, Read, OtherAlarmEquipmentFailure),
    reg!(0x2160, Unsigned, Read, BmsChargeMaxCurrent, -1),
    reg!(0x2161, Unsigned, Read, BmsDischargeMaxCurrent, -1),
    // ── History / diagnostics ──
    reg!(0x2180, Unsigned, Read, CycleCount),
    reg!(0x2181, 2, Unsigned, Read, [(TotalCapacity, 0)]),
    reg!(0x2183, Bits, Read, SlaveCommErrorHigh),
    reg!(0x2184, Bits, Read, SlaveCommErrorLow),
    reg!(0x2185, Bits, Read, HardwareFailure),
    reg!(0x2186, 2, Unsigned, Read, [(SystemTime, 0)]),
    reg!(0x218F, Unsigned, Read, LastChargeCapacity, 1),
    reg!(0x2190, 2, Unsigned, Read, [(LastChargeEndTime, 0)]),
    reg!(0x2193, Unsigned, Read, LastDischargeCapacity, 1),
    reg!(0x2194, 2, Unsigned, Read, [(LastDischargeEndTime, 0)]),
    reg!(0x2196, Unsigned, Read, CellOverVoltageStopTimes),
    reg!(0x2197, Unsigned, Read, BatteryOverVoltageStopTimes),
    reg!(0x2198, Unsigned, Read, BatteryChargeOverCurrentStopTimes),
    reg!(0x2199, Unsigned, Read, CellVoltageLowStopTimes),
    reg!(0x219A, Unsigned, Read, BatteryVoltageLowStopTimes),
    reg!(0x219B, Unsigned, Read, BatteryDischargeOverCurrentStopTimes),
    reg!(0x219C, Unsigned, Read, BatteryOverTemperatureStopTimes),
    reg!(0x219D, Unsigned, Read, BatteryTemperatureLowStopTimes),
    reg!(0x219E, Unsigned, Read, CellOverVoltageAlarmTimes),
    reg!(0x219F, Unsigned, Read, BatteryOverVoltageAlarmTimes),
    reg!(0x21A0, Unsigned, Read, BatteryChargeOverCurrentAlarmTimes),
    reg!(0x21A1, Unsigned, Read, CellVoltageLowAlarmTimes),
    reg!(0x21A2, Unsigned, Read, BatteryVoltageLowAlarmTimes),
    reg!(0x21A3, Unsigned, Read, BatteryDischargeOverCurrentAlarmTimes),
    reg!(0x21A4, Unsigned, Read, BatteryOverTemperatureAlarmTimes),
    reg!(0x21A5, Unsigned, Read, BatteryTemperatureLowAlarmTimes),
    reg!(0x21A6, Unsigned, Read, SystemShortCircuitProtectionTimes),
    reg!(0x21A7, Unsigned, Read, SystemGrOverTemperatureStopTimes),
    reg!(0x21A9, Unsigned, Read, SystemGrOverTemperatureAlarmTimes),
    reg!(0x21AB, Unsigned, Read, BatteryVoltageDifferenceAlarmTimes),
    reg!(0x21AC, Unsigned, Read, BatteryVoltageDifferenceStopTimes),
    reg!(0x21B4, Unsigned, Read, SlaveTemperatureCommErrorHigh),
    reg!(0x21B5, Unsigned, Read, SlaveTemperatureCommErrorLow),
];

/// Field whose primary target is `quantity`.
pub fn field_for(quantity: Quantity) -> Option<&'static RegisterField> {
    REGISTER_TABLE
        .iter()
        .find(|f| f.primary().quantity == quantity)
}

/// Field starting at `address`.
pub fn field_at(address: u16) -> Option<&'static RegisterField> {
    REGISTER_TABLE
        .binary_search_by_key(&address, |f| f.address)
        .ok()
        .map(|i| &REGISTER_TABLE[i])
}

// ─── Indexed Cell Blocks ────────────────────────────────────────────

/// Start address of module `module`'s cell-voltage block.
#[inline]
pub const fn voltage_block_start(module: u8) -> u16 {
    VOLTAGE_ADDRESS_OFFSET + module as u16 * SENSORS_PER_MODULE as u16
}

/// Start address of module `module`'s cell-temperature block.
#[inline]
pub const fn temperature_block_start(module: u8) -> u16 {
    TEMPERATURE_ADDRESS_OFFSET + module as u16 * SENSORS_PER_MODULE as u16
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_without_overlap() {
        for pair in REGISTER_TABLE.windows(2) {
            let end = pair[0].address + u16::from(pair[0].words);
            assert!(
                end <= pair[1].address,
                "0x{:04X} overlaps 0x{:04X}",
                pair[0].address,
                pair[1].address
            );
        }
    }

    #[test]
    fn every_quantity_has_exactly_one_target() {
        let mut seen = vec![0u8; Quantity::COUNT];
        for field in REGISTER_TABLE {
            for target in field.targets {
                seen[target.quantity.index()] += 1;
            }
        }
        for (index, count) in seen.iter().enumerate() {
            assert_eq!(*count, 1, "quantity index {index} mapped {count} times");
        }
    }

    #[test]
    fn fan_out_fields_feed_capability_limits() {
        let over = field_at(0x2082).unwrap();
        assert_eq!(over.targets.len(), 2);
        assert_eq!(over.targets[1].quantity, Quantity::ChargeMaxVoltage);
        assert_eq!(over.targets[1].exponent, -1);

        let under = field_at(0x2088).unwrap();
        assert_eq!(under.targets[1].quantity, Quantity::DischargeMinVoltage);
    }

    #[test]
    fn lookup_by_quantity_uses_primary_target_only() {
        assert_eq!(field_for(Quantity::BmsContactorControl).unwrap().address, 0x2010);
        assert!(field_for(Quantity::ChargeMaxVoltage).is_none());
    }

    #[test]
    fn cell_voltage_extremes_are_unsigned_current_is_signed() {
        assert_eq!(field_at(0x2106).unwrap().kind, FieldKind::Unsigned);
        assert_eq!(field_at(0x2108).unwrap().kind, FieldKind::Unsigned);
        assert_eq!(field_at(0x2101).unwrap().kind, FieldKind::Signed);

        let mut image = crate::codec::RegisterImage::new();
        image.set(0x2106, 40_000);
        let decoded: Vec<_> = field_at(0x2106).unwrap().decode(&image).collect();
        assert_eq!(decoded, vec![(Quantity::MaxCellVoltage, Some(40_000))]);
    }

    #[test]
    fn voltage_range_targets_scale_by_hundred() {
        for address in [0x2082, 0x2083, 0x2088, 0x2089, 0x2042, 0x2043, 0x2048, 0x2049] {
            let field = field_at(address).unwrap();
            assert_eq!(field.primary().exponent, 2, "0x{address:04X}");
            assert!(field.access.writable());
        }
    }

    #[test]
    fn cell_blocks_are_contiguous_per_module() {
        assert_eq!(voltage_block_start(0), 0x2800);
        assert_eq!(voltage_block_start(1), 0x280C);
        assert_eq!(temperature_block_start(19), 0x2C00 + 19 * 12);
    }
}
