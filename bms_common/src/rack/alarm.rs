//! Alarm bitflag types decoded from the rack's packed status registers.
//!
//! Each type mirrors one 16-bit register layout bit for bit, so decoding a
//! register is `from_bits_truncate(raw)`. The bit positions are the device's
//! wire contract and must not be reordered.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_MODULES;

/// Severity attached to every alarm flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Informational,
    Warning,
    Fault,
}

bitflags! {
    /// Level-1 (0x2141) and level-2 (0x2140) alarm words.
    ///
    /// Both levels share this layout. Level-2 bits are protective trips,
    /// level-1 bits are early warnings of the same condition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RackAlarm: u16 {
        const CELL_VOLTAGE_HIGH                 = 1 << 0;
        const TOTAL_VOLTAGE_HIGH                = 1 << 1;
        const CHARGE_CURRENT_HIGH               = 1 << 2;
        const CELL_VOLTAGE_LOW                  = 1 << 3;
        const TOTAL_VOLTAGE_LOW                 = 1 << 4;
        const DISCHARGE_CURRENT_HIGH            = 1 << 5;
        const CELL_CHARGE_TEMP_HIGH             = 1 << 6;
        const CELL_CHARGE_TEMP_LOW              = 1 << 7;
        const SOC_LOW                           = 1 << 8;
        const TEMPERATURE_DIFFERENCE_HIGH       = 1 << 9;
        const POLES_TEMPERATURE_DIFFERENCE_HIGH = 1 << 10;
        const CELL_VOLTAGE_DIFFERENCE_HIGH      = 1 << 11;
        const INSULATION_LOW                    = 1 << 12;
        const TOTAL_VOLTAGE_DIFFERENCE_HIGH     = 1 << 13;
        const CELL_DISCHARGE_TEMP_HIGH          = 1 << 14;
        const CELL_DISCHARGE_TEMP_LOW           = 1 << 15;
    }
}

impl Default for RackAlarm {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Alarm flag status (0x2007) and protect flag status (0x2008) words.
    ///
    /// Note the temperature pair at bits 6/7 is ordered low-then-high,
    /// unlike [`RackAlarm`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlagStatus: u16 {
        const CELL_OVER_VOLTAGE           = 1 << 0;
        const SYSTEM_OVER_VOLTAGE         = 1 << 1;
        const CHARGE_OVER_CURRENT         = 1 << 2;
        const CELL_LOW_VOLTAGE            = 1 << 3;
        const SYSTEM_LOW_VOLTAGE          = 1 << 4;
        const DISCHARGE_OVER_CURRENT      = 1 << 5;
        const CELL_LOW_TEMPERATURE        = 1 << 6;
        const CELL_OVER_TEMPERATURE       = 1 << 7;
        const SOC_LOW                     = 1 << 8;
        const TEMPERATURE_DIFFERENCE      = 1 << 9;
        const ELECTRODE_TEMPERATURE_HIGH  = 1 << 10;
        const CELL_VOLTAGE_DIFFERENCE     = 1 << 11;
        const INSULATION_LOW              = 1 << 12;
        const VOLTAGE_DIFFERENCE          = 1 << 13;
        const DISCHARGE_TEMPERATURE_HIGH  = 1 << 14;
        const DISCHARGE_TEMPERATURE_LOW   = 1 << 15;
    }
}

impl Default for FlagStatus {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Hardware failure word (0x2185). Bits 13..=15 are unused.
    ///
    /// INFORMATIONAL: BALANCING_MODULE. WARNING: INTRANET_COMMUNICATION,
    /// which is a communication error and still forces an error state.
    /// Everything else is a fault.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HardwareFailure: u16 {
        const SAMPLING_WIRE          = 1 << 0;
        const CONNECTOR_WIRE         = 1 << 1;
        const LTC6803                = 1 << 2;
        const VOLTAGE_SAMPLING       = 1 << 3;
        const TEMP_SAMPLING          = 1 << 4;
        const TEMP_SENSOR            = 1 << 5;
        const GR_T                   = 1 << 6;
        const PCB                    = 1 << 7;
        const BALANCING_MODULE       = 1 << 8;
        const TEMP_SAMPLING_LINE     = 1 << 9;
        const INTRANET_COMMUNICATION = 1 << 10;
        const EEPROM                 = 1 << 11;
        const INITIALIZATION         = 1 << 12;
    }
}

impl HardwareFailure {
    /// Communication errors: labelled warning, but the raw bit forces an
    /// error state like a fault.
    pub const COMM_ERROR_MASK: Self = Self::INTRANET_COMMUNICATION;

    /// Severity of a single failure bit.
    pub fn severity(flag: Self) -> Severity {
        if flag == Self::BALANCING_MODULE {
            Severity::Informational
        } else if Self::COMM_ERROR_MASK.contains(flag) {
            Severity::Warning
        } else {
            Severity::Fault
        }
    }

    /// Returns true if any communication-error bit is set.
    #[inline]
    pub const fn has_comm_error(&self) -> bool {
        self.intersects(Self::COMM_ERROR_MASK)
    }

    /// Returns true if any set bit forces an error state. Only the
    /// balancing-module flag does not.
    #[inline]
    pub const fn has_fault(&self) -> bool {
        self.difference(Self::BALANCING_MODULE).bits() != 0
    }
}

impl Default for HardwareFailure {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Per-slave communication errors, bit `n - 1` for slave `n`.
    ///
    /// Slaves 1..=16 come from 0x2184 bits 0..=15, slaves 17..=20 from
    /// 0x2183 bits 0..=3.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SlaveCommError: u32 {
        const SLAVE_1  = 1 << 0;
        const SLAVE_2  = 1 << 1;
        const SLAVE_3  = 1 << 2;
        const SLAVE_4  = 1 << 3;
        const SLAVE_5  = 1 << 4;
        const SLAVE_6  = 1 << 5;
        const SLAVE_7  = 1 << 6;
        const SLAVE_8  = 1 << 7;
        const SLAVE_9  = 1 << 8;
        const SLAVE_10 = 1 << 9;
        const SLAVE_11 = 1 << 10;
        const SLAVE_12 = 1 << 11;
        const SLAVE_13 = 1 << 12;
        const SLAVE_14 = 1 << 13;
        const SLAVE_15 = 1 << 14;
        const SLAVE_16 = 1 << 15;
        const SLAVE_17 = 1 << 16;
        const SLAVE_18 = 1 << 17;
        const SLAVE_19 = 1 << 18;
        const SLAVE_20 = 1 << 19;
    }
}

impl SlaveCommError {
    /// Merge the two device words into one set.
    #[inline]
    pub const fn from_words(slaves_17_20: u16, slaves_1_16: u16) -> Self {
        Self::from_bits_truncate((((slaves_17_20 & 0x000F) as u32) << 16) | slaves_1_16 as u32)
    }

    /// Mask covering slaves `1..=count`. Slaves above the configured count
    /// have no hardware wired and are never checked.
    #[inline]
    pub const fn configured(count: u8) -> Self {
        let count = if count > MAX_MODULES { MAX_MODULES } else { count };
        Self::from_bits_truncate(((1u64 << count) - 1) as u32)
    }

    /// Returns true if a configured slave reports a communication error.
    #[inline]
    pub const fn any_configured(&self, count: u8) -> bool {
        self.intersects(Self::configured(count))
    }
}

impl Default for SlaveCommError {
    fn default() -> Self {
        Self::empty()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
