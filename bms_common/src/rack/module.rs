//! Battery module types and their per-module constants.
//!
//! Rack-level thresholds are provisioned as `module_count × per-module value`.

use serde::{Deserialize, Serialize};

/// Installed module variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// 3.0 kWh module.
    #[default]
    #[serde(rename = "module_3_kwh")]
    Module3000Wh,
    /// 3.5 kWh module.
    #[serde(rename = "module_3_5_kwh")]
    Module3500Wh,
}

/// Per-module constants. Voltages in millivolt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleParameters {
    pub capacity_wh: u32,
    pub level1_over_voltage_mv: u32,
    pub level1_over_voltage_recover_mv: u32,
    pub level1_under_voltage_mv: u32,
    pub level1_under_voltage_recover_mv: u32,
    pub level2_over_voltage_mv: u32,
    pub level2_over_voltage_recover_mv: u32,
    pub level2_under_voltage_mv: u32,
    pub level2_under_voltage_recover_mv: u32,
}

const MODULE_3_KWH: ModuleParameters = ModuleParameters {
    capacity_wh: 3_000,
    level1_over_voltage_mv: 43_800,
    level1_over_voltage_recover_mv: 42_600,
    level1_under_voltage_mv: 34_800,
    level1_under_voltage_recover_mv: 36_000,
    level2_over_voltage_mv: 44_400,
    level2_over_voltage_recover_mv: 43_200,
    level2_under_voltage_mv: 33_600,
    level2_under_voltage_recover_mv: 34_800,
};

const MODULE_3_5_KWH: ModuleParameters = ModuleParameters {
    capacity_wh: 3_500,
    ..MODULE_3_KWH
};

impl ModuleType {
    /// Constants for this module variant.
    #[inline]
    pub const fn parameters(self) -> ModuleParameters {
        match self {
            Self::Module3000Wh => MODULE_3_KWH,
            Self::Module3500Wh => MODULE_3_5_KWH,
        }
    }
}

impl ModuleParameters {
    /// Total rack capacity [Wh] for `module_count` modules.
    #[inline]
    pub const fn rack_capacity_wh(&self, module_count: u8) -> u32 {
        self.capacity_wh * module_count as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_scales_with_module_count() {
        assert_eq!(ModuleType::Module3000Wh.parameters().rack_capacity_wh(20), 60_000);
        assert_eq!(ModuleType::Module3500Wh.parameters().rack_capacity_wh(10), 35_000);
    }

    #[test]
    fn recover_thresholds_sit_inside_trip_thresholds() {
        for module in [ModuleType::Module3000Wh, ModuleType::Module3500Wh] {
            let p = module.parameters();
            assert!(p.level1_over_voltage_recover_mv < p.level1_over_voltage_mv);
            assert!(p.level1_under_voltage_recover_mv > p.level1_under_voltage_mv);
            assert!(p.level2_over_voltage_mv > p.level1_over_voltage_mv);
            assert!(p.level2_under_voltage_mv < p.level1_under_voltage_mv);
        }
    }

    #[test]
    fn module_type_names_in_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            module_type: ModuleType,
        }
        let parsed: Wrapper = toml::from_str("module_type = \"module_3_5_kwh\"").unwrap();
        assert_eq!(parsed.module_type, ModuleType::Module3500Wh);
    }
}
