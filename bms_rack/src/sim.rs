//! In-process simulated rack.
//!
//! [`SimulatedRack`] implements [`RegisterTransport`] over a plain register
//! array and reacts to the writes a real rack reacts to: contactor close and
//! open, slave/temperature auto-ID, sleep and system reset. Progress is
//! counted in control-block reads, so one supervisor cycle advances the
//! simulation by one step regardless of wall time.
//!
//! Faults are injected through the `inject_*`/`set_*` methods.

use std::collections::BTreeSet;

use bms_common::consts::{ADDRESS_OFFSET, SENSORS_PER_MODULE, SYSTEM_ON};
use bms_common::rack::alarm::RackAlarm;
use bms_common::rack::state::{AutoSetFunction, ContactorFeedback};
use bms_common::transport::{RegisterTransport, TransportError};
use tracing::{debug, info};

use crate::codec::image::IMAGE_END;
use crate::codec::table::{field_at, temperature_block_start, voltage_block_start};

const CONTROL_REGISTER: u16 = 0x2010;
const AUTO_SET_ID_REGISTER: u16 = 0x2014;
const AUTO_SET_TEMPERATURE_ID_REGISTER: u16 = 0x2019;
const RESET_REGISTER: u16 = 0x2004;
const SLEEP_REGISTER: u16 = 0x201D;
const MODULES_REGISTER: u16 = 0x20C1;

const NOMINAL_CELL_MV: u16 = 3300;
const NOMINAL_CELL_DC: u16 = 250;
/// BMS limits, 0.1 A.
const NOMINAL_LIMIT_RAW: u16 = 1000;

/// Reads of the control block between close request and ON_GRID.
pub const DEFAULT_CLOSE_AFTER_READS: u32 = 2;

/// Reads of the control block until an auto-ID run finishes.
pub const DEFAULT_AUTO_ID_READS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Idle,
    /// Remaining control-block reads.
    Running(u32),
}

/// Simulated rack register space.
#[derive(Debug, Clone)]
pub struct SimulatedRack {
    registers: Vec<u16>,
    module_count: u8,
    cells_mv: Vec<u16>,
    cells_dc: Vec<u16>,

    contactor: Progress,
    close_after_reads: u32,
    contactor_unresponsive: bool,

    auto_id: Progress,
    auto_temperature_id: Progress,
    auto_id_reads: u32,
    auto_id_failures: u32,

    failing_reads: BTreeSet<u16>,
    failing_writes: BTreeSet<u16>,
    disconnected: bool,

    write_log: Vec<(u16, u16)>,
    sleep_count: u32,
    reset_count: u32,
}

impl SimulatedRack {
    /// Healthy rack with `module_count` modules, contactor open.
    pub fn new(module_count: u8) -> Self {
        let cells = usize::from(module_count) * SENSORS_PER_MODULE;
        let mut rack = Self {
            registers: vec![0; usize::from(IMAGE_END - ADDRESS_OFFSET)],
            module_count,
            // Small spread so min and max land on distinct cells.
            cells_mv: (0..cells).map(|i| NOMINAL_CELL_MV + (i % 5) as u16).collect(),
            cells_dc: (0..cells).map(|i| NOMINAL_CELL_DC + (i % 3) as u16).collect(),
            contactor: Progress::Idle,
            close_after_reads: DEFAULT_CLOSE_AFTER_READS,
            contactor_unresponsive: false,
            auto_id: Progress::Idle,
            auto_temperature_id: Progress::Idle,
            auto_id_reads: DEFAULT_AUTO_ID_READS,
            auto_id_failures: 0,
            failing_reads: BTreeSet::new(),
            failing_writes: BTreeSet::new(),
            disconnected: false,
            write_log: Vec::new(),
            sleep_count: 0,
            reset_count: 0,
        };
        rack.set(MODULES_REGISTER, u16::from(module_count));
        rack.set(0x2001, 2); // main contactor open
        rack.set(0x2103, 60); // SoC
        rack.set(0x2104, 100); // SoH
        rack.set(0x2160, NOMINAL_LIMIT_RAW);
        rack.set(0x2161, NOMINAL_LIMIT_RAW);
        rack.refresh_summary();
        rack
    }

    // ── Register access ──

    #[inline]
    fn slot(address: u16) -> Option<usize> {
        (ADDRESS_OFFSET..IMAGE_END)
            .contains(&address)
            .then(|| usize::from(address - ADDRESS_OFFSET))
    }

    /// Current value of one register. Out-of-range addresses read as 0.
    pub fn get(&self, address: u16) -> u16 {
        Self::slot(address).map_or(0, |i| self.registers[i])
    }

    /// Overwrite one register directly.
    pub fn set(&mut self, address: u16, value: u16) {
        if let Some(i) = Self::slot(address) {
            self.registers[i] = value;
        }
    }

    // ── Observations ──

    /// Every accepted write, in order.
    pub fn write_log(&self) -> &[(u16, u16)] {
        &self.write_log
    }

    /// Accepted writes to `address`.
    pub fn writes_to(&self, address: u16) -> Vec<u16> {
        self.write_log
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn clear_write_log(&mut self) {
        self.write_log.clear();
    }

    pub fn contactor_feedback(&self) -> Option<ContactorFeedback> {
        Some(ContactorFeedback::from_raw(i64::from(self.get(CONTROL_REGISTER))))
    }

    pub fn sleep_count(&self) -> u32 {
        self.sleep_count
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    // ── Fault injection ──

    /// Set the level-2 alarm word.
    pub fn set_level2_alarm(&mut self, alarm: RackAlarm) {
        self.set(0x2140, alarm.bits());
    }

    /// Set the level-1 alarm word.
    pub fn set_level1_alarm(&mut self, alarm: RackAlarm) {
        self.set(0x2141, alarm.bits());
    }

    /// Set the slave comm-error words (slaves 17..=20, slaves 1..=16).
    pub fn set_slave_comm_errors(&mut self, high: u16, low: u16) {
        self.set(0x2183, high);
        self.set(0x2184, low);
    }

    /// Contactor ignores close/open requests.
    pub fn set_contactor_unresponsive(&mut self, unresponsive: bool) {
        self.contactor_unresponsive = unresponsive;
    }

    pub fn set_close_after_reads(&mut self, reads: u32) {
        self.close_after_reads = reads;
    }

    /// Force the contactor feedback register.
    pub fn set_contactor_feedback(&mut self, raw: u16) {
        self.contactor = Progress::Idle;
        self.set(CONTROL_REGISTER, raw);
    }

    /// The next `count` auto-ID runs end in FAILURE.
    pub fn inject_auto_id_failures(&mut self, count: u32) {
        self.auto_id_failures = count;
    }

    /// Reads of the block starting at `start` time out.
    pub fn fail_reads(&mut self, start: u16, failing: bool) {
        if failing {
            self.failing_reads.insert(start);
        } else {
            self.failing_reads.remove(&start);
        }
    }

    /// Writes to `address` are rejected.
    pub fn fail_writes(&mut self, address: u16, failing: bool) {
        if failing {
            self.failing_writes.insert(address);
        } else {
            self.failing_writes.remove(&address);
        }
    }

    pub fn set_disconnected(&mut self, disconnected: bool) {
        self.disconnected = disconnected;
    }

    /// Set one cell voltage [mV]. `cell` is 0-based across the rack.
    pub fn set_cell_voltage(&mut self, cell: usize, mv: u16) {
        if let Some(slot) = self.cells_mv.get_mut(cell) {
            *slot = mv;
            self.refresh_summary();
        }
    }

    /// Set every cell voltage [mV].
    pub fn set_all_cell_voltages(&mut self, mv: u16) {
        self.cells_mv.iter_mut().for_each(|c| *c = mv);
        self.refresh_summary();
    }

    /// Set every cell temperature [0.1 °C].
    pub fn set_all_cell_temperatures(&mut self, dc: i16) {
        self.cells_dc.iter_mut().for_each(|c| *c = dc as u16);
        self.refresh_summary();
    }

    // ── Simulation ──

    /// Recompute the summary block from the cell arrays.
    fn refresh_summary(&mut self) {
        for module in 0..self.module_count {
            let cells = usize::from(module) * SENSORS_PER_MODULE;
            for sensor in 0..SENSORS_PER_MODULE {
                let offset = sensor as u16;
                self.set(voltage_block_start(module) + offset, self.cells_mv[cells + sensor]);
                self.set(temperature_block_start(module) + offset, self.cells_dc[cells + sensor]);
            }
        }

        let Some((max_id, max_mv)) = extreme(&self.cells_mv, |a, b| a > b) else {
            return;
        };
        let Some((min_id, min_mv)) = extreme(&self.cells_mv, |a, b| a < b) else {
            return;
        };
        let temps = || self.cells_dc.iter().map(|&t| t as i16);
        let max_dc = temps().max().unwrap_or_default();
        let min_dc = temps().min().unwrap_or_default();
        let total_mv: u32 = self.cells_mv.iter().map(|&c| u32::from(c)).sum();

        self.set(0x2100, u16::try_from(total_mv / 100).unwrap_or(u16::MAX));
        self.set(0x2105, max_id);
        self.set(0x2106, max_mv);
        self.set(0x2107, min_id);
        self.set(0x2108, min_mv);
        self.set(0x210A, max_dc as u16);
        self.set(0x210C, min_dc as u16);
        self.set(0x2117, max_mv - min_mv);
    }

    /// One control-block read: advance pending device actions.
    fn tick(&mut self) {
        if let Progress::Running(remaining) = self.contactor {
            if remaining <= 1 {
                self.contactor = Progress::Idle;
                self.set(CONTROL_REGISTER, ContactorFeedback::OnGrid as u16);
                self.set(0x2001, 1);
                info!("Simulated contactor on grid");
            } else {
                self.contactor = Progress::Running(remaining - 1);
            }
        }
        self.auto_id = self.advance_auto_id(self.auto_id, AUTO_SET_ID_REGISTER);
        self.auto_temperature_id =
            self.advance_auto_id(self.auto_temperature_id, AUTO_SET_TEMPERATURE_ID_REGISTER);
    }

    fn advance_auto_id(&mut self, progress: Progress, register: u16) -> Progress {
        match progress {
            Progress::Running(remaining) if remaining <= 1 => {
                let result = if self.auto_id_failures > 0 {
                    self.auto_id_failures -= 1;
                    AutoSetFunction::Failure
                } else {
                    AutoSetFunction::Success
                };
                debug!(register = format_args!("{register:#06X}"), ?result, "Simulated auto-ID finished");
                self.set(register, result as u16);
                Progress::Idle
            }
            Progress::Running(remaining) => Progress::Running(remaining - 1),
            Progress::Idle => Progress::Idle,
        }
    }

    fn apply_write(&mut self, address: u16, value: u16) {
        match address {
            CONTROL_REGISTER if self.contactor_unresponsive => {}
            CONTROL_REGISTER if value == SYSTEM_ON => {
                if self.contactor_feedback() != Some(ContactorFeedback::OnGrid) {
                    self.set(CONTROL_REGISTER, ContactorFeedback::ConnectionInitiating as u16);
                    self.contactor = Progress::Running(self.close_after_reads);
                }
            }
            CONTROL_REGISTER => self.cut_off(),
            AUTO_SET_ID_REGISTER | AUTO_SET_TEMPERATURE_ID_REGISTER => {
                self.set(address, value);
                if value == AutoSetFunction::StartAutoSetting as u16 {
                    let progress = Progress::Running(self.auto_id_reads);
                    if address == AUTO_SET_ID_REGISTER {
                        self.auto_id = progress;
                    } else {
                        self.auto_temperature_id = progress;
                    }
                }
            }
            SLEEP_REGISTER => {
                self.sleep_count += 1;
                self.cut_off();
            }
            RESET_REGISTER => {
                self.reset_count += 1;
                self.cut_off();
                self.auto_id = Progress::Idle;
                self.auto_temperature_id = Progress::Idle;
                self.set(AUTO_SET_ID_REGISTER, AutoSetFunction::Init as u16);
                self.set(AUTO_SET_TEMPERATURE_ID_REGISTER, AutoSetFunction::Init as u16);
            }
            _ => self.set(address, value),
        }
    }

    fn cut_off(&mut self) {
        self.contactor = Progress::Idle;
        self.set(CONTROL_REGISTER, ContactorFeedback::CutOff as u16);
        self.set(0x2001, 2);
    }
}

/// Index (1-based) and value of the extreme cell under `better`.
fn extreme(cells: &[u16], better: impl Fn(u16, u16) -> bool) -> Option<(u16, u16)> {
    let mut iter = cells.iter().copied().enumerate();
    let (mut index, mut value) = iter.next()?;
    for (i, v) in iter {
        if better(v, value) {
            index = i;
            value = v;
        }
    }
    Some((u16::try_from(index + 1).ok()?, value))
}

impl RegisterTransport for SimulatedRack {
    fn name(&self) -> &str {
        "simulated"
    }

    fn read_holding(&mut self, start: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        if self.disconnected {
            return Err(TransportError::Disconnected);
        }
        let end = start
            .checked_add(count)
            .ok_or(TransportError::IllegalAddress(start))?;
        if Self::slot(start).is_none() || end > IMAGE_END {
            return Err(TransportError::IllegalAddress(start));
        }
        if self.failing_reads.contains(&start) {
            return Err(TransportError::Timeout { address: start });
        }
        if (start..end).contains(&CONTROL_REGISTER) {
            self.tick();
        }
        Ok((start..end).map(|a| self.get(a)).collect())
    }

    fn write_single(&mut self, address: u16, value: u16) -> Result<(), TransportError> {
        if self.disconnected {
            return Err(TransportError::Disconnected);
        }
        if !field_at(address).is_some_and(|f| f.access.writable()) {
            return Err(TransportError::IllegalAddress(address));
        }
        if self.failing_writes.contains(&address) {
            return Err(TransportError::CommunicationError(format!(
                "write to {address:#06X} rejected"
            )));
        }
        self.write_log.push((address, value));
        self.apply_write(address, value);
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn read_control(rack: &mut SimulatedRack) -> Vec<u16> {
        rack.read_holding(0x2000, 0x1F).unwrap()
    }

    #[test]
    fn contactor_closes_after_configured_reads() {
        let mut rack = SimulatedRack::new(2);
        assert_eq!(rack.contactor_feedback(), Some(ContactorFeedback::CutOff));
        rack.write_single(CONTROL_REGISTER, 1).unwrap();
        assert_eq!(
            rack.contactor_feedback(),
            Some(ContactorFeedback::ConnectionInitiating)
        );
        read_control(&mut rack);
        assert_eq!(
            rack.contactor_feedback(),
            Some(ContactorFeedback::ConnectionInitiating)
        );
        let words = read_control(&mut rack);
        assert_eq!(words[0x10], 3);
        rack.write_single(CONTROL_REGISTER, 0).unwrap();
        assert_eq!(rack.contactor_feedback(), Some(ContactorFeedback::CutOff));
    }

    #[test]
    fn unresponsive_contactor_keeps_feedback() {
        let mut rack = SimulatedRack::new(2);
        rack.set_contactor_unresponsive(true);
        rack.write_single(CONTROL_REGISTER, 1).unwrap();
        for _ in 0..5 {
            read_control(&mut rack);
        }
        assert_eq!(rack.contactor_feedback(), Some(ContactorFeedback::CutOff));
        assert_eq!(rack.writes_to(CONTROL_REGISTER), vec![1]);
    }

    #[test]
    fn auto_id_reports_failure_then_success() {
        let mut rack = SimulatedRack::new(2);
        rack.inject_auto_id_failures(1);
        rack.write_single(AUTO_SET_ID_REGISTER, 1).unwrap();
        for _ in 0..DEFAULT_AUTO_ID_READS {
            read_control(&mut rack);
        }
        assert_eq!(rack.get(AUTO_SET_ID_REGISTER), AutoSetFunction::Failure as u16);

        rack.write_single(AUTO_SET_ID_REGISTER, 1).unwrap();
        for _ in 0..DEFAULT_AUTO_ID_READS {
            read_control(&mut rack);
        }
        assert_eq!(rack.get(AUTO_SET_ID_REGISTER), AutoSetFunction::Success as u16);
    }

    #[test]
    fn reset_cuts_off_contactor() {
        let mut rack = SimulatedRack::new(1);
        rack.set_contactor_feedback(3);
        rack.write_single(RESET_REGISTER, 1).unwrap();
        assert_eq!(rack.contactor_feedback(), Some(ContactorFeedback::CutOff));
        assert_eq!(rack.reset_count(), 1);
    }

    #[test]
    fn summary_tracks_cells() {
        let mut rack = SimulatedRack::new(2);
        rack.set_all_cell_voltages(3300);
        rack.set_cell_voltage(6, 3600);
        rack.set_cell_voltage(7, 3100);
        assert_eq!(rack.get(0x2106), 3600);
        assert_eq!(rack.get(0x2105), 7);
        assert_eq!(rack.get(0x2108), 3100);
        assert_eq!(rack.get(0x2107), 8);
        assert_eq!(rack.get(voltage_block_start(0) + 6), 3600);
    }

    #[test]
    fn illegal_addresses_rejected() {
        let mut rack = SimulatedRack::new(1);
        assert_eq!(
            rack.read_holding(0x1FF0, 4),
            Err(TransportError::IllegalAddress(0x1FF0))
        );
        // Read-only register.
        assert_eq!(
            rack.write_single(0x2100, 1),
            Err(TransportError::IllegalAddress(0x2100))
        );
    }

    #[test]
    fn injected_faults() {
        let mut rack = SimulatedRack::new(1);
        rack.fail_reads(0x2100, true);
        assert!(matches!(
            rack.read_holding(0x2100, 0x1B),
            Err(TransportError::Timeout { address: 0x2100 })
        ));
        rack.fail_writes(0x201C, true);
        assert!(matches!(
            rack.write_single(0x201C, 60),
            Err(TransportError::CommunicationError(_))
        ));
        rack.set_disconnected(true);
        assert_eq!(rack.read_holding(0x2000, 1), Err(TransportError::Disconnected));
    }
}
