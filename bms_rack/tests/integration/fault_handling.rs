//! Integration test: alarms, start failures, drift recovery and transport
//! errors.

use std::time::Duration;

use bms_common::rack::alarm::RackAlarm;
use bms_common::rack::state::LifecycleState;
use bms_common::transport::TransportError;
use bms_rack::cycle::{CycleError, STALE_AFTER_CYCLES};
use bms_rack::safety::alarms::AlarmGroup;
use bms_rack::safety::protection::CurrentLimits;

use super::rig::{Rig, CYCLE};

const CONTROL: u16 = 0x2010;

#[test]
fn level2_alarm_stops_rack_and_waits_out_delay() {
    let mut rig = Rig::started(4, "error_level2_delay_s = 60");
    rig.rack().set_level2_alarm(RackAlarm::CELL_VOLTAGE_HIGH);

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Error);
    assert!(!rig.running());
    assert!(rig
        .runner
        .controller()
        .alarms()
        .contains(AlarmGroup::Level2, "CELL_VOLTAGE_HIGH"));

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::ErrorDelay);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1, 0]);

    // Alarm clears but the delay holds.
    rig.rack().set_level2_alarm(RackAlarm::empty());
    rig.cycles(10);
    assert_eq!(rig.state(), LifecycleState::ErrorDelay);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1, 0]);

    rig.advance(Duration::from_secs(60));
    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Off);
    rig.run_until(10, Rig::running);
}

#[test]
fn persistent_alarm_reenters_error_after_delay() {
    let mut rig = Rig::started(4, "error_level2_delay_s = 30");
    rig.rack().set_level2_alarm(RackAlarm::INSULATION_LOW);
    rig.cycles(2);
    assert_eq!(rig.state(), LifecycleState::ErrorDelay);

    rig.advance(Duration::from_secs(30));
    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Error);
}

#[test]
fn level1_alarm_is_only_a_warning() {
    let mut rig = Rig::started(4, "");
    rig.rack().set_level1_alarm(RackAlarm::SOC_LOW);
    rig.cycles(3);
    assert!(rig.running());
    assert!(!rig.runner.controller().alarms().is_error());
    assert!(rig
        .runner
        .controller()
        .alarms()
        .contains(AlarmGroup::Level1, "SOC_LOW"));
}

#[test]
fn unresponsive_contactor_exhausts_start_attempts() {
    let mut rig = Rig::new(
        4,
        "max_start_time_s = 3\nmax_start_attempts = 2\nstart_unsuccessful_delay_s = 60",
    );
    rig.rack().set_contactor_unresponsive(true);

    rig.run_until(30, |r| r.state() == LifecycleState::ErrorDelay);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1, 1]);
    assert!(rig.runner.controller().status().start_attempts_exhausted);

    rig.cycles(10);
    assert_eq!(rig.state(), LifecycleState::ErrorDelay);

    rig.rack().set_contactor_unresponsive(false);
    rig.advance(Duration::from_secs(60));
    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Off);
    assert!(!rig.runner.controller().status().start_attempts_exhausted);
    rig.run_until(10, Rig::running);
}

#[test]
fn unrecognized_contactor_feedback_is_stopped_after_pending_tolerance() {
    let mut rig = Rig::new(4, "pending_tolerance_s = 3");
    rig.rack().set_contactor_unresponsive(true);
    rig.rack().set_contactor_feedback(2);

    rig.run_until(3, |r| r.state() == LifecycleState::Pending);
    assert!(rig.rack().writes_to(CONTROL).is_empty());

    rig.run_until(10, |r| r.state() == LifecycleState::Off);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![0]);

    // No START while the feedback stays unrecognized.
    rig.cycles(3);
    assert_eq!(rig.state(), LifecycleState::Off);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![0]);
}

#[test]
fn cell_drift_runs_sleep_then_reset_and_restarts() {
    let mut rig = Rig::started(2, "");
    // Adjacent cells 7 and 8 pull apart by 450 mV.
    rig.rack().set_cell_voltage(6, 3600);
    rig.rack().set_cell_voltage(7, 3150);

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::ErrorCellVoltagesDrift);
    assert!(!rig.running());

    rig.cycles(3);
    assert_eq!(rig.rack().sleep_count(), 1);
    assert_eq!(rig.rack().reset_count(), 1);
    let log: Vec<u16> = rig.rack().write_log().iter().map(|(a, _)| *a).collect();
    let sleep = log.iter().position(|&a| a == 0x201D).unwrap();
    let reset = log.iter().position(|&a| a == 0x2004).unwrap();
    assert!(sleep < reset);

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Undefined);
    rig.run_until(10, Rig::running);
}

#[test]
fn parallel_charge_is_not_a_drift() {
    let mut rig = Rig::started(2, "");
    rig.rack().set_all_cell_voltages(3400);
    rig.cycles(3);
    assert!(rig.running());
}

#[test]
fn slave_comm_error_only_counts_for_configured_modules() {
    let mut rig = Rig::started(4, "");
    // Slave 6 is not installed.
    rig.rack().set_slave_comm_errors(0, 1 << 5);
    let round = rig.runner.plan().round_length();
    rig.cycles(round + 1);
    assert!(rig.running());

    // Slave 2 is.
    rig.rack().set_slave_comm_errors(0, 1 << 1);
    rig.run_until(round + 1, |r| r.state() == LifecycleState::Error);
    assert!(rig
        .runner
        .controller()
        .alarms()
        .contains(AlarmGroup::SlaveComm, "SLAVE_2"));
}

#[test]
fn stale_summary_block_zeroes_limits() {
    let mut rig = Rig::started(4, "");
    assert_ne!(rig.cycle().limits, CurrentLimits::ZERO);

    rig.rack().fail_reads(0x2100, true);
    for _ in 0..STALE_AFTER_CYCLES {
        let report = rig.cycle();
        assert_eq!(report.read_failures, 1);
    }
    assert_eq!(rig.cycle().limits, CurrentLimits::ZERO);
    assert_eq!(rig.runner.controller().status().max_cell_voltage, None);
    assert_eq!(rig.runner.stats().read_errors, u64::from(STALE_AFTER_CYCLES) + 1);
}

#[test]
fn failed_activation_write_is_retried() {
    let mut rig = Rig::new(4, "");
    rig.rack().fail_writes(0x201C, true);
    let report = rig.cycle();
    assert_eq!(report.write_failures, 1);

    rig.rack().fail_writes(0x201C, false);
    rig.cycle();
    assert_eq!(rig.rack().writes_to(0x201C), vec![60]);
    assert_eq!(rig.rack().writes_to(0x2050).len(), 2);

    rig.cycles(3);
    assert_eq!(rig.rack().writes_to(0x201C), vec![60]);
}

#[test]
fn failed_contactor_write_is_resent() {
    let mut rig = Rig::new(4, "max_start_time_s = 3");
    rig.rack().fail_writes(CONTROL, true);
    rig.run_until(5, |r| r.state() == LifecycleState::Init);
    rig.cycle();
    assert_eq!(rig.runner.stats().write_errors, 1);

    rig.rack().fail_writes(CONTROL, false);
    rig.run_until(15, Rig::running);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1]);
}

#[test]
fn disconnect_aborts_cycle() {
    let mut rig = Rig::started(4, "");
    rig.rack().set_disconnected(true);
    rig.now += CYCLE;
    let err = rig.runner.run_cycle(rig.now).unwrap_err();
    assert_eq!(err, CycleError::Transport(TransportError::Disconnected));
}
