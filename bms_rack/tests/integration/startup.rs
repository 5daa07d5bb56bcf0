//! Integration test: activation, startup and host target changes.

use bms_common::rack::state::{LifecycleState, StartStop};
use bms_rack::safety::protection::CurrentLimits;

use super::rig::Rig;

const CONTROL: u16 = 0x2010;

#[test]
fn activation_writes_go_out_first_and_once() {
    let mut rig = Rig::new(4, "watchdog_s = 90\nsoc_low_alarm_percent = 7");
    let report = rig.cycle();
    let first: Vec<u16> = report.writes.iter().map(|w| w.address).collect();
    assert_eq!(first, vec![0x201C, 0x2050, 0x2051]);

    rig.cycles(10);
    assert_eq!(rig.rack().writes_to(0x201C), vec![90]);
    assert_eq!(rig.rack().writes_to(0x2050), vec![7]);
    assert_eq!(rig.rack().writes_to(0x2051), vec![7]);
}

#[test]
fn cold_start_reaches_running() {
    let mut rig = Rig::new(4, "");
    rig.cycle();
    // Host target arrived before the first cycle: FSM skipped once.
    assert_eq!(rig.state(), LifecycleState::Undefined);

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Off);

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Init);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1]);

    rig.run_until(5, |r| r.state() == LifecycleState::Running);
    rig.cycle();
    assert!(rig.running());
    // START is sent once while feedback catches up.
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1]);
}

#[test]
fn limits_follow_bms_once_ready() {
    let mut rig = Rig::started(4, "");
    let report = rig.cycle();
    assert_eq!(
        report.limits,
        CurrentLimits {
            charge_max_current: 100,
            discharge_max_current: 100,
        }
    );
}

#[test]
fn limits_are_zero_before_ready() {
    let mut rig = Rig::new(4, "");
    for _ in 0..4 {
        assert_eq!(rig.cycle().limits, CurrentLimits::ZERO);
    }
}

#[test]
fn charge_limit_derates_near_full_cells() {
    let mut rig = Rig::started(2, "");
    // Halfway between 3450 and 3600 mV.
    rig.rack().set_all_cell_voltages(3525);
    rig.cycle();
    let report = rig.cycle();
    assert_eq!(report.limits.charge_max_current, 50);
    assert_eq!(report.limits.discharge_max_current, 100);
}

#[test]
fn stop_target_opens_contactor() {
    let mut rig = Rig::started(4, "");
    rig.runner.controller_mut().set_start_stop(StartStop::Stop);

    rig.cycle();
    assert_eq!(rig.state(), LifecycleState::Undefined);
    assert!(!rig.running());

    rig.run_until(5, |r| r.state() == LifecycleState::Off);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1, 0]);

    // Stays off without resending STOP.
    rig.cycles(5);
    assert_eq!(rig.state(), LifecycleState::Off);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1, 0]);
}

#[test]
fn forced_start_ignores_host_target() {
    let mut rig = Rig::new(4, "start_stop = \"start\"");
    rig.runner.controller_mut().set_start_stop(StartStop::Stop);
    rig.run_until(20, Rig::running);
    assert_eq!(rig.runner.controller().status().target, StartStop::Start);
}

#[test]
fn operating_mode_off_keeps_contactor_open() {
    let mut rig = Rig::new(4, "operating_mode = \"off\"");
    rig.rack().set_contactor_feedback(3);
    rig.cycles(5);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![0]);
    assert!(!rig.running());
}

#[test]
fn operating_mode_on_closes_contactor() {
    let mut rig = Rig::new(4, "operating_mode = \"on\"");
    rig.cycles(5);
    assert_eq!(rig.rack().writes_to(CONTROL), vec![1]);
    assert_eq!(
        rig.rack().contactor_feedback(),
        Some(bms_common::rack::state::ContactorFeedback::OnGrid)
    );
}

#[test]
fn status_serializes_for_hosts() {
    let rig = Rig::started(4, "");
    let status = rig.runner.controller().status();
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["state"], "Running");
    assert_eq!(json["ready_for_work"], true);
    assert_eq!(json["capacity_wh"], 12_000);
    assert_eq!(json["soc"], 60);
}
