//! Integration test: slave auto-discovery and voltage-range provisioning.

use bms_common::rack::state::{ConfiguringState, ContactorFeedback};

use super::rig::Rig;

const MODE: &str = "operating_mode = \"configure\"";

fn completed(rig: &Rig) -> bool {
    rig.runner.controller().configuring_completed()
}

#[test]
fn full_run_provisions_and_restarts() {
    let mut rig = Rig::new(5, MODE);
    rig.cycle(); // target change
    let report = rig.cycle();
    let addresses: Vec<u16> = report.writes.iter().map(|w| w.address).collect();
    assert_eq!(addresses, vec![0x20C1]);
    assert_eq!(report.writes[0].value, 5);

    rig.run_until(60, completed);
    assert_eq!(rig.runner.controller().configuring_state(), ConfiguringState::None);

    let rack = rig.rack();
    assert_eq!(rack.writes_to(0x2014), vec![1]);
    assert_eq!(rack.writes_to(0x2019), vec![1]);
    // 5 modules: 5 × 43.8 V level-1 over-voltage, raw in 0.1 V.
    assert_eq!(rack.get(0x2082), 2190);
    assert_eq!(rack.get(0x2083), 2130);
    assert_eq!(rack.get(0x2088), 1740);
    assert_eq!(rack.get(0x2089), 1800);
    assert_eq!(rack.get(0x2042), 2220);
    assert_eq!(rack.get(0x2043), 2160);
    assert_eq!(rack.get(0x2048), 1680);
    assert_eq!(rack.get(0x2049), 1740);
    assert_eq!(rack.reset_count(), 1);

    // Reset before restart.
    let log: Vec<u16> = rack.write_log().iter().map(|(a, _)| *a).collect();
    let reset = log.iter().position(|&a| a == 0x2004).unwrap();
    let restart = log.iter().rposition(|&a| a == 0x2010).unwrap();
    assert!(reset < restart);
}

#[test]
fn completed_run_stays_idle() {
    let mut rig = Rig::new(3, MODE);
    rig.run_until(60, completed);
    rig.cycles(3);
    let writes = rig.rack().write_log().len();
    rig.cycles(20);
    assert_eq!(rig.rack().write_log().len(), writes);
    assert_eq!(rig.rack().contactor_feedback(), Some(ContactorFeedback::OnGrid));
}

#[test]
fn auto_id_failure_restarts_from_module_count() {
    let mut rig = Rig::new(4, MODE);
    rig.rack().inject_auto_id_failures(1);
    rig.run_until(80, completed);

    let rack = rig.rack();
    assert_eq!(rack.writes_to(0x20C1), vec![4, 4]);
    assert_eq!(rack.writes_to(0x2014), vec![1, 1]);
    assert_eq!(rack.writes_to(0x2019), vec![1]);
}

#[test]
fn auto_id_result_waits_for_settle_delay() {
    let mut rig = Rig::new(4, MODE);
    rig.cycles(3);
    assert_eq!(
        rig.runner.controller().configuring_state(),
        ConfiguringState::CheckIdAutoConfiguring
    );
    // Result is SUCCESS after three reads, but the settle delay is 5 s.
    rig.cycles(5);
    assert_eq!(
        rig.runner.controller().configuring_state(),
        ConfiguringState::CheckIdAutoConfiguring
    );
    rig.cycle();
    assert_eq!(
        rig.runner.controller().configuring_state(),
        ConfiguringState::SetTemperatureIdAutoConfiguring
    );
}

#[test]
fn lifecycle_is_idle_while_configuring() {
    let mut rig = Rig::new(4, MODE);
    rig.cycles(10);
    assert!(!rig.runner.controller().ready_for_work());
    assert_eq!(
        rig.runner.controller().lifecycle_state(),
        bms_common::rack::state::LifecycleState::Undefined
    );
}
