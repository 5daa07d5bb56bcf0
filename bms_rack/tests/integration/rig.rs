//! Test rig: a cycle runner over a simulated rack with a synthetic clock.

use std::time::{Duration, Instant};

use bms_common::rack::state::{LifecycleState, StartStop};
use bms_rack::config::load_config_from_str;
use bms_rack::cycle::{CycleReport, CycleRunner};
use bms_rack::sim::SimulatedRack;

pub const CYCLE: Duration = Duration::from_secs(1);

pub struct Rig {
    pub runner: CycleRunner<SimulatedRack>,
    pub now: Instant,
}

impl Rig {
    /// Rig with `modules` modules, host target START, `extra` appended to `[rack]`.
    pub fn new(modules: u8, extra: &str) -> Self {
        let text = format!(
            "[shared]\nservice_name = \"rack-it\"\n\n[rack]\nmodule_count = {modules}\n{extra}\n"
        );
        let loaded = load_config_from_str(&text).expect("test config must be valid");
        let transport = SimulatedRack::new(modules);
        let mut runner = CycleRunner::new(&loaded.config, transport);
        runner.controller_mut().set_start_stop(StartStop::Start);
        Self {
            runner,
            now: Instant::now(),
        }
    }

    /// One cycle, one second after the previous one.
    pub fn cycle(&mut self) -> CycleReport {
        self.now += CYCLE;
        self.runner.run_cycle(self.now).expect("cycle failed")
    }

    pub fn cycles(&mut self, n: usize) {
        for _ in 0..n {
            self.cycle();
        }
    }

    /// Cycle until `done` holds; panics after `max` cycles.
    pub fn run_until(&mut self, max: usize, mut done: impl FnMut(&Self) -> bool) -> usize {
        for n in 0..max {
            if done(self) {
                return n;
            }
            self.cycle();
        }
        assert!(done(self), "condition not reached within {max} cycles, state {:?}", self.state());
        max
    }

    /// Let time pass without running a cycle.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    pub fn rack(&mut self) -> &mut SimulatedRack {
        self.runner.transport_mut()
    }

    pub fn state(&self) -> LifecycleState {
        self.runner.controller().lifecycle_state()
    }

    pub fn running(&self) -> bool {
        self.runner.controller().ready_for_work()
    }

    /// Start up and wait for ready-for-work.
    pub fn started(modules: u8, extra: &str) -> Self {
        let mut rig = Self::new(modules, extra);
        rig.run_until(20, Rig::running);
        rig
    }
}
