//! Cycle runner: pre-read → read → decode → evaluate → write.
//!
//! One call to [`CycleRunner::run_cycle`] per tick. The runner owns the
//! transport, the register image and the controller. It never blocks
//! inside a cycle; [`CycleRunner::run`] only sleeps the remainder of the
//! cycle budget between ticks.
//!
//! ## Polling
//!
//! High-priority blocks are read every cycle. Low-priority blocks are read
//! one per cycle, round-robin. A block that fails [`STALE_AFTER_CYCLES`]
//! times in a row is invalidated in the image, so its values decode as
//! undetermined instead of silently aging.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bms_common::rack::config::SupervisorConfig;
use bms_common::transport::{RegisterTransport, TransportError};
use heapless::Vec as FixedVec;
use tracing::{debug, info, trace, warn};

use crate::codec::table::{temperature_block_start, voltage_block_start};
use crate::codec::{RegisterImage, Writes};
use crate::controller::RackController;
use crate::safety::protection::CurrentLimits;
use crate::snapshot::TelemetrySnapshot;

/// Consecutive read failures before a block's registers become undetermined.
pub const STALE_AFTER_CYCLES: u32 = 5;

/// Blocks read in one cycle: all high-priority blocks plus one low.
pub const MAX_BLOCKS_PER_CYCLE: usize = 4;

// ─── Poll Plan ──────────────────────────────────────────────────────

/// Read priority of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

/// One contiguous holding-register read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBlock {
    pub start: u16,
    pub count: u16,
    pub priority: Priority,
}

impl PollBlock {
    const fn high(start: u16, count: u16) -> Self {
        Self { start, count, priority: Priority::High }
    }

    const fn low(start: u16, count: u16) -> Self {
        Self { start, count, priority: Priority::Low }
    }
}

const CONTROL: PollBlock = PollBlock::high(0x2000, 0x1F);
const SUMMARY: PollBlock = PollBlock::high(0x2100, 0x1B);
const CRITICAL: PollBlock = PollBlock::high(0x2140, 0x22);
const VOLTAGE_RANGES: PollBlock = PollBlock::low(0x2082, 0x07);
const WORK_PARAMETERS: PollBlock = PollBlock::low(0x20C1, 0x01);
const HISTORY: PollBlock = PollBlock::low(0x2180, 0x36);
const STOP_PARAMETERS: PollBlock = PollBlock::low(0x2040, 0x22);
const WARN_PARAMETERS: PollBlock = PollBlock::low(0x2080, 0x23);

/// Which blocks to read in which cycle.
#[derive(Debug, Clone)]
pub struct PollPlan {
    high: Vec<PollBlock>,
    low: Vec<PollBlock>,
    next_low: usize,
}

impl PollPlan {
    pub fn new(module_count: u8, reduce_tasks: bool) -> Self {
        let mut low = vec![VOLTAGE_RANGES, WORK_PARAMETERS, HISTORY];
        if !reduce_tasks {
            low.push(STOP_PARAMETERS);
            low.push(WARN_PARAMETERS);
        }
        for module in 0..module_count {
            low.push(PollBlock::low(voltage_block_start(module), 12));
            low.push(PollBlock::low(temperature_block_start(module), 12));
        }
        Self {
            high: vec![CONTROL, SUMMARY, CRITICAL],
            low,
            next_low: 0,
        }
    }

    /// Blocks for the next cycle.
    pub fn next_cycle(&mut self) -> FixedVec<PollBlock, MAX_BLOCKS_PER_CYCLE> {
        let mut blocks = FixedVec::new();
        for &block in &self.high {
            let pushed = blocks.push(block);
            debug_assert!(pushed.is_ok(), "poll plan exceeds {MAX_BLOCKS_PER_CYCLE} blocks");
        }
        if let Some(&block) = self.low.get(self.next_low) {
            let pushed = blocks.push(block);
            debug_assert!(pushed.is_ok(), "poll plan exceeds {MAX_BLOCKS_PER_CYCLE} blocks");
            self.next_low = (self.next_low + 1) % self.low.len();
        }
        blocks
    }

    /// Every block of the plan.
    pub fn blocks(&self) -> impl Iterator<Item = &PollBlock> {
        self.high.iter().chain(&self.low)
    }

    /// Cycles needed to read every low-priority block once.
    pub fn round_length(&self) -> usize {
        self.low.len()
    }
}

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-cycle timing and error counters.
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    pub max_cycle_ns: i64,
    sum_cycle_ns: i64,
    /// Cycles that exceeded the configured cycle time.
    pub overruns: u64,
    pub read_errors: u64,
    pub write_errors: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            read_errors: 0,
            write_errors: 0,
        }
    }

    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        if duration_ns > self.max_cycle_ns {
            self.max_cycle_ns = duration_ns;
        }
        self.sum_cycle_ns += duration_ns;
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Error Type ─────────────────────────────────────────────────────

/// Errors that abort the run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    /// Transport failed fatally.
    Transport(TransportError),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<TransportError> for CycleError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ─── Cycle Report ───────────────────────────────────────────────────

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub limits: CurrentLimits,
    pub blocks_read: usize,
    pub read_failures: usize,
    /// Writes handed to the transport, including failed ones.
    pub writes: Writes,
    pub write_failures: usize,
}

// ─── Runner ─────────────────────────────────────────────────────────

/// Drives a [`RackController`] over a [`RegisterTransport`].
pub struct CycleRunner<T: RegisterTransport> {
    transport: T,
    controller: RackController,
    image: RegisterImage,
    plan: PollPlan,
    /// Consecutive failures per block start address.
    failures: BTreeMap<u16, u32>,
    stats: CycleStats,
    module_count: u8,
    cycle_time: Duration,
    status_interval: u64,
}

impl<T: RegisterTransport> CycleRunner<T> {
    pub fn new(config: &SupervisorConfig, transport: T) -> Self {
        let rack = &config.rack;
        info!(
            transport = transport.name(),
            modules = rack.module_count,
            mode = ?rack.operating_mode,
            "Cycle runner created"
        );
        Self {
            plan: PollPlan::new(rack.module_count, rack.reduce_tasks),
            module_count: rack.module_count,
            cycle_time: rack.cycle_time(),
            status_interval: u64::from(rack.status_interval_cycles.max(1)),
            controller: RackController::new(config),
            image: RegisterImage::new(),
            failures: BTreeMap::new(),
            stats: CycleStats::new(),
            transport,
        }
    }

    pub fn controller(&self) -> &RackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut RackController {
        &mut self.controller
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn image(&self) -> &RegisterImage {
        &self.image
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn plan(&self) -> &PollPlan {
        &self.plan
    }

    /// Execute one cycle at `now`.
    ///
    /// # Errors
    /// Returns `CycleError::Transport` only for fatal transport errors.
    /// Everything else is logged, counted and retried next cycle.
    pub fn run_cycle(&mut self, now: Instant) -> Result<CycleReport, CycleError> {
        let mut report = CycleReport {
            limits: self.controller.pre_read(),
            ..CycleReport::default()
        };

        for block in self.plan.next_cycle() {
            match self.transport.read_holding(block.start, block.count) {
                Ok(words) => {
                    trace!(start = format_args!("{:#06X}", block.start), count = words.len(), "Block read");
                    self.image.store_block(block.start, &words);
                    self.failures.remove(&block.start);
                    report.blocks_read += 1;
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    report.read_failures += 1;
                    self.stats.read_errors += 1;
                    self.on_read_failed(block, &e);
                }
            }
        }

        let snapshot = TelemetrySnapshot::decode(&self.image, self.module_count);
        let writes = self.controller.post_read(now, snapshot);

        for write in &writes {
            match self.transport.write_single(write.address, write.raw) {
                Ok(()) => trace!(
                    address = format_args!("{:#06X}", write.address),
                    raw = write.raw,
                    "Register written"
                ),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    debug!(error = %e, "Write rejected by transport");
                    report.write_failures += 1;
                    self.stats.write_errors += 1;
                    self.controller.on_write_failed(write);
                }
            }
        }
        report.writes = writes;
        Ok(report)
    }

    fn on_read_failed(&mut self, block: PollBlock, error: &TransportError) {
        let failures = self.failures.entry(block.start).or_insert(0);
        *failures += 1;
        warn!(
            start = format_args!("{:#06X}", block.start),
            failures = *failures,
            error = %error,
            "Block read failed"
        );
        if *failures == STALE_AFTER_CYCLES {
            warn!(
                start = format_args!("{:#06X}", block.start),
                "Block stale, values now undetermined"
            );
            self.image.invalidate_block(block.start, block.count);
        }
    }

    /// Run until `shutdown` is set or `max_cycles` cycles have run.
    ///
    /// # Errors
    /// Returns the first fatal [`CycleError`].
    pub fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> Result<(), CycleError> {
        let budget_ns = i64::try_from(self.cycle_time.as_nanos()).unwrap_or(i64::MAX);

        while !shutdown.load(Ordering::Relaxed) {
            if max_cycles.is_some_and(|max| self.stats.cycle_count >= max) {
                break;
            }

            let cycle_start = Instant::now();
            self.run_cycle(cycle_start)?;
            let elapsed = cycle_start.elapsed();
            let duration_ns = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
            self.stats.record(duration_ns);

            if duration_ns > budget_ns {
                self.stats.overruns += 1;
                warn!(duration_ns, budget_ns, "Cycle overrun");
            }

            let summary = self.controller.debug_summary();
            if self.stats.cycle_count % self.status_interval == 0 {
                info!(cycle = self.stats.cycle_count, "{summary}");
            } else {
                debug!(cycle = self.stats.cycle_count, "{summary}");
            }

            if let Some(remaining) = self.cycle_time.checked_sub(elapsed) {
                std::thread::sleep(remaining);
            }
        }

        info!(
            cycles = self.stats.cycle_count,
            avg_cycle_ns = self.stats.avg_cycle_ns(),
            max_cycle_ns = self.stats.max_cycle_ns,
            read_errors = self.stats.read_errors,
            write_errors = self.stats.write_errors,
            "Cycle loop stopped"
        );
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bms_common::consts::MAX_MODULES;
    use std::collections::HashSet;

    #[test]
    fn plan_reads_high_blocks_every_cycle() {
        let mut plan = PollPlan::new(2, false);
        for _ in 0..10 {
            let blocks = plan.next_cycle();
            assert_eq!(blocks.len(), 4);
            assert_eq!(&blocks[..3], &[CONTROL, SUMMARY, CRITICAL]);
            assert_eq!(blocks[3].priority, Priority::Low);
        }
    }

    #[test]
    fn largest_rack_fits_the_per_cycle_block_budget() {
        let mut plan = PollPlan::new(MAX_MODULES, false);
        for _ in 0..plan.round_length() * 2 {
            assert_eq!(plan.next_cycle().len(), MAX_BLOCKS_PER_CYCLE);
        }
    }

    #[test]
    fn plan_round_robins_low_blocks() {
        let mut plan = PollPlan::new(3, false);
        assert_eq!(plan.round_length(), 5 + 6);
        let seen: HashSet<u16> = (0..plan.round_length())
            .map(|_| plan.next_cycle()[3].start)
            .collect();
        assert_eq!(seen.len(), plan.round_length());
        assert!(seen.contains(&0x2800));
        assert!(seen.contains(&0x2C18));
        // Wraps around.
        assert_eq!(plan.next_cycle()[3], VOLTAGE_RANGES);
    }

    #[test]
    fn reduce_tasks_drops_parameter_blocks() {
        let plan = PollPlan::new(1, true);
        let starts: Vec<u16> = plan.blocks().map(|b| b.start).collect();
        assert!(!starts.contains(&0x2040));
        assert!(!starts.contains(&0x2080));
        assert!(starts.contains(&0x2082));
    }

    #[test]
    fn blocks_cover_their_documented_ranges() {
        assert_eq!(CONTROL.start + CONTROL.count - 1, 0x201E);
        assert_eq!(SUMMARY.start + SUMMARY.count - 1, 0x211A);
        assert_eq!(CRITICAL.start + CRITICAL.count - 1, 0x2161);
        assert_eq!(HISTORY.start + HISTORY.count - 1, 0x21B5);
        assert_eq!(STOP_PARAMETERS.start + STOP_PARAMETERS.count - 1, 0x2061);
        assert_eq!(WARN_PARAMETERS.start + WARN_PARAMETERS.count - 1, 0x20A2);
        assert_eq!(VOLTAGE_RANGES.start + VOLTAGE_RANGES.count - 1, 0x2088);
    }

    #[test]
    fn stats_average() {
        let mut stats = CycleStats::new();
        assert_eq!(stats.avg_cycle_ns(), 0);
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.avg_cycle_ns(), 200);
        assert_eq!(stats.max_cycle_ns, 300);
    }

    #[test]
    fn cycle_error_display() {
        let e = CycleError::from(TransportError::Disconnected);
        assert_eq!(e.to_string(), "transport error: transport disconnected");
    }
}
