//! Supervisory lifecycle state machine.
//!
//! Perpetual loop: UNDEFINED → OFF → INIT → RUNNING, with STOPPING, ERROR,
//! ERRORDELAY, PENDING and the drift recovery branch. One [`step`] per
//! cycle. All waits are deadlines compared against the cycle timestamp.
//!
//! Every step emits at most one [`LifecycleEffect`]. Contactor commands go
//! through the [`ContactorDriver`] and are therefore idempotent.
//!
//! [`step`]: LifecycleMachine::step

use std::time::{Duration, Instant};

use bms_common::rack::config::RackConfig;
use bms_common::rack::state::{
    ContactorCommand, ContactorFeedback, DriftRecoveryStep, LifecycleState,
};
use tracing::{info, warn};

use crate::contactor::ContactorDriver;

// ─── Inputs / Outputs ───────────────────────────────────────────────

/// Timing parameters of the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTiming {
    pub error_level2_delay: Duration,
    pub max_start_time: Duration,
    pub max_start_attempts: u32,
    pub start_unsuccessful_delay: Duration,
    pub pending_tolerance: Duration,
}

impl From<&RackConfig> for LifecycleTiming {
    fn from(config: &RackConfig) -> Self {
        Self {
            error_level2_delay: config.error_level2_delay(),
            max_start_time: config.max_start_time(),
            max_start_attempts: config.max_start_attempts,
            start_unsuccessful_delay: config.start_unsuccessful_delay(),
            pending_tolerance: config.pending_tolerance(),
        }
    }
}

/// Per-cycle inputs derived from the snapshot.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleInputs {
    pub now: Instant,
    /// `None` until the contactor register has been read.
    pub feedback: Option<ContactorFeedback>,
    pub is_error: bool,
    pub drift: bool,
}

impl LifecycleInputs {
    #[inline]
    fn is_running(&self) -> bool {
        self.feedback == Some(ContactorFeedback::OnGrid)
    }

    #[inline]
    fn is_stopped(&self) -> bool {
        self.feedback == Some(ContactorFeedback::CutOff)
    }

    /// Feedback was read and decodes to a known value.
    #[inline]
    fn has_known_feedback(&self) -> bool {
        self.feedback.is_some_and(ContactorFeedback::is_known)
    }
}

/// Register write requested by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEffect {
    Contactor(ContactorCommand),
    /// Write the sleep register.
    Sleep,
    /// Write the system-reset register.
    Reset,
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepOutcome {
    pub effect: Option<LifecycleEffect>,
    /// True only while RUNNING with nothing wrong this cycle.
    pub ready_for_work: bool,
    /// `(from, to)` if the state changed.
    pub transition: Option<(LifecycleState, LifecycleState)>,
}

// ─── Machine ────────────────────────────────────────────────────────

/// Lifecycle state plus the timers and counters that survive cycles.
#[derive(Debug, Clone, Default)]
pub struct LifecycleMachine {
    state: LifecycleState,
    unsuccessful_starts: u32,
    error_delay_until: Option<Instant>,
    start_deadline: Option<Instant>,
    pending_since: Option<Instant>,
    drift_step: DriftRecoveryStep,
    start_attempts_exhausted: bool,
}

impl LifecycleMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[inline]
    pub fn unsuccessful_starts(&self) -> u32 {
        self.unsuccessful_starts
    }

    #[inline]
    pub fn drift_step(&self) -> DriftRecoveryStep {
        self.drift_step
    }

    /// True while waiting out the delay after exhausted start attempts.
    #[inline]
    pub fn start_attempts_exhausted(&self) -> bool {
        self.start_attempts_exhausted
    }

    /// Force UNDEFINED, e.g. after a start/stop target change. Counters
    /// survive; pending and drift progress do not.
    pub fn force_undefined(&mut self) {
        self.pending_since = None;
        self.start_deadline = None;
        self.drift_step = DriftRecoveryStep::None;
        self.transition_to(LifecycleState::Undefined);
    }

    /// Advance one cycle towards a running rack.
    pub fn step(
        &mut self,
        inputs: &LifecycleInputs,
        contactor: &mut ContactorDriver,
        timing: &LifecycleTiming,
    ) -> StepOutcome {
        let from = self.state;
        let mut outcome = StepOutcome::default();

        let command = match self.state {
            LifecycleState::Undefined => {
                self.resolve(inputs);
                None
            }
            LifecycleState::Pending => self.step_pending(inputs, contactor, timing),
            LifecycleState::Off => {
                if inputs.has_known_feedback() {
                    self.start_deadline = Some(inputs.now + timing.max_start_time);
                    self.transition_to(LifecycleState::Init);
                }
                contactor.start(inputs.feedback)
            }
            LifecycleState::Init => self.step_init(inputs, contactor, timing),
            LifecycleState::Running => {
                if inputs.is_error {
                    self.transition_to(LifecycleState::Error);
                } else if inputs.drift {
                    self.drift_step = DriftRecoveryStep::None;
                    self.transition_to(LifecycleState::ErrorCellVoltagesDrift);
                } else if !inputs.is_running() {
                    self.transition_to(LifecycleState::Undefined);
                } else {
                    outcome.ready_for_work = true;
                }
                None
            }
            LifecycleState::Stopping => {
                if inputs.is_error {
                    self.transition_to(LifecycleState::Error);
                } else if inputs.is_stopped() {
                    self.transition_to(LifecycleState::Off);
                }
                None
            }
            LifecycleState::Error => self.enter_error_delay(inputs, contactor, timing),
            LifecycleState::ErrorDelay => self.step_error_delay(inputs, contactor),
            LifecycleState::ErrorCellVoltagesDrift => {
                outcome.effect = self.step_drift_recovery();
                None
            }
        };

        if let Some(command) = command {
            outcome.effect = Some(LifecycleEffect::Contactor(command));
        }
        if self.state != from {
            outcome.transition = Some((from, self.state));
        }
        outcome
    }

    /// Advance one cycle while the commanded target is STOP.
    ///
    /// Error handling and drift recovery run as usual. Everywhere else the
    /// contactor is opened and the state reflects the feedback.
    pub fn step_stop_target(
        &mut self,
        inputs: &LifecycleInputs,
        contactor: &mut ContactorDriver,
        timing: &LifecycleTiming,
    ) -> StepOutcome {
        if matches!(
            self.state,
            LifecycleState::Error | LifecycleState::ErrorDelay | LifecycleState::ErrorCellVoltagesDrift
        ) {
            return self.step(inputs, contactor, timing);
        }

        let from = self.state;
        let mut outcome = StepOutcome::default();
        self.pending_since = None;
        self.start_deadline = None;

        if inputs.is_error {
            self.transition_to(LifecycleState::Error);
        } else {
            outcome.effect = contactor.stop(inputs.feedback).map(LifecycleEffect::Contactor);
            if inputs.is_stopped() {
                self.transition_to(LifecycleState::Off);
            } else {
                self.transition_to(LifecycleState::Stopping);
            }
        }

        if self.state != from {
            outcome.transition = Some((from, self.state));
        }
        outcome
    }

    // ── Per-state handlers ──

    fn resolve(&mut self, inputs: &LifecycleInputs) {
        if inputs.is_error {
            self.transition_to(LifecycleState::Error);
        } else if inputs.is_stopped() {
            self.transition_to(LifecycleState::Off);
        } else if inputs.is_running() {
            self.transition_to(LifecycleState::Running);
        } else if inputs.feedback.is_some() {
            self.pending_since = Some(inputs.now);
            self.transition_to(LifecycleState::Pending);
        }
    }

    fn step_pending(
        &mut self,
        inputs: &LifecycleInputs,
        contactor: &mut ContactorDriver,
        timing: &LifecycleTiming,
    ) -> Option<ContactorCommand> {
        let since = *self.pending_since.get_or_insert(inputs.now);
        if inputs.is_error {
            self.leave_pending(LifecycleState::Error);
        } else if inputs.is_stopped() {
            self.leave_pending(LifecycleState::Off);
        } else if inputs.is_running() {
            self.leave_pending(LifecycleState::Running);
        } else if inputs.now > since + timing.pending_tolerance {
            warn!("Contactor feedback ambiguous for too long, forcing STOP");
            self.leave_pending(LifecycleState::Off);
            return contactor.stop(inputs.feedback);
        }
        None
    }

    fn leave_pending(&mut self, next: LifecycleState) {
        self.pending_since = None;
        self.transition_to(next);
    }

    fn step_init(
        &mut self,
        inputs: &LifecycleInputs,
        contactor: &mut ContactorDriver,
        timing: &LifecycleTiming,
    ) -> Option<ContactorCommand> {
        if inputs.is_running() {
            self.unsuccessful_starts = 0;
            self.start_deadline = None;
            self.transition_to(LifecycleState::Running);
            return None;
        }

        let deadline = *self
            .start_deadline
            .get_or_insert(inputs.now + timing.max_start_time);
        if inputs.now <= deadline {
            return None;
        }

        self.start_deadline = None;
        let command = contactor.stop(inputs.feedback);
        self.unsuccessful_starts += 1;
        warn!(
            attempt = self.unsuccessful_starts,
            max = timing.max_start_attempts,
            "Contactor did not reach ON_GRID in time"
        );

        if self.unsuccessful_starts >= timing.max_start_attempts {
            self.unsuccessful_starts = 0;
            self.error_delay_until = Some(inputs.now + timing.start_unsuccessful_delay);
            self.start_attempts_exhausted = true;
            self.transition_to(LifecycleState::ErrorDelay);
        } else {
            self.transition_to(LifecycleState::Stopping);
        }
        command
    }

    fn enter_error_delay(
        &mut self,
        inputs: &LifecycleInputs,
        contactor: &mut ContactorDriver,
        timing: &LifecycleTiming,
    ) -> Option<ContactorCommand> {
        let command = contactor.stop(inputs.feedback);
        self.error_delay_until = Some(inputs.now + timing.error_level2_delay);
        self.transition_to(LifecycleState::ErrorDelay);
        command
    }

    fn step_error_delay(
        &mut self,
        inputs: &LifecycleInputs,
        contactor: &mut ContactorDriver,
    ) -> Option<ContactorCommand> {
        let expired = self
            .error_delay_until
            .is_none_or(|deadline| inputs.now > deadline);
        if !expired {
            return contactor.stop(inputs.feedback);
        }

        self.error_delay_until = None;
        self.start_attempts_exhausted = false;
        if inputs.is_error {
            self.transition_to(LifecycleState::Error);
        } else {
            self.transition_to(LifecycleState::Off);
        }
        None
    }

    fn step_drift_recovery(&mut self) -> Option<LifecycleEffect> {
        let current = self.drift_step;
        self.drift_step = current.next();
        match current {
            DriftRecoveryStep::None => None,
            DriftRecoveryStep::Sleep => Some(LifecycleEffect::Sleep),
            DriftRecoveryStep::Reset => Some(LifecycleEffect::Reset),
            DriftRecoveryStep::Finished => {
                self.transition_to(LifecycleState::Undefined);
                None
            }
        }
    }

    fn transition_to(&mut self, next: LifecycleState) {
        if self.state != next {
            info!(from = ?self.state, to = ?next, "Lifecycle transition");
            self.state = next;
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
