//! Supervisory state machines.
//!
//! - [`lifecycle`]: contactor lifecycle FSM run in DEFAULT mode
//! - [`configuring`]: auto-ID and provisioning sequence run in CONFIGURE mode
//!
//! Both are plain values advanced by one `step` call per cycle. Time comes
//! in through the step inputs, so tests drive them with synthetic instants.

pub mod configuring;
pub mod lifecycle;

pub use configuring::{ConfiguringInputs, ConfiguringOutcome, ConfiguringSequencer};
pub use lifecycle::{LifecycleEffect, LifecycleInputs, LifecycleMachine, LifecycleTiming, StepOutcome};
