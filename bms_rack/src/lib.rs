//! # Rack Supervisor
//!
//! Cyclic supervisor for one battery rack reached over a register
//! transport. Every cycle reads the rack's register blocks, decodes a
//! telemetry snapshot, evaluates alarms and cell drift, advances the
//! lifecycle or configuring sequence, and writes back the resulting
//! register commands.
//!
//! ## Layers
//!
//! 1. **codec** - Register table, scaling and the last-read register image
//! 2. **snapshot** - Decoded per-cycle telemetry
//! 3. **safety** - Alarm evaluation, drift detection, current clamp
//! 4. **state** - Lifecycle machine and configuring sequencer
//! 5. **controller** - Per-rack state that survives a cycle
//! 6. **cycle** - Poll plan and the read/evaluate/write runner
//!
//! [`sim::SimulatedRack`] is an in-process transport for tests and the
//! binary's demo mode.

pub mod codec;
pub mod config;
pub mod contactor;
pub mod controller;
pub mod cycle;
pub mod safety;
pub mod sim;
pub mod snapshot;
pub mod state;
