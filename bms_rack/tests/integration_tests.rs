//! Integration tests for the rack supervisor.
//!
//! These tests drive the cycle runner against the simulated rack, covering
//! workflows that span the codec, alarm evaluation, the lifecycle machine,
//! the configuring sequence and the transport error paths.

mod integration;
