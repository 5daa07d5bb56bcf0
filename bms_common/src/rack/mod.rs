//! Rack supervisor shared types.
//!
//! Everything the supervisor and its hosts share lives here: state and
//! register enums, alarm bitflags, module-type constants and the
//! configuration structures.

pub mod alarm;
pub mod config;
pub mod module;
pub mod state;
