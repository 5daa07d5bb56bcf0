//! Rack Supervisor Common Library
//!
//! Shared constants, configuration loading, rack state and alarm types,
//! and the register transport seam used by every crate of the workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Register bases, command words, sequencing constants
//! - [`config`] - Configuration loading traits and types
//! - [`rack`] - Rack state enums, alarm bitflags, module types, rack config
//! - [`transport`] - Register transport trait and its error type
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use bms_common::prelude::*;
//!
//! let params = ModuleType::Module3000Wh.parameters();
//! assert_eq!(params.rack_capacity_wh(2), 6_000);
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod rack;
pub mod transport;
