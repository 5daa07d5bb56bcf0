//! Prelude module for common re-exports.
//!
//! `use bms_common::prelude::*;` brings in the types every supervisor
//! component touches without listing individual paths.

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::rack::config::{ProtectionConfig, RackConfig, SupervisorConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_MODULES, MAX_WRITES_PER_CYCLE, SENSORS_PER_MODULE};

// ─── Rack Types ─────────────────────────────────────────────────────
pub use crate::rack::alarm::{FlagStatus, HardwareFailure, RackAlarm, Severity, SlaveCommError};
pub use crate::rack::module::{ModuleParameters, ModuleType};
pub use crate::rack::state::{
    AutoSetFunction, ConfiguringState, ContactorCommand, ContactorFeedback, DriftRecoveryStep,
    LifecycleState, OperatingMode, StartStop, StartStopConfig,
};

// ─── Transport ──────────────────────────────────────────────────────
pub use crate::transport::{RegisterTransport, TransportError};
