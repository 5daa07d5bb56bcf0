//! Safety evaluation for the rack supervisor.
//!
//! # Modules
//!
//! - [`alarms`]: Severity classification of every alarm flag and the `is_error` predicate
//! - [`drift`]: Cell-voltage drift detection across consecutive cycles
//! - [`protection`]: Charge/discharge current clamp from the previous cycle

pub mod alarms;
pub mod drift;
pub mod protection;

pub use alarms::{AlarmEdge, AlarmEdgeTracker, AlarmFlag, AlarmGroup, AlarmReport};
pub use drift::{CellExtremes, DriftGuard};
pub use protection::CurrentLimits;
