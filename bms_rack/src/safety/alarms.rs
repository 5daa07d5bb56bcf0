//! Alarm evaluation and edge logging.
//!
//! Every flag of every packed alarm register is classified by a fixed
//! severity table. The report is a pure function of one snapshot; nothing
//! latches. `is_error` is the OR of all fault-severity flags and of the
//! communication-error bits (intranet bus and configured slaves). Those
//! comm-error bits are labelled warning for display but still feed
//! `is_error`.

use std::collections::BTreeMap;

use bms_common::rack::alarm::{FlagStatus, HardwareFailure, RackAlarm, Severity, SlaveCommError};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::snapshot::TelemetrySnapshot;

// ─── Alarm Identity ─────────────────────────────────────────────────

/// Register group an alarm flag comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmGroup {
    /// Level-2 protection bits (0x2140).
    Level2,
    /// Level-1 warning bits (0x2141).
    Level1,
    /// Protect flag status (0x2008).
    ProtectFlag,
    /// Alarm flag status (0x2007).
    AlarmFlag,
    /// Hardware failure word (0x2185).
    HardwareFailure,
    /// Slave communication errors (0x2183/0x2184).
    SlaveComm,
}

/// One active alarm flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AlarmFlag {
    pub group: AlarmGroup,
    pub name: &'static str,
    pub severity: Severity,
}

impl std::fmt::Display for AlarmFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.group, self.name)
    }
}

// ─── Report ─────────────────────────────────────────────────────────

/// Active alarms of one cycle plus the aggregate error predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlarmReport {
    active: Vec<AlarmFlag>,
    is_error: bool,
}

impl AlarmReport {
    /// True if the lifecycle must treat the rack as faulted.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn active(&self) -> &[AlarmFlag] {
        &self.active
    }

    /// True if the named flag of `group` is active.
    pub fn contains(&self, group: AlarmGroup, name: &str) -> bool {
        self.active
            .iter()
            .any(|a| a.group == group && a.name == name)
    }

    /// Highest severity among active flags.
    pub fn worst(&self) -> Option<Severity> {
        self.active.iter().map(|a| a.severity).max()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.active.iter().filter(|a| a.severity == severity).count()
    }
}

// ─── Evaluator ──────────────────────────────────────────────────────

/// Classify every decoded flag of `snapshot`.
///
/// Undetermined registers contribute nothing.
pub fn evaluate(snapshot: &TelemetrySnapshot) -> AlarmReport {
    let mut active = Vec::new();
    let mut is_error = false;

    if let Some(bits) = snapshot.level2_alarms() {
        push_all(&mut active, AlarmGroup::Level2, bits.iter_names(), |_| Severity::Fault);
    }
    if let Some(bits) = snapshot.level1_alarms() {
        push_all(&mut active, AlarmGroup::Level1, bits.iter_names(), |_| Severity::Warning);
    }
    if let Some(bits) = snapshot.protect_flag_status() {
        push_all(&mut active, AlarmGroup::ProtectFlag, bits.iter_names(), |_| Severity::Fault);
    }
    if let Some(bits) = snapshot.alarm_flag_status() {
        push_all(&mut active, AlarmGroup::AlarmFlag, bits.iter_names(), |_| Severity::Warning);
    }
    if let Some(bits) = snapshot.hardware_failure() {
        push_all(
            &mut active,
            AlarmGroup::HardwareFailure,
            bits.iter_names(),
            HardwareFailure::severity,
        );
        if bits.has_comm_error() {
            is_error = true;
        }
    }

    if active.iter().any(|a| a.severity == Severity::Fault) {
        is_error = true;
    }

    if let Some(errors) = snapshot.slave_comm_errors() {
        let configured = errors & SlaveCommError::configured(snapshot.module_count());
        push_all(&mut active, AlarmGroup::SlaveComm, configured.iter_names(), |_| {
            Severity::Warning
        });
        if !configured.is_empty() {
            is_error = true;
        }
    }

    AlarmReport { active, is_error }
}

fn push_all<F: Copy>(
    active: &mut Vec<AlarmFlag>,
    group: AlarmGroup,
    names: impl Iterator<Item = (&'static str, F)>,
    severity: impl Fn(F) -> Severity,
) {
    for (name, flag) in names {
        active.push(AlarmFlag {
            group,
            name,
            severity: severity(flag),
        });
    }
}

// ─── Edge Tracker ───────────────────────────────────────────────────

/// Logs alarm activation and clearing once per edge.
#[derive(Debug, Default)]
pub struct AlarmEdgeTracker {
    previous: BTreeMap<(AlarmGroup, &'static str), Severity>,
}

/// Direction of an alarm edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEdge {
    Raised(AlarmFlag),
    Cleared(AlarmFlag),
}

impl AlarmEdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare against the previous report, log and return the edges.
    pub fn update(&mut self, report: &AlarmReport) -> Vec<AlarmEdge> {
        let current: BTreeMap<_, _> = report
            .active()
            .iter()
            .map(|a| ((a.group, a.name), a.severity))
            .collect();

        let mut edges = Vec::new();
        for (&(group, name), &severity) in &current {
            if !self.previous.contains_key(&(group, name)) {
                let flag = AlarmFlag { group, name, severity };
                match severity {
                    Severity::Fault => error!(alarm = %flag, "Alarm raised"),
                    Severity::Warning => warn!(alarm = %flag, "Alarm raised"),
                    Severity::Informational => info!(alarm = %flag, "Alarm raised"),
                }
                edges.push(AlarmEdge::Raised(flag));
            }
        }
        for (&(group, name), &severity) in &self.previous {
            if !current.contains_key(&(group, name)) {
                let flag = AlarmFlag { group, name, severity };
                info!(alarm = %flag, "Alarm cleared");
                edges.push(AlarmEdge::Cleared(flag));
            }
        }

        self.previous = current;
        edges
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
