//! Diff engine: decide whether the freshly merged set replaces the persisted one.
//!
//! | sources failed | comparison          | decision          |
//! |----------------|---------------------|-------------------|
//! | no             | same members        | `NoChange`        |
//! | no             | different members   | `Publish`         |
//! | yes            | current > previous  | `DegradedPublish` |
//! | yes            | current < previous  | `Abstain`         |
//! | yes            | equal cardinality   | `NoChange`        |
//!
//! Under partial failure the published set may grow but never shrink.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use similar::TextDiff;

use hostmap_core::{RecordSet, SourceErrors};

/// Outcome of comparing current against previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decision {
    NoChange,
    Publish,
    /// Some source failed but the set still grew; publish best effort.
    DegradedPublish,
    /// Some source failed and the set would shrink; keep the persisted set.
    Abstain,
}

impl Decision {
    pub fn should_publish(self) -> bool {
        matches!(self, Decision::Publish | Decision::DegradedPublish)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::NoChange => write!(f, "no-change"),
            Decision::Publish => write!(f, "publish"),
            Decision::DegradedPublish => write!(f, "degraded-publish"),
            Decision::Abstain => write!(f, "abstain"),
        }
    }
}

/// Apply the decision table.
pub fn decide(current: &RecordSet, previous: &RecordSet, errors: &SourceErrors) -> Decision {
    if !errors.any() {
        return if current.same_members(previous) {
            Decision::NoChange
        } else {
            Decision::Publish
        };
    }
    match current.len().cmp(&previous.len()) {
        Ordering::Greater => Decision::DegradedPublish,
        Ordering::Less => Decision::Abstain,
        Ordering::Equal => Decision::NoChange,
    }
}

/// Emit the decision log line. Always carries `failed_sources` so "nothing
/// changed" and "something failed" are distinguishable.
pub(crate) fn log_decision(decision: Decision, current: usize, previous: usize, errors: &SourceErrors) {
    match decision {
        Decision::NoChange | Decision::Publish => tracing::info!(
            decision = %decision,
            current,
            previous,
            failed_sources = %errors,
            "diff decision",
        ),
        Decision::DegradedPublish | Decision::Abstain => tracing::warn!(
            decision = %decision,
            current,
            previous,
            failed_sources = %errors,
            "diff decision under partial source failure",
        ),
    }
}

// ---------------------------------------------------------------------------
// Listing diff
// ---------------------------------------------------------------------------

/// One `name address` line per record, in canonical order.
pub fn listing(set: &RecordSet) -> String {
    set.canonical()
        .iter()
        .map(|r| format!("{} {}\n", r.name, r.address))
        .collect()
}

/// Unified diff between two record listings; empty when membership matches.
pub fn unified_diff(previous: &RecordSet, current: &RecordSet) -> String {
    let old = listing(previous);
    let new = listing(current);
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header("a/persisted", "b/computed")
        .context_radius(3)
        .to_string()
}
