//! Step-function lookup over a store's sorted observations
//!
//! A status holds from its observation until the next one. At the start of
//! an evaluation span the boundary fill policy decides what to assume when
//! no earlier observation exists.

use chrono::{DateTime, Utc};

use crate::model::{Observation, Status};
use crate::schedule::BusinessInterval;

/// Result of a point lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Active,
    Inactive,
    /// No observation at or before the instant
    Unknown,
}

impl From<Status> for Sample {
    fn from(status: Status) -> Self {
        match status {
            Status::Active => Sample::Active,
            Status::Inactive => Sample::Inactive,
        }
    }
}

/// How the status at the start of a span was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Carried from an observation at or before the span start
    Forward,
    /// Taken from the earliest observation inside the span
    Backward,
    /// Nothing known; counted as down
    Inactive,
}

/// Last observation with `timestamp_utc <= t`
pub fn last_at_or_before(observations: &[Observation], t: DateTime<Utc>) -> Option<&Observation> {
    let idx = observations.partition_point(|o| o.timestamp_utc <= t);
    idx.checked_sub(1).map(|i| &observations[i])
}

pub fn status_at(observations: &[Observation], t: DateTime<Utc>) -> Sample {
    last_at_or_before(observations, t)
        .map(|o| o.status.into())
        .unwrap_or(Sample::Unknown)
}

/// Status in force at `span.start`, resolved with the boundary fill policy.
///
/// `now` is the closed right edge of the enclosing window. A span ending at
/// `now` may be back-filled from an observation taken exactly at `now`.
pub fn initial_status(
    observations: &[Observation],
    span: &BusinessInterval,
    now: DateTime<Utc>,
) -> (Status, Fill) {
    match status_at(observations, span.start) {
        Sample::Active => return (Status::Active, Fill::Forward),
        Sample::Inactive => return (Status::Inactive, Fill::Forward),
        Sample::Unknown => {}
    }

    // Nothing at or before the start, so the first observation (if any) is
    // the earliest one after it. Duplicates at that instant resolve to the
    // last record.
    let earliest = match observations.first() {
        Some(first) => first.timestamp_utc,
        None => return (Status::Inactive, Fill::Inactive),
    };
    let inside = earliest < span.end || (earliest == span.end && span.end == now);
    match status_at(observations, earliest) {
        Sample::Active if inside => (Status::Active, Fill::Backward),
        Sample::Inactive if inside => (Status::Inactive, Fill::Backward),
        _ => (Status::Inactive, Fill::Inactive),
    }
}
