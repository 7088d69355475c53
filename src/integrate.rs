//! Up/down time accumulation over business intervals

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

use crate::model::{Observation, Status};
use crate::sampler::initial_status;
use crate::schedule::BusinessInterval;

/// Accumulated business time by status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub uptime: Duration,
    pub downtime: Duration,
}

impl Default for Totals {
    fn default() -> Self {
        Self {
            uptime: Duration::zero(),
            downtime: Duration::zero(),
        }
    }
}

impl Totals {
    fn add(&mut self, status: Status, duration: Duration) {
        match status {
            Status::Active => self.uptime = self.uptime + duration,
            Status::Inactive => self.downtime = self.downtime + duration,
        }
    }

    pub fn total(&self) -> Duration {
        self.uptime + self.downtime
    }
}

/// Classify every instant of `intervals` as up or down.
///
/// `intervals` must be disjoint. The fill policy is applied separately at the
/// start of each interval. `now` is the window's inclusive right edge: an
/// observation there can back-fill the interval ending at it but adds no
/// duration of its own.
pub fn integrate(
    observations: &[Observation],
    intervals: &[BusinessInterval],
    now: DateTime<Utc>,
) -> Totals {
    let mut totals = Totals::default();
    for interval in intervals {
        integrate_interval(observations, interval, now, &mut totals);
    }
    totals
}

fn integrate_interval(
    observations: &[Observation],
    interval: &BusinessInterval,
    now: DateTime<Utc>,
    totals: &mut Totals,
) {
    if interval.is_empty() {
        return;
    }

    let (mut status, fill) = initial_status(observations, interval, now);
    trace!(
        "Interval {}..{} starts {:?} ({:?} fill)",
        interval.start.to_rfc3339(),
        interval.end.to_rfc3339(),
        status,
        fill
    );
    let mut cursor = interval.start;

    // Observations strictly inside (start, end) split the interval
    let first_inside = observations.partition_point(|o| o.timestamp_utc <= interval.start);
    for obs in observations[first_inside..]
        .iter()
        .take_while(|o| o.timestamp_utc < interval.end)
    {
        totals.add(status, obs.timestamp_utc - cursor);
        cursor = obs.timestamp_utc;
        status = obs.status;
    }
    totals.add(status, interval.end - cursor);
}
