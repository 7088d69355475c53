/// Trailing report windows
/// Hour, day and week windows ending at the reference instant, converted to
/// minutes or hours and rounded to two decimals (half up on whole milliseconds)

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::trace;

use crate::integrate::{integrate, Totals};
use crate::model::Observation;
use crate::schedule::{total_duration, BusinessInterval, BusinessScheduleExpander};

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Hour,
    Day,
    Week,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Hour, Window::Day, Window::Week];

    pub fn length(self) -> Duration {
        match self {
            Window::Hour => Duration::hours(1),
            Window::Day => Duration::days(1),
            Window::Week => Duration::days(7),
        }
    }

    /// Output unit in milliseconds: minutes for the hour window, hours otherwise
    pub fn unit_ms(self) -> i64 {
        match self {
            Window::Hour => MINUTE_MS,
            Window::Day | Window::Week => HOUR_MS,
        }
    }

    /// `[now - length, now]`. The right edge adds no duration; an observation
    /// exactly at `now` only matters for back-filling the span that ends there.
    pub fn span(self, now: DateTime<Utc>) -> BusinessInterval {
        BusinessInterval::new(now - self.length(), now)
    }

    pub fn label(self) -> &'static str {
        match self {
            Window::Hour => "last_hour",
            Window::Day => "last_day",
            Window::Week => "last_week",
        }
    }
}

/// Hundredths of `unit_ms` in `ms`, rounding half up
pub fn round_half_up_hundredths(ms: i64, unit_ms: i64) -> i64 {
    (ms.max(0) * 100 + unit_ms / 2) / unit_ms
}

/// Express `duration` in units of `unit_ms`, rounded to 2 decimal places
pub fn round_to_unit(duration: Duration, unit_ms: i64) -> f64 {
    round_half_up_hundredths(duration.num_milliseconds(), unit_ms) as f64 / 100.0
}

/// Uptime and downtime for all three windows of one store
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowResult {
    pub uptime_last_hour_minutes: f64,
    pub uptime_last_day_hours: f64,
    pub uptime_last_week_hours: f64,
    pub downtime_last_hour_minutes: f64,
    pub downtime_last_day_hours: f64,
    pub downtime_last_week_hours: f64,
}

impl WindowResult {
    /// Rounded (uptime, downtime) for one window
    pub fn get(&self, window: Window) -> (f64, f64) {
        match window {
            Window::Hour => (self.uptime_last_hour_minutes, self.downtime_last_hour_minutes),
            Window::Day => (self.uptime_last_day_hours, self.downtime_last_day_hours),
            Window::Week => (self.uptime_last_week_hours, self.downtime_last_week_hours),
        }
    }
}

/// Per-store window computation over a fixed observation slice and schedule
pub struct WindowAggregator<'a> {
    observations: &'a [Observation],
    expander: BusinessScheduleExpander<'a>,
}

impl<'a> WindowAggregator<'a> {
    pub fn new(observations: &'a [Observation], expander: BusinessScheduleExpander<'a>) -> Self {
        Self {
            observations,
            expander,
        }
    }

    pub fn business_intervals(&self, window: Window, now: DateTime<Utc>) -> Vec<BusinessInterval> {
        self.expander.expand(window.span(now))
    }

    /// Total business time in the window
    pub fn business_duration(&self, window: Window, now: DateTime<Utc>) -> Duration {
        total_duration(&self.business_intervals(window, now))
    }

    /// Unrounded up/down time for one window
    pub fn totals(&self, window: Window, now: DateTime<Utc>) -> Totals {
        let totals = integrate(self.observations, &self.business_intervals(window, now), now);
        trace!(
            "{} window: up {}ms, down {}ms",
            window.label(),
            totals.uptime.num_milliseconds(),
            totals.downtime.num_milliseconds()
        );
        totals
    }

    pub fn compute(&self, now: DateTime<Utc>) -> WindowResult {
        let hour = self.totals(Window::Hour, now);
        let day = self.totals(Window::Day, now);
        let week = self.totals(Window::Week, now);

        WindowResult {
            uptime_last_hour_minutes: round_to_unit(hour.uptime, Window::Hour.unit_ms()),
            uptime_last_day_hours: round_to_unit(day.uptime, Window::Day.unit_ms()),
            uptime_last_week_hours: round_to_unit(week.uptime, Window::Week.unit_ms()),
            downtime_last_hour_minutes: round_to_unit(hour.downtime, Window::Hour.unit_ms()),
            downtime_last_day_hours: round_to_unit(day.downtime, Window::Day.unit_ms()),
            downtime_last_week_hours: round_to_unit(week.downtime, Window::Week.unit_ms()),
        }
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn hundredths_within_half_step() {
        let ms: i64 = kani::any();
        kani::assume(ms >= 0 && ms <= 7 * 24 * HOUR_MS);

        let h = round_half_up_hundredths(ms, HOUR_MS);
        kani::assert(h * HOUR_MS <= ms * 100 + HOUR_MS / 2, "rounds at most half up");
        kani::assert(ms * 100 < h * HOUR_MS + HOUR_MS / 2, "rounds less than half down");
    }
}
