/// Business hours expansion
/// Projects a store's weekly local opening hours onto concrete UTC intervals

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use tracing::warn;

use crate::model::BusinessHourRule;

/// Half-open `[start, end)` UTC interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusinessInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration(&self) -> Duration {
        if self.is_empty() {
            Duration::zero()
        } else {
            self.end - self.start
        }
    }

    /// Intersection with `span`, or `None` if nothing is left
    pub fn clip(&self, span: &BusinessInterval) -> Option<BusinessInterval> {
        let clipped = BusinessInterval::new(self.start.max(span.start), self.end.min(span.end));
        if clipped.is_empty() {
            None
        } else {
            Some(clipped)
        }
    }
}

/// Total length of a set of intervals
pub fn total_duration(intervals: &[BusinessInterval]) -> Duration {
    intervals
        .iter()
        .fold(Duration::zero(), |acc, iv| acc + iv.duration())
}

/// Parse a local wall-clock time as `HH:MM:SS` or `HH:MM`
pub fn parse_local_time(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S").or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
}

/// Convert a local wall-clock time in `tz` to UTC.
///
/// Ambiguous times (clocks falling back) take the earlier instant. Times
/// inside a spring-forward gap are read with the offset in force before the
/// gap, which lands them the same distance past the transition.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let before = tz.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
            (local - Duration::seconds(i64::from(before.local_minus_utc()))).and_utc()
        }
    }
}

/// Sort and merge overlapping or touching intervals, dropping empty ones
pub fn merge_intervals(mut intervals: Vec<BusinessInterval>) -> Vec<BusinessInterval> {
    intervals.retain(|iv| !iv.is_empty());
    intervals.sort_by_key(|iv| iv.start);

    let mut merged: Vec<BusinessInterval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => last.end = last.end.max(iv.end),
            _ => merged.push(iv),
        }
    }
    merged
}

/// Expands one store's weekly rules in its timezone
#[derive(Debug, Clone)]
pub struct BusinessScheduleExpander<'a> {
    rules: &'a [BusinessHourRule],
    tz: Tz,
    malformed: usize,
}

impl<'a> BusinessScheduleExpander<'a> {
    pub fn new(store_id: &str, rules: &'a [BusinessHourRule], tz: Tz) -> Self {
        let mut malformed = 0;
        for rule in rules.iter().filter(|r| r.is_malformed()) {
            malformed += 1;
            warn!(
                "Store {}: business hours {}-{} on day {} end before they start, treating as closed",
                store_id, rule.start_time_local, rule.end_time_local, rule.day_of_week
            );
        }
        Self {
            rules,
            tz,
            malformed,
        }
    }

    /// No rules at all means open around the clock
    pub fn is_always_open(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn malformed_rules(&self) -> usize {
        self.malformed
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Business intervals inside `span`, sorted and non-overlapping
    pub fn expand(&self, span: BusinessInterval) -> Vec<BusinessInterval> {
        if span.is_empty() {
            return Vec::new();
        }
        if self.is_always_open() {
            return vec![span];
        }

        let first_day = span.start.with_timezone(&self.tz).date_naive();
        let last_day = span.end.with_timezone(&self.tz).date_naive();

        let mut out = Vec::new();
        for day in first_day.iter_days().take_while(|d| *d <= last_day) {
            let weekday = day.weekday().num_days_from_monday() as u8;
            for rule in self
                .rules
                .iter()
                .filter(|r| r.day_of_week == weekday && !r.is_malformed())
            {
                let start = local_to_utc(self.tz, day.and_time(rule.start_time_local));
                let end = local_to_utc(self.tz, day.and_time(rule.end_time_local));
                if let Some(iv) = BusinessInterval::new(start, end).clip(&span) {
                    out.push(iv);
                }
            }
        }

        merge_intervals(out)
    }
}
