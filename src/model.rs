//! Store monitoring data model
//!
//! Status observations, weekly business-hour rules, timezone entries, and
//! the read-only [`Dataset`] snapshot a report run works from.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::schedule::parse_local_time;
use crate::timezone::DEFAULT_TIMEZONE;

pub type StoreId = String;

/// Polled store status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

/// A single status poll for one store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub timestamp_utc: DateTime<Utc>,
    pub status: Status,
}

impl Observation {
    pub fn new(timestamp_utc: DateTime<Utc>, status: Status) -> Self {
        Self {
            timestamp_utc,
            status,
        }
    }
}

/// Local opening hours for one weekday (0 = Monday .. 6 = Sunday)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHourRule {
    pub day_of_week: u8,
    pub start_time_local: NaiveTime,
    pub end_time_local: NaiveTime,
}

impl BusinessHourRule {
    pub fn new(day_of_week: u8, start_time_local: NaiveTime, end_time_local: NaiveTime) -> Self {
        Self {
            day_of_week,
            start_time_local,
            end_time_local,
        }
    }

    /// Rules ending at or before their start are not read as overnight spans;
    /// they contribute no business time.
    pub fn is_malformed(&self) -> bool {
        self.end_time_local <= self.start_time_local
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<Status, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn deserialize_local_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_local_time(&raw).map_err(serde::de::Error::custom)
}

/// Flat observation row as exported by the storage layer
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationRecord {
    pub store_id: StoreId,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_status")]
    pub status: Status,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessHourRecord {
    pub store_id: StoreId,
    #[serde(alias = "dayOfWeek")]
    pub day_of_week: u8,
    #[serde(deserialize_with = "deserialize_local_time")]
    pub start_time_local: NaiveTime,
    #[serde(deserialize_with = "deserialize_local_time")]
    pub end_time_local: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimezoneRecord {
    pub store_id: StoreId,
    #[serde(alias = "timezone_str")]
    pub timezone: String,
}

/// Serialized form of a full dataset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub observations: Vec<ObservationRecord>,
    #[serde(default)]
    pub business_hours: Vec<BusinessHourRecord>,
    #[serde(default)]
    pub timezones: Vec<TimezoneRecord>,
}

/// In-memory input for one report run.
///
/// Each store's observations are kept sorted by timestamp. Records sharing a
/// timestamp keep their insertion order, so the later one is what a step
/// lookup sees.
#[derive(Debug, Clone)]
pub struct Dataset {
    observations: HashMap<StoreId, Vec<Observation>>,
    schedules: HashMap<StoreId, Vec<BusinessHourRule>>,
    timezones: HashMap<StoreId, String>,
    default_timezone: String,
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            observations: HashMap::new(),
            schedules: HashMap::new(),
            timezones: HashMap::new(),
            default_timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zone used for stores without a timezone entry
    pub fn with_default_timezone(mut self, zone: impl Into<String>) -> Self {
        self.default_timezone = zone.into();
        self
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut dataset = Self::new();

        for record in snapshot.observations {
            dataset
                .observations
                .entry(record.store_id)
                .or_default()
                .push(Observation::new(record.timestamp_utc, record.status));
        }
        // Stable sort keeps insertion order for equal timestamps
        for observations in dataset.observations.values_mut() {
            observations.sort_by_key(|o| o.timestamp_utc);
        }

        for record in snapshot.business_hours {
            dataset.add_rule(
                record.store_id,
                BusinessHourRule::new(
                    record.day_of_week,
                    record.start_time_local,
                    record.end_time_local,
                ),
            );
        }

        for record in snapshot.timezones {
            dataset.set_timezone(record.store_id, record.timezone);
        }

        debug!(
            "Loaded dataset: {} stores, {} observations",
            dataset.store_ids().len(),
            dataset.observation_count()
        );
        dataset
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Insert an observation, keeping the store's sequence sorted
    pub fn add_observation(
        &mut self,
        store_id: impl Into<StoreId>,
        timestamp_utc: DateTime<Utc>,
        status: Status,
    ) {
        let observations = self.observations.entry(store_id.into()).or_default();
        let idx = observations.partition_point(|o| o.timestamp_utc <= timestamp_utc);
        observations.insert(idx, Observation::new(timestamp_utc, status));
    }

    pub fn add_rule(&mut self, store_id: impl Into<StoreId>, rule: BusinessHourRule) {
        let store_id = store_id.into();
        if rule.day_of_week > 6 {
            warn!(
                "Ignoring business hours for store {} with day_of_week {}",
                store_id, rule.day_of_week
            );
            return;
        }
        self.schedules.entry(store_id).or_default().push(rule);
    }

    pub fn set_timezone(&mut self, store_id: impl Into<StoreId>, zone: impl Into<String>) {
        self.timezones.insert(store_id.into(), zone.into());
    }

    pub fn observations(&self, store_id: &str) -> &[Observation] {
        self.observations
            .get(store_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn rules(&self, store_id: &str) -> &[BusinessHourRule] {
        self.schedules
            .get(store_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn timezones(&self) -> &HashMap<StoreId, String> {
        &self.timezones
    }

    pub fn default_timezone(&self) -> &str {
        &self.default_timezone
    }

    /// Every store mentioned by any of the three inputs, sorted
    pub fn store_ids(&self) -> BTreeSet<StoreId> {
        self.observations
            .keys()
            .chain(self.schedules.keys())
            .chain(self.timezones.keys())
            .cloned()
            .collect()
    }

    pub fn observation_count(&self) -> usize {
        self.observations.values().map(Vec::len).sum()
    }

    /// Latest observation timestamp across all stores; `None` when empty
    pub fn reference_instant(&self) -> Option<DateTime<Utc>> {
        self.observations
            .values()
            .filter_map(|obs| obs.last())
            .map(|o| o.timestamp_utc)
            .max()
    }
}
