//! Report generation
//!
//! Runs the window computation for every store in a dataset, either
//! sequentially or fanned out on the tokio runtime, and collects per-store
//! results alongside per-store failures.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ReportError, StoreError};
use crate::model::{Dataset, StoreId};
use crate::schedule::BusinessScheduleExpander;
use crate::timezone::TimezoneResolver;
use crate::window::{WindowAggregator, WindowResult};

/// A store that produced no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub store_id: StoreId,
    pub error: StoreError,
}

#[derive(Debug, Clone)]
pub struct Report {
    /// Reference instant all windows end at
    pub now: DateTime<Utc>,
    pub results: BTreeMap<StoreId, WindowResult>,
    pub failures: Vec<StoreFailure>,
    /// Set when the run was abandoned before every store finished
    pub cancelled: bool,
}

impl Report {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            results: BTreeMap::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    fn record(&mut self, store_id: StoreId, result: Result<WindowResult, StoreError>) {
        match result {
            Ok(windows) => {
                self.results.insert(store_id, windows);
            }
            Err(error) => {
                warn!("Skipping {}", error);
                self.failures.push(StoreFailure { store_id, error });
            }
        }
    }

    /// One row per store, sorted by store id. Failed stores get an error row
    /// with empty metrics.
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut rows: Vec<ReportRow> = self
            .results
            .iter()
            .map(|(store_id, windows)| ReportRow::ok(store_id, windows))
            .chain(self.failures.iter().map(ReportRow::failed))
            .collect();
        rows.sort_by(|a, b| a.store_id.cmp(&b.store_id));
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Ok,
    Error,
}

/// Output record in report column order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub store_id: StoreId,
    pub status: RowStatus,
    pub uptime_last_hour_minutes: Option<f64>,
    pub uptime_last_day_hours: Option<f64>,
    pub uptime_last_week_hours: Option<f64>,
    pub downtime_last_hour_minutes: Option<f64>,
    pub downtime_last_day_hours: Option<f64>,
    pub downtime_last_week_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportRow {
    fn ok(store_id: &str, w: &WindowResult) -> Self {
        Self {
            store_id: store_id.to_string(),
            status: RowStatus::Ok,
            uptime_last_hour_minutes: Some(w.uptime_last_hour_minutes),
            uptime_last_day_hours: Some(w.uptime_last_day_hours),
            uptime_last_week_hours: Some(w.uptime_last_week_hours),
            downtime_last_hour_minutes: Some(w.downtime_last_hour_minutes),
            downtime_last_day_hours: Some(w.downtime_last_day_hours),
            downtime_last_week_hours: Some(w.downtime_last_week_hours),
            error: None,
        }
    }

    fn failed(failure: &StoreFailure) -> Self {
        Self {
            store_id: failure.store_id.clone(),
            status: RowStatus::Error,
            uptime_last_hour_minutes: None,
            uptime_last_day_hours: None,
            uptime_last_week_hours: None,
            downtime_last_hour_minutes: None,
            downtime_last_day_hours: None,
            downtime_last_week_hours: None,
            error: Some(failure.error.to_string()),
        }
    }
}

/// Reference instant for a dataset: its latest observation
pub fn reference_instant(dataset: &Dataset) -> Result<DateTime<Utc>, ReportError> {
    dataset.reference_instant().ok_or(ReportError::EmptyDataset)
}

/// All three windows for one store
pub fn compute_store(
    dataset: &Dataset,
    store_id: &str,
    now: DateTime<Utc>,
) -> Result<WindowResult, StoreError> {
    let resolver = TimezoneResolver::new(dataset.timezones(), dataset.default_timezone());
    let tz = resolver.zone(store_id)?;
    let expander = BusinessScheduleExpander::new(store_id, dataset.rules(store_id), tz);
    let observations = dataset.observations(store_id);

    debug!(
        "Store {}: {} observations, {} rules, zone {}",
        store_id,
        observations.len(),
        dataset.rules(store_id).len(),
        expander.timezone().name()
    );

    Ok(WindowAggregator::new(observations, expander).compute(now))
}

/// Compute every store sequentially
pub fn compute_report(dataset: &Dataset, now: DateTime<Utc>) -> Report {
    let mut report = Report::new(now);
    for store_id in dataset.store_ids() {
        let result = compute_store(dataset, &store_id, now);
        report.record(store_id, result);
    }

    info!(
        "Report complete: {} stores, {} failed",
        report.results.len(),
        report.failures.len()
    );
    report
}

/// Compute every store concurrently with at most `workers` in flight.
///
/// Cancelling `cancel` stops collection and returns whatever finished; those
/// results are complete and valid on their own.
pub async fn run_report(
    dataset: Arc<Dataset>,
    now: DateTime<Utc>,
    workers: usize,
    cancel: CancellationToken,
) -> Report {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut pending: HashMap<Id, StoreId> = HashMap::new();

    for store_id in dataset.store_ids() {
        let dataset = Arc::clone(&dataset);
        let semaphore = Arc::clone(&semaphore);
        let key = store_id.clone();
        let handle = tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let id = store_id.clone();
            let joined =
                tokio::task::spawn_blocking(move || compute_store(&dataset, &id, now)).await;
            let result = joined.unwrap_or_else(|e| {
                Err(StoreError::WorkerFailed {
                    store_id: store_id.clone(),
                    reason: e.to_string(),
                })
            });
            (store_id, result)
        });
        pending.insert(handle.id(), key);
    }

    info!("Report started: {} stores, {} workers", tasks.len(), workers.max(1));

    let mut report = Report::new(now);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Report cancelled with {} stores pending", pending.len());
                tasks.abort_all();
                report.cancelled = true;
                break;
            }
            joined = tasks.join_next_with_id() => match joined {
                Some(Ok((id, (store_id, result)))) => {
                    pending.remove(&id);
                    report.record(store_id, result);
                }
                Some(Err(e)) => match lost_store(&mut pending, &e) {
                    Some((store_id, failure)) => report.record(store_id, Err(failure)),
                    None => error!("Report task failed: {}", e),
                },
                None => break,
            }
        }
    }

    info!(
        "Report finished: {} stores, {} failed{}",
        report.results.len(),
        report.failures.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    report
}

/// Store whose task died before reporting back, as a worker failure
fn lost_store(pending: &mut HashMap<Id, StoreId>, err: &JoinError) -> Option<(StoreId, StoreError)> {
    let store_id = pending.remove(&err.id())?;
    error!("Report task for store {} failed: {}", store_id, err);
    let failure = StoreError::WorkerFailed {
        store_id: store_id.clone(),
        reason: err.to_string(),
    };
    Some((store_id, failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BusinessHourRule, Status};
    use chrono::{NaiveTime, TimeZone};

    fn t(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, d, h, m, 0).unwrap()
    }

    fn sample_dataset() -> Dataset {
        let mut ds = Dataset::new();
        ds.add_observation("up", t(10, 0, 0), Status::Active);
        ds.add_observation("down", t(10, 0, 0), Status::Inactive);
        ds.add_observation("bad", t(10, 0, 0), Status::Active);
        ds.set_timezone("bad", "Mars/Olympus");
        ds.add_rule(
            "ruled",
            BusinessHourRule::new(
                1,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            ),
        );
        ds.set_timezone("ruled", "America/New_York");
        ds
    }

    #[test]
    fn test_reference_instant_empty_dataset() {
        assert_eq!(reference_instant(&Dataset::new()), Err(ReportError::EmptyDataset));
    }

    #[test]
    fn test_compute_report_isolates_failures() {
        let ds = sample_dataset();
        let now = t(10, 1, 0);
        let report = compute_report(&ds, now);

        assert_eq!(report.now, now);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].store_id, "bad");
        assert!(!report.cancelled);

        assert_eq!(report.results["up"].uptime_last_hour_minutes, 60.0);
        assert_eq!(report.results["down"].downtime_last_hour_minutes, 60.0);
    }

    #[test]
    fn test_store_without_observations_is_down() {
        let ds = sample_dataset();
        // Tuesday 2023-01-10 23:00 UTC; "ruled" opened 14:00-22:00 UTC
        let report = compute_report(&ds, t(10, 23, 0));
        let ruled = report.results["ruled"];
        assert_eq!(ruled.uptime_last_day_hours, 0.0);
        assert_eq!(ruled.downtime_last_day_hours, 8.0);
        assert_eq!(ruled.downtime_last_hour_minutes, 0.0);
    }

    #[test]
    fn test_rows_mark_failures() {
        let ds = sample_dataset();
        let report = compute_report(&ds, t(10, 1, 0));
        let rows = report.rows();

        let ids: Vec<_> = rows.iter().map(|r| r.store_id.as_str()).collect();
        assert_eq!(ids, vec!["bad", "down", "ruled", "up"]);

        let bad = &rows[0];
        assert_eq!(bad.status, RowStatus::Error);
        assert_eq!(bad.uptime_last_hour_minutes, None);
        assert!(bad.error.as_deref().unwrap_or_default().contains("Mars/Olympus"));

        let up = &rows[3];
        assert_eq!(up.status, RowStatus::Ok);
        assert_eq!(up.uptime_last_hour_minutes, Some(60.0));
        assert_eq!(up.error, None);
    }

    #[test]
    fn test_row_serialization() {
        let ds = sample_dataset();
        let report = compute_report(&ds, t(10, 1, 0));
        let rows = report.rows();

        let bad = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(bad["status"], "error");
        assert!(bad["uptime_last_hour_minutes"].is_null());

        let up = serde_json::to_value(&rows[3]).unwrap();
        assert_eq!(up["status"], "ok");
        assert_eq!(up["uptime_last_hour_minutes"], 60.0);
        assert!(up.get("error").is_none());
    }

    #[tokio::test]
    async fn test_run_report_matches_sequential() {
        let ds = sample_dataset();
        let now = t(10, 1, 0);
        let sequential = compute_report(&ds, now);
        let parallel = run_report(Arc::new(ds), now, 2, CancellationToken::new()).await;

        assert!(!parallel.cancelled);
        assert_eq!(parallel.results, sequential.results);
        assert_eq!(parallel.failures, sequential.failures);
    }

    #[tokio::test]
    async fn test_run_report_cancelled_before_start() {
        let ds = sample_dataset();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = run_report(Arc::new(ds), t(10, 1, 0), 1, cancel).await;
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_run_report_cancelled_midway_keeps_finished_stores() {
        let mut ds = Dataset::new();
        for store in 0..300 {
            let id = format!("s{:03}", store);
            for i in 0..50 {
                let status = if (i + store) % 3 == 0 { Status::Inactive } else { Status::Active };
                ds.add_observation(id.clone(), t(3, 0, 0) + chrono::Duration::minutes(197 * i), status);
            }
        }
        let ds = Arc::new(ds);
        let now = t(10, 0, 0);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let report = run_report(Arc::clone(&ds), now, 1, cancel).await;
        assert!(report.cancelled);
        assert!(report.results.len() + report.failures.len() < 300);
        for (store_id, result) in &report.results {
            assert_eq!(Ok(*result), compute_store(&ds, store_id, now));
        }
    }

    #[tokio::test]
    async fn test_lost_task_is_recorded_as_worker_failure() {
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut pending = HashMap::new();
        let handle = tasks.spawn(std::future::pending::<()>());
        pending.insert(handle.id(), "lost".to_string());
        handle.abort();

        let err = tasks.join_next().await.unwrap().unwrap_err();
        let (store_id, failure) = lost_store(&mut pending, &err).unwrap();
        assert_eq!(store_id, "lost");
        assert!(matches!(failure, StoreError::WorkerFailed { ref store_id, .. } if store_id == "lost"));
        assert!(pending.is_empty());

        let mut report = Report::new(t(10, 1, 0));
        report.record(store_id, Err(failure));
        let rows = report.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RowStatus::Error);

        // A task nobody is waiting on is not attributed to a store
        assert!(lost_store(&mut pending, &err).is_none());
    }

    #[tokio::test]
    async fn test_run_report_zero_workers_still_runs() {
        let ds = sample_dataset();
        let report = run_report(Arc::new(ds), t(10, 1, 0), 0, CancellationToken::new()).await;
        assert_eq!(report.results.len() + report.failures.len(), 4);
    }
}
