//! storemon library - business-hours uptime reporting
//!
//! Turns sparse per-store status polls, weekly local business hours, and
//! store timezones into uptime/downtime for the last hour, day, and week.

pub mod cli;
pub mod config;
pub mod error;
pub mod integrate;
pub mod model;
pub mod report;
pub mod sampler;
pub mod schedule;
pub mod timezone;
pub mod window;

pub use error::{ReportError, StoreError};
pub use model::{BusinessHourRule, Dataset, Observation, Status, StoreId};
pub use report::{compute_report, compute_store, run_report, Report, ReportRow};
pub use window::{Window, WindowResult};
