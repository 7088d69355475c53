//! Error types for report computation

use thiserror::Error;

use crate::model::StoreId;

/// Failure confined to a single store's computation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An explicit timezone entry that is not a known IANA zone.
    /// Missing entries fall back to the default zone and never raise this.
    #[error("store {store_id}: unknown timezone '{zone}'")]
    UnknownTimezone { store_id: StoreId, zone: String },

    #[error("store {store_id}: worker failed: {reason}")]
    WorkerFailed { store_id: StoreId, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("dataset has no observations, cannot derive a reference instant")]
    EmptyDataset,
}
