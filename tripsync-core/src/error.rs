use basecamp::StoreError;
use thiserror::Error;

use crate::records::ActivityId;

/// Everything a planning operation can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// The trip (or row) does not resolve, or the caller may not see it.
    /// The store reports both identically, so callers treat them the same.
    #[error("not found")]
    NotFound,

    /// A required field is missing or malformed. Caught before any network
    /// call; nothing local or remote is mutated.
    #[error("{0}")]
    Validation(String),

    /// The store rejected a mutation after the optimistic local change was
    /// applied. The change has been rolled back by the time this surfaces.
    #[error("write failed: {0}")]
    RemoteWrite(String),

    /// A reorder batch landed partially on a non-transactional backend.
    /// The local list has been restored and reloaded.
    #[error("order partially saved ({} rows failed)", failed.len())]
    PartialReorder { failed: Vec<ActivityId> },

    /// The session is not allowed to change this trip.
    #[error("this session cannot edit the trip")]
    ReadOnly,
}

impl From<StoreError> for PlanError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => PlanError::NotFound,
            StoreError::Rejected(msg) => PlanError::RemoteWrite(msg),
            StoreError::Conflict(msg) => PlanError::RemoteWrite(msg),
            StoreError::PartialWrite { failed } => PlanError::PartialReorder {
                failed: failed.into_iter().map(ActivityId).collect(),
            },
        }
    }
}
