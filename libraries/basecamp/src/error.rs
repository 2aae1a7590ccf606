use thiserror::Error;

/// Failure of a single round-trip against the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The row does not exist, or the caller is not allowed to see it. The
    /// store reports both the same way, so callers must treat them the same.
    #[error("row not found")]
    NotFound,

    /// The store rejected a write (network failure, constraint violation,
    /// permission denial discovered server-side).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// A uniqueness constraint stopped an insert.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A multi-row batch landed partially: `failed` holds the row ids whose
    /// writes did not go through. Only non-transactional backends produce
    /// this.
    #[error("batch write partially applied ({} rows failed)", failed.len())]
    PartialWrite { failed: Vec<i64> },
}
