use thiserror::Error;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A uniqueness rule of the catalog would be broken.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row could not be written or read back as a valid record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
