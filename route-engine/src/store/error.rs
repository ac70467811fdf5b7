//! Store error types.

use std::path::PathBuf;

/// Errors from opening the store or committing a transaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The handle was closed; no further writes are accepted
    #[error("store is closed")]
    Closed,

    /// Reading or writing the snapshot file failed
    #[error("snapshot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file could not be (de)serialized
    #[error("snapshot JSON error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot parsed but breaks a data-model invariant
    #[error("snapshot at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// Why a transaction left the store unchanged.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError<E> {
    /// The body returned an error; nothing was applied.
    #[error("transaction aborted: {0}")]
    Aborted(E),

    /// The commit itself failed; nothing was applied.
    #[error(transparent)]
    Store(#[from] StoreError),
}
