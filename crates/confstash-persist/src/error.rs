//! Error types for the confstash-persist crate.
//!
//! All persistence operations return [`PersistError`] via
//! [`PersistResult`].

use thiserror::Error;

/// Alias for `Result<T, PersistError>`.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors raised by memoized work, stashes and the task queue.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing or deserializing a stored value failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The shelve database failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The requested entry does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Work had to be computed but no worker is attached.
    #[error("no worker attached to persisted work `{key}`")]
    MissingWorker { key: String },

    /// An invalid argument was provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A queued task failed or its worker thread panicked.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// A shared stash's lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Poisoned(String),
}
