//! Store error types.

use thiserror::Error;

use crate::domain::DebtId;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No entry with that id.
    #[error("Debt entry not found: {0}")]
    NotFound(DebtId),

    /// The row changed under us (settled by another writer, or its amount moved).
    #[error("Debt entry {id} changed concurrently: {reason}")]
    Conflict { id: DebtId, reason: String },

    /// The requested update would break a row invariant.
    #[error("Invalid update for debt entry {id}: {reason}")]
    InvalidUpdate { id: DebtId, reason: String },

    /// Transient failure. Safe to retry.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Non-transient backend failure.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A stored row could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn conflict(id: DebtId, reason: impl Into<String>) -> Self {
        Self::Conflict {
            id,
            reason: reason.into(),
        }
    }

    pub fn invalid_update(id: DebtId, reason: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            id,
            reason: reason.into(),
        }
    }

    /// Whether the operation may succeed if simply tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

// SQLITE_BUSY and SQLITE_LOCKED; extended codes keep the primary code in the low byte.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err.to_string()),
            sqlx::Error::Database(db_err) => {
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY) | Some(SQLITE_LOCKED) => Self::Unavailable(err.to_string()),
                    _ => Self::Database(err),
                }
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Corrupt(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
