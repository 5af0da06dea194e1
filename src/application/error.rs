use thiserror::Error;

use crate::domain::{ParseCentsError, format_cents};
use crate::storage::StoreError;

use super::SettlementResult;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No outstanding debts with {0}")]
    NoActiveDebt(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The ledger changed under a settlement. Retry the whole settlement.
    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    /// Transient store failure that outlasted the retry budget.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A settlement stopped after some of its writes were committed.
    /// `applied` is what now stands in the ledger; settle only the rest again.
    #[error(
        "Settlement with {} stopped after applying {}: {cause}",
        .applied.person,
        format_cents(.applied.amount_applied)
    )]
    SettlementInterrupted {
        applied: Box<SettlementResult>,
        #[source]
        cause: Box<AppError>,
    },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the caller may retry the whole operation.
    /// An interrupted settlement is not: part of it already stands.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_) | Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(format!("debt entry {}", id)),
            StoreError::Conflict { .. } => Self::ConcurrencyConflict(err.to_string()),
            StoreError::InvalidUpdate { .. } => Self::Validation(err.to_string()),
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            StoreError::Database(_) | StoreError::Corrupt(_) => Self::Storage(err.to_string()),
        }
    }
}

impl From<ParseCentsError> for AppError {
    fn from(err: ParseCentsError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
