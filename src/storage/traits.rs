//! Store trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Cents, DebtEntry, DebtId, DebtStatus, Expense, NewDebtEntry, NewExpense,
};

use super::{StoreError, StoreResult};

/// Filter options for querying ledger entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebtFilter {
    /// Normalized person key.
    pub person: Option<String>,
    /// Filter by status.
    pub status: Option<DebtStatus>,
}

impl DebtFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn person(person: impl Into<String>) -> Self {
        Self {
            person: Some(person.into()),
            status: None,
        }
    }

    pub fn active_for(person: impl Into<String>) -> Self {
        Self {
            person: Some(person.into()),
            status: Some(DebtStatus::Active),
        }
    }

    pub fn matches(&self, entry: &DebtEntry) -> bool {
        self.person.as_ref().is_none_or(|p| &entry.person == p)
            && self.status.is_none_or(|s| entry.status == s)
    }
}

/// Field-level update. Only these three fields of an entry ever change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub status: Option<DebtStatus>,
    pub amount: Option<Cents>,
    pub settled_date: Option<NaiveDate>,
}

impl EntryUpdate {
    /// Settle the whole entry.
    pub fn settle(date: NaiveDate) -> Self {
        Self {
            status: Some(DebtStatus::Settled),
            amount: None,
            settled_date: Some(date),
        }
    }

    /// Reduce the entry to the paid portion and settle it.
    pub fn settle_portion(paid: Cents, date: NaiveDate) -> Self {
        Self {
            status: Some(DebtStatus::Settled),
            amount: Some(paid),
            settled_date: Some(date),
        }
    }

    /// Compute the row that results from applying this update to `current`.
    ///
    /// Every store goes through here, so the rules are the same everywhere:
    /// settled rows are frozen, the amount may only shrink and only together
    /// with the transition to Settled, and the result must satisfy the row
    /// invariants.
    pub fn apply(&self, current: &DebtEntry) -> StoreResult<DebtEntry> {
        if current.is_settled() {
            return Err(StoreError::conflict(current.id, "entry is already settled"));
        }

        let status = self.status.unwrap_or(current.status);
        let mut next = current.clone();
        next.status = status;

        if let Some(amount) = self.amount {
            if status != DebtStatus::Settled {
                return Err(StoreError::invalid_update(
                    current.id,
                    "amount may only change when the entry is settled",
                ));
            }
            if amount <= 0 || amount > current.amount {
                return Err(StoreError::invalid_update(
                    current.id,
                    format!(
                        "settled portion {} must be within 1..={}",
                        amount, current.amount
                    ),
                ));
            }
            next.amount = amount;
        }

        next.settled_date = match (status, self.settled_date) {
            (DebtStatus::Settled, Some(date)) => Some(date),
            (DebtStatus::Settled, None) => {
                return Err(StoreError::invalid_update(
                    current.id,
                    "a settled entry needs a settled date",
                ));
            }
            (DebtStatus::Active, Some(_)) => {
                return Err(StoreError::invalid_update(
                    current.id,
                    "an active entry cannot carry a settled date",
                ));
            }
            (DebtStatus::Active, None) => None,
        };

        next.check_invariants()
            .map_err(|reason| StoreError::invalid_update(current.id, reason))?;
        Ok(next)
    }
}

/// Journal row written before a split so an interrupted split can be finished later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitIntent {
    pub id: Uuid,
    pub entry_id: DebtId,
    pub person: String,
    /// Amount of the entry before the split
    pub original_amount: Cents,
    /// Portion the entry is reduced to
    pub paid_amount: Cents,
    pub settled_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl SplitIntent {
    pub fn new(entry: &DebtEntry, paid_amount: Cents, settled_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id: entry.id,
            person: entry.person.clone(),
            original_amount: entry.amount,
            paid_amount,
            settled_date,
            created_at: Utc::now(),
        }
    }

    pub fn remainder_amount(&self) -> Cents {
        self.original_amount - self.paid_amount
    }
}

/// Persistence for ledger entries.
#[async_trait]
pub trait DebtStore: Send + Sync {
    /// Appends a new Active entry, assigning the next id.
    async fn append(&self, entry: NewDebtEntry) -> StoreResult<DebtEntry>;

    /// Gets an entry by id.
    async fn get(&self, id: DebtId) -> StoreResult<Option<DebtEntry>>;

    /// Lists entries matching the filter, ordered by id.
    async fn query(&self, filter: &DebtFilter) -> StoreResult<Vec<DebtEntry>>;

    /// Applies a field-level update as one atomic row write.
    async fn update(&self, id: DebtId, update: &EntryUpdate) -> StoreResult<DebtEntry>;

    /// Distinct person keys across all entries, sorted.
    async fn persons(&self) -> StoreResult<Vec<String>>;

    /// Journals a split before it is applied.
    async fn record_split_intent(&self, intent: &SplitIntent) -> StoreResult<()>;

    /// Removes a journaled split once it is complete.
    async fn clear_split_intent(&self, id: Uuid) -> StoreResult<()>;

    /// Journaled splits that were never cleared, oldest first.
    async fn pending_split_intents(&self, person: Option<&str>)
        -> StoreResult<Vec<SplitIntent>>;
}

/// Expense history that settlements write into.
#[async_trait]
pub trait ExpenseLedger: Send + Sync {
    /// Records an expense.
    async fn record_expense(&self, expense: NewExpense) -> StoreResult<Expense>;

    /// Lists expenses, optionally within an inclusive date range, oldest first.
    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>>;
}
