use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::{
    Cents, DebtDraft, DebtEntry, Direction, NewDebtEntry, display_person, normalize_person,
};
use crate::storage::DebtStore;

use super::{AppError, AppResult, BalanceCache, today};

/// The only path by which entries enter the ledger.
pub struct DebtRecorder {
    store: Arc<dyn DebtStore>,
    cache: Arc<BalanceCache>,
}

impl DebtRecorder {
    pub fn new(store: Arc<dyn DebtStore>, cache: Arc<BalanceCache>) -> Self {
        Self { store, cache }
    }

    /// Validate and record a new Active entry. `date` defaults to today.
    pub async fn record_debt(
        &self,
        person: &str,
        amount: Cents,
        description: &str,
        direction: Direction,
        date: Option<NaiveDate>,
    ) -> AppResult<DebtEntry> {
        self.record_draft(DebtDraft {
            person: person.to_string(),
            amount,
            description: description.to_string(),
            direction,
            date,
        })
        .await
    }

    /// Record a draft produced by a field-extraction collaborator.
    pub async fn record_draft(&self, draft: DebtDraft) -> AppResult<DebtEntry> {
        let new_entry = validate_draft(&draft, today())?;
        let entry = self.store.append(new_entry).await?;
        self.cache.invalidate(&entry.person);

        tracing::info!(
            entry_id = entry.id,
            person = %entry.person,
            amount = entry.amount,
            direction = %entry.direction,
            "Recorded debt"
        );
        Ok(entry)
    }
}

/// Turn a draft into a storable entry, or explain why it is rejected.
pub fn validate_draft(draft: &DebtDraft, default_date: NaiveDate) -> AppResult<NewDebtEntry> {
    if draft.amount <= 0 {
        return Err(AppError::validation(format!(
            "amount must be positive, got {}",
            draft.amount
        )));
    }

    let person = normalize_person(&draft.person);
    if person.is_empty() {
        return Err(AppError::validation("person must not be empty"));
    }

    Ok(NewDebtEntry {
        created_date: draft.date.unwrap_or(default_date),
        person,
        display_name: display_person(&draft.person),
        description: draft.description.trim().to_string(),
        amount: draft.amount,
        direction: draft.direction,
        split_from: None,
    })
}
