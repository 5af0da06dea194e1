//! Applies payments to a person's outstanding entries.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AllocationStep, Cents, DebtEntry, DebtId, Direction, Expense, NewExpense, PersonBalance,
    SettlementDraft, plan_settlement,
};
use crate::storage::{DebtStore, EntryUpdate, ExpenseLedger, SplitIntent};

use super::ledger::person_key;
use super::{
    AppError, AppResult, LedgerService, PersonLocks, ReconcileReport, Reconciler, today,
};

/// A partially paid entry: the original, reduced and settled, plus its Active successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub settled: DebtEntry,
    pub remainder: DebtEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    /// Normalized person key
    pub person: String,
    /// Most recent spelling of the counterparty's name
    pub display_name: String,
    pub amount_applied: Cents,
    pub overpaid: Cents,
    pub entries_settled: Vec<DebtEntry>,
    pub entries_split: Vec<SplitOutcome>,
    /// Expenses written for the portions the user owed
    pub expenses: Vec<Expense>,
    /// Expense writes that failed; the ledger side of the settlement still stands
    pub expense_errors: Vec<String>,
    pub new_balance: PersonBalance,
}

pub struct SettlementEngine {
    store: Arc<dyn DebtStore>,
    expenses: Arc<dyn ExpenseLedger>,
    ledger: Arc<LedgerService>,
    reconciler: Arc<Reconciler>,
    locks: Arc<PersonLocks>,
}

impl SettlementEngine {
    pub fn new(
        store: Arc<dyn DebtStore>,
        expenses: Arc<dyn ExpenseLedger>,
        ledger: Arc<LedgerService>,
        reconciler: Arc<Reconciler>,
        locks: Arc<PersonLocks>,
    ) -> Self {
        Self {
            store,
            expenses,
            ledger,
            reconciler,
            locks,
        }
    }

    /// Settle `amount` with `person` as of `date`.
    ///
    /// Active entries of both directions are paid off together, oldest first.
    /// The last entry touched may be split. Any excess is reported as `overpaid`.
    pub async fn settle(
        &self,
        person: &str,
        amount: Cents,
        date: NaiveDate,
    ) -> AppResult<SettlementResult> {
        if amount <= 0 {
            return Err(AppError::validation(format!(
                "settlement amount must be positive, got {}",
                amount
            )));
        }
        let key = person_key(person)?;

        let _guard = self.locks.lock(&key).await;

        let mut healed = ReconcileReport::default();
        self.reconciler.reconcile_locked(&key, &mut healed).await?;
        if let Some(conflict) = healed.conflicts.first() {
            return Err(AppError::ConcurrencyConflict(format!(
                "unfinished split of entry {} for {}: {}",
                conflict.intent.entry_id, key, conflict.reason
            )));
        }

        let entries = self.ledger.get_active_entries(&key).await?;
        if entries.is_empty() {
            return Err(AppError::NoActiveDebt(person.trim().to_string()));
        }
        let display_name = entries
            .iter()
            .max_by_key(|e| e.id)
            .map(|e| e.display_name.clone())
            .unwrap_or_else(|| key.clone());

        let plan = plan_settlement(&entries, amount);
        tracing::debug!(
            person = %key,
            amount,
            steps = plan.steps.len(),
            overpaid = plan.overpaid,
            "Planned settlement"
        );

        let mut result = SettlementResult {
            person: key.clone(),
            display_name: display_name.clone(),
            amount_applied: 0,
            overpaid: 0,
            entries_settled: Vec::new(),
            entries_split: Vec::new(),
            expenses: Vec::new(),
            expense_errors: Vec::new(),
            new_balance: PersonBalance::zero(key.clone()),
        };

        for step in &plan.steps {
            let entry = entries
                .iter()
                .find(|e| e.id == step.entry_id())
                .ok_or_else(|| AppError::NotFound(format!("debt entry {}", step.entry_id())))?;

            let applied_before = result.amount_applied;
            let outcome = self.apply_step(entry, step, date, &mut result).await;

            // A committed settle write is money paid, even when a later write of the step failed.
            if result.amount_applied > applied_before && step.direction() == Direction::OwedByUser {
                self.record_payment(&display_name, step.settled_amount(), date, &mut result)
                    .await;
            }

            if let Err(err) = outcome {
                return Err(self.abort(&key, entry.id, result, err).await);
            }
        }
        result.overpaid = plan.overpaid;

        self.ledger.invalidate(&key);
        result.new_balance = self.ledger.get_balance(&key).await?;

        tracing::info!(
            person = %key,
            applied = result.amount_applied,
            overpaid = result.overpaid,
            settled = result.entries_settled.len(),
            split = result.entries_split.len(),
            net = result.new_balance.net_amount,
            "Settled debts"
        );
        Ok(result)
    }

    /// Settle a request produced by a field-extraction collaborator. `date` defaults to today.
    pub async fn settle_draft(&self, draft: SettlementDraft) -> AppResult<SettlementResult> {
        let date = draft.date.unwrap_or_else(today);
        self.settle(&draft.person, draft.amount, date).await
    }

    async fn apply_step(
        &self,
        entry: &DebtEntry,
        step: &AllocationStep,
        date: NaiveDate,
        result: &mut SettlementResult,
    ) -> AppResult<()> {
        match *step {
            AllocationStep::Full { .. } => {
                let settled = self.store.update(entry.id, &EntryUpdate::settle(date)).await?;
                tracing::debug!(entry_id = entry.id, amount = entry.amount, "Settled entry");
                result.amount_applied += settled.amount;
                result.entries_settled.push(settled);
            }
            AllocationStep::Split {
                paid, remainder, ..
            } => {
                let intent = SplitIntent::new(entry, paid, date);
                self.store.record_split_intent(&intent).await?;

                let settled = self
                    .store
                    .update(entry.id, &EntryUpdate::settle_portion(paid, date))
                    .await?;
                // From here the portion is paid; a missing remainder is restored by reconciliation.
                result.amount_applied += paid;
                let successor = self.store.append(entry.remainder(remainder)).await?;
                self.store.clear_split_intent(intent.id).await?;

                tracing::debug!(
                    entry_id = entry.id,
                    paid,
                    remainder_id = successor.id,
                    remainder,
                    "Split entry"
                );
                result.entries_split.push(SplitOutcome {
                    settled,
                    remainder: successor,
                });
            }
        }
        Ok(())
    }

    /// Turn a failed step into the error returned to the caller.
    ///
    /// Nothing committed yet: the step's error as is, and the whole settlement can be retried.
    /// Otherwise the error carries what was applied, so only the rest is paid again.
    async fn abort(
        &self,
        key: &str,
        entry_id: DebtId,
        mut partial: SettlementResult,
        err: AppError,
    ) -> AppError {
        self.ledger.invalidate(key);
        tracing::warn!(
            person = %key,
            entry_id,
            applied = partial.amount_applied,
            error = %err,
            "Settlement aborted"
        );
        if partial.amount_applied == 0 {
            return err;
        }

        match self.ledger.get_balance(key).await {
            Ok(balance) => partial.new_balance = balance,
            Err(reload) => tracing::warn!(
                person = %key,
                error = %reload,
                "Failed to reload balance after aborted settlement"
            ),
        }
        AppError::SettlementInterrupted {
            applied: Box::new(partial),
            cause: Box::new(err),
        }
    }

    /// Write the expense for a settled portion the user owed.
    /// Failures end up in `expense_errors`; the ledger writes stay.
    async fn record_payment(
        &self,
        person: &str,
        amount: Cents,
        date: NaiveDate,
        result: &mut SettlementResult,
    ) {
        match self
            .expenses
            .record_expense(NewExpense::debt_payment(date, person, amount))
            .await
        {
            Ok(expense) => result.expenses.push(expense),
            Err(err) => {
                tracing::warn!(
                    person,
                    amount,
                    error = %err,
                    "Failed to record debt payment expense"
                );
                result.expense_errors.push(err.to_string());
            }
        }
    }
}
