//! Finishes or rolls back splits that were interrupted between their two writes.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::DebtEntry;
use crate::storage::{DebtFilter, DebtStore, SplitIntent};

use super::{AppError, AppResult, BalanceCache, PersonLocks};

/// A journaled split whose ledger state matches none of the recoverable shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConflict {
    pub intent: SplitIntent,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Remainder entries written to finish an interrupted split
    pub completed: Vec<DebtEntry>,
    /// Intents whose split never started
    pub abandoned: Vec<SplitIntent>,
    /// Intents whose split had fully landed
    pub cleared: Vec<SplitIntent>,
    /// Intents left in place for inspection
    pub conflicts: Vec<ReconcileConflict>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
            && self.abandoned.is_empty()
            && self.cleared.is_empty()
            && self.conflicts.is_empty()
    }
}

pub struct Reconciler {
    store: Arc<dyn DebtStore>,
    cache: Arc<BalanceCache>,
    locks: Arc<PersonLocks>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DebtStore>, cache: Arc<BalanceCache>, locks: Arc<PersonLocks>) -> Self {
        Self {
            store,
            cache,
            locks,
        }
    }

    /// Resolve pending split intents, for one person or for everyone.
    /// Takes each affected person's lock while resolving their intents.
    pub async fn reconcile(&self, person: Option<&str>) -> AppResult<ReconcileReport> {
        let persons: BTreeSet<String> = self
            .store
            .pending_split_intents(person)
            .await?
            .into_iter()
            .map(|intent| intent.person)
            .collect();

        let mut report = ReconcileReport::default();
        for person in persons {
            let _guard = self.locks.lock(&person).await;
            self.reconcile_locked(&person, &mut report).await?;
        }
        Ok(report)
    }

    /// Same as [`Reconciler::reconcile`] for one person whose lock the caller already holds.
    pub(crate) async fn reconcile_locked(
        &self,
        person: &str,
        report: &mut ReconcileReport,
    ) -> AppResult<()> {
        for intent in self.store.pending_split_intents(Some(person)).await? {
            self.resolve(intent, report).await?;
        }
        Ok(())
    }

    /// Drop a journaled split without touching the ledger.
    pub async fn discard(&self, id: Uuid) -> AppResult<SplitIntent> {
        let intent = self
            .store
            .pending_split_intents(None)
            .await?
            .into_iter()
            .find(|intent| intent.id == id)
            .ok_or_else(|| AppError::NotFound(format!("split intent {}", id)))?;

        let _guard = self.locks.lock(&intent.person).await;
        self.store.clear_split_intent(id).await?;
        tracing::warn!(
            intent_id = %id,
            entry_id = intent.entry_id,
            person = %intent.person,
            "Discarded split intent"
        );
        Ok(intent)
    }

    async fn resolve(&self, intent: SplitIntent, report: &mut ReconcileReport) -> AppResult<()> {
        let Some(original) = self.store.get(intent.entry_id).await? else {
            return self.conflict(intent, "split entry no longer exists", report);
        };

        if original.is_active() && original.amount == intent.original_amount {
            self.store.clear_split_intent(intent.id).await?;
            tracing::info!(
                intent_id = %intent.id,
                entry_id = intent.entry_id,
                "Split never started, dropping intent"
            );
            report.abandoned.push(intent);
            return Ok(());
        }

        let first_write_landed = original.is_settled()
            && original.amount == intent.paid_amount
            && original.settled_date == Some(intent.settled_date);
        if !first_write_landed {
            let reason = format!(
                "entry is {} with amount {}, expected settled with {}",
                original.status, original.amount, intent.paid_amount
            );
            return self.conflict(intent, reason, report);
        }

        let successor = self
            .store
            .query(&DebtFilter::person(intent.person.clone()))
            .await?
            .into_iter()
            .find(|entry| entry.split_from == Some(original.id));

        match successor {
            Some(_) => {
                self.store.clear_split_intent(intent.id).await?;
                report.cleared.push(intent);
            }
            None => {
                let remainder = self
                    .store
                    .append(original.remainder(intent.remainder_amount()))
                    .await?;
                self.store.clear_split_intent(intent.id).await?;
                self.cache.invalidate(&intent.person);
                tracing::info!(
                    intent_id = %intent.id,
                    entry_id = original.id,
                    remainder_id = remainder.id,
                    amount = remainder.amount,
                    "Completed interrupted split"
                );
                report.completed.push(remainder);
            }
        }
        Ok(())
    }

    fn conflict(
        &self,
        intent: SplitIntent,
        reason: impl Into<String>,
        report: &mut ReconcileReport,
    ) -> AppResult<()> {
        let reason = reason.into();
        tracing::warn!(
            intent_id = %intent.id,
            entry_id = intent.entry_id,
            person = %intent.person,
            reason = %reason,
            "Split intent cannot be reconciled"
        );
        report.conflicts.push(ReconcileConflict { intent, reason });
        Ok(())
    }
}
