//! In-memory store, used by tests and for throwaway sessions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{DebtEntry, DebtId, DebtStatus, Expense, NewDebtEntry, NewExpense};

use super::{
    DebtFilter, DebtStore, EntryUpdate, ExpenseLedger, SplitIntent, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<DebtId, DebtEntry>,
    last_id: DebtId,
    intents: HashMap<Uuid, SplitIntent>,
}

/// In-memory store holding both the debt ledger and the expense history.
/// One lock guards the ledger, so every write is observed whole.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: RwLock<LedgerState>,
    expenses: RwLock<Vec<Expense>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DebtStore for MemoryStore {
    async fn append(&self, entry: NewDebtEntry) -> StoreResult<DebtEntry> {
        let mut state = self.ledger.write().await;
        let id = state.last_id + 1;

        let stored = DebtEntry {
            id,
            created_date: entry.created_date,
            person: entry.person,
            display_name: entry.display_name,
            description: entry.description,
            amount: entry.amount,
            direction: entry.direction,
            status: DebtStatus::Active,
            settled_date: None,
            split_from: entry.split_from,
            recorded_at: Utc::now(),
        };
        stored
            .check_invariants()
            .map_err(|reason| StoreError::invalid_update(id, reason))?;

        state.last_id = id;
        state.entries.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: DebtId) -> StoreResult<Option<DebtEntry>> {
        let state = self.ledger.read().await;
        Ok(state.entries.get(&id).cloned())
    }

    async fn query(&self, filter: &DebtFilter) -> StoreResult<Vec<DebtEntry>> {
        let state = self.ledger.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn update(&self, id: DebtId, update: &EntryUpdate) -> StoreResult<DebtEntry> {
        let mut state = self.ledger.write().await;
        let current = state.entries.get(&id).ok_or(StoreError::NotFound(id))?;
        let next = update.apply(current)?;
        state.entries.insert(id, next.clone());
        Ok(next)
    }

    async fn persons(&self) -> StoreResult<Vec<String>> {
        let state = self.ledger.read().await;
        let persons: BTreeSet<&String> = state.entries.values().map(|e| &e.person).collect();
        Ok(persons.into_iter().cloned().collect())
    }

    async fn record_split_intent(&self, intent: &SplitIntent) -> StoreResult<()> {
        let mut state = self.ledger.write().await;
        state.intents.insert(intent.id, intent.clone());
        Ok(())
    }

    async fn clear_split_intent(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.ledger.write().await;
        state.intents.remove(&id);
        Ok(())
    }

    async fn pending_split_intents(
        &self,
        person: Option<&str>,
    ) -> StoreResult<Vec<SplitIntent>> {
        let state = self.ledger.read().await;
        let mut intents: Vec<SplitIntent> = state
            .intents
            .values()
            .filter(|i| person.is_none_or(|p| i.person == p))
            .cloned()
            .collect();
        intents.sort_by_key(|i| i.created_at);
        Ok(intents)
    }
}

#[async_trait]
impl ExpenseLedger for MemoryStore {
    async fn record_expense(&self, expense: NewExpense) -> StoreResult<Expense> {
        let expense = expense.into_expense();
        self.expenses.write().await.push(expense.clone());
        Ok(expense)
    }

    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        let expenses = self.expenses.read().await;
        let mut result: Vec<Expense> = expenses
            .iter()
            .filter(|e| from.is_none_or(|d| e.date >= d) && to.is_none_or(|d| e.date <= d))
            .cloned()
            .collect();
        result.sort_by_key(|e| (e.date, e.recorded_at));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;

    fn new_entry(person: &str, amount: i64) -> NewDebtEntry {
        NewDebtEntry {
            created_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            person: person.into(),
            display_name: person.into(),
            description: String::new(),
            amount,
            direction: Direction::OwedToUser,
            split_from: None,
        }
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryStore::new();
        let a = store.append(new_entry("jana", 100)).await.unwrap();
        let b = store.append(new_entry("petr", 100)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
    }

    #[tokio::test]
    async fn test_append_rejects_non_positive_amount() {
        let store = MemoryStore::new();
        let err = store.append(new_entry("jana", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate { .. }));
        assert!(store.query(&DebtFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let err = store
            .update(42, &EntryUpdate::settle(date))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_persons_are_distinct_and_sorted() {
        let store = MemoryStore::new();
        for person in ["petr", "jana", "petr"] {
            store.append(new_entry(person, 100)).await.unwrap();
        }
        assert_eq!(store.persons().await.unwrap(), vec!["jana", "petr"]);
    }

    #[tokio::test]
    async fn test_split_intents_filter_by_person() {
        let store = MemoryStore::new();
        let entry = store.append(new_entry("jana", 500)).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let intent = SplitIntent::new(&entry, 100, date);
        store.record_split_intent(&intent).await.unwrap();

        assert_eq!(store.pending_split_intents(Some("jana")).await.unwrap().len(), 1);
        assert!(store.pending_split_intents(Some("petr")).await.unwrap().is_empty());

        store.clear_split_intent(intent.id).await.unwrap();
        assert!(store.pending_split_intents(None).await.unwrap().is_empty());
    }
}
