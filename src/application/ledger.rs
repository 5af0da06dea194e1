use std::sync::Arc;

use crate::domain::{
    DebtEntry, DebtStatus, PersonBalance, compute_balance, display_person, normalize_person,
    sort_for_allocation,
};
use crate::storage::{DebtFilter, DebtStore};

use super::{AppError, AppResult, BalanceCache, BalanceReport};

/// Read side of the ledger. Balances are always derived from entries, never stored.
pub struct LedgerService {
    store: Arc<dyn DebtStore>,
    cache: Arc<BalanceCache>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn DebtStore>, cache: Arc<BalanceCache>) -> Self {
        Self { store, cache }
    }

    /// Balance with one person. Unknown persons get an all-zero balance.
    pub async fn get_balance(&self, person: &str) -> AppResult<PersonBalance> {
        let key = person_key(person)?;
        if let Some(balance) = self.cache.get(&key) {
            return Ok(balance);
        }

        // Taken before the read so a write that lands during it keeps this result out of the cache.
        let generation = self.cache.generation(&key);
        let entries = self.store.query(&DebtFilter::person(key.clone())).await?;
        let mut balance = compute_balance(&key, &entries);
        if entries.is_empty() {
            balance.display_name = display_person(person);
        }

        if !self.cache.insert_if_current(key, balance.clone(), generation) {
            tracing::debug!(person = %balance.person, "Ledger changed during balance read, not caching");
        }
        Ok(balance)
    }

    /// Balances for every person that ever appeared in the ledger.
    pub async fn list_balances(&self) -> AppResult<BalanceReport> {
        let persons = self.store.persons().await?;
        let mut balances = Vec::with_capacity(persons.len());
        for person in persons {
            balances.push(self.get_balance(&person).await?);
        }
        Ok(BalanceReport::from_balances(balances))
    }

    /// Active entries for a person in allocation order.
    pub async fn get_active_entries(&self, person: &str) -> AppResult<Vec<DebtEntry>> {
        let key = person_key(person)?;
        let mut entries = self.store.query(&DebtFilter::active_for(key)).await?;
        sort_for_allocation(&mut entries);
        Ok(entries)
    }

    /// Ledger history, optionally narrowed to one person and/or status, in id order.
    pub async fn list_entries(
        &self,
        person: Option<&str>,
        status: Option<DebtStatus>,
    ) -> AppResult<Vec<DebtEntry>> {
        let person = person.map(person_key).transpose()?;
        Ok(self.store.query(&DebtFilter { person, status }).await?)
    }

    /// Drop the cached balance for `person` after a write.
    pub fn invalidate(&self, person: &str) {
        self.cache.invalidate(&normalize_person(person));
    }
}

pub(crate) fn person_key(person: &str) -> AppResult<String> {
    let key = normalize_person(person);
    if key.is_empty() {
        return Err(AppError::validation("person must not be empty"));
    }
    Ok(key)
}
