//! Bounded retry with exponential backoff for transient store failures.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{DebtEntry, DebtId, Expense, NewDebtEntry, NewExpense};

use super::{
    DebtFilter, DebtStore, EntryUpdate, ExpenseLedger, SplitIntent, StoreResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << retry.min(16))
    }

    /// Run `op`, retrying only failures the store marks as retryable.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && retry < self.max_retries => {
                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        operation,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Store unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// Decorator that applies a [`RetryPolicy`] to every call of the wrapped store.
pub struct RetryingStore<S: ?Sized> {
    inner: Arc<S>,
    policy: RetryPolicy,
}

impl<S: ?Sized> RetryingStore<S> {
    pub fn new(inner: Arc<S>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: DebtStore + ?Sized> DebtStore for RetryingStore<S> {
    async fn append(&self, entry: NewDebtEntry) -> StoreResult<DebtEntry> {
        self.policy
            .run("append", || self.inner.append(entry.clone()))
            .await
    }

    async fn get(&self, id: DebtId) -> StoreResult<Option<DebtEntry>> {
        self.policy.run("get", || self.inner.get(id)).await
    }

    async fn query(&self, filter: &DebtFilter) -> StoreResult<Vec<DebtEntry>> {
        self.policy.run("query", || self.inner.query(filter)).await
    }

    async fn update(&self, id: DebtId, update: &EntryUpdate) -> StoreResult<DebtEntry> {
        self.policy
            .run("update", || self.inner.update(id, update))
            .await
    }

    async fn persons(&self) -> StoreResult<Vec<String>> {
        self.policy.run("persons", || self.inner.persons()).await
    }

    async fn record_split_intent(&self, intent: &SplitIntent) -> StoreResult<()> {
        self.policy
            .run("record_split_intent", || self.inner.record_split_intent(intent))
            .await
    }

    async fn clear_split_intent(&self, id: Uuid) -> StoreResult<()> {
        self.policy
            .run("clear_split_intent", || self.inner.clear_split_intent(id))
            .await
    }

    async fn pending_split_intents(
        &self,
        person: Option<&str>,
    ) -> StoreResult<Vec<SplitIntent>> {
        self.policy
            .run("pending_split_intents", || {
                self.inner.pending_split_intents(person)
            })
            .await
    }
}

#[async_trait]
impl<S: ExpenseLedger + ?Sized> ExpenseLedger for RetryingStore<S> {
    async fn record_expense(&self, expense: NewExpense) -> StoreResult<Expense> {
        self.policy
            .run("record_expense", || self.inner.record_expense(expense.clone()))
            .await
    }

    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        self.policy
            .run("list_expenses", || self.inner.list_expenses(from, to))
            .await
    }
}
