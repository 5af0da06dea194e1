use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{
    Cents, DebtDraft, DebtEntry, DebtStatus, Direction, Expense, PersonBalance, SettlementDraft,
};
use crate::storage::{
    DebtStore, ExpenseLedger, MemoryStore, Repository, RetryPolicy, RetryingStore, SplitIntent,
};

use super::{
    AppResult, BalanceCache, BalanceReport, DebtRecorder, LedgerService, PersonLocks,
    ReconcileReport, Reconciler, SettlementEngine, SettlementResult,
};

/// Tuning knobs for a [`DebtTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            retry: config.retry_policy(),
            cache_ttl: config.cache_ttl(),
        }
    }
}

/// Application service providing the debt ledger operations.
/// This is the primary interface for any client (CLI, chat bot, HTTP handler).
pub struct DebtTracker {
    recorder: DebtRecorder,
    ledger: Arc<LedgerService>,
    engine: SettlementEngine,
    reconciler: Arc<Reconciler>,
    expenses: Arc<dyn ExpenseLedger>,
}

impl DebtTracker {
    /// Wire the services around the given stores. Does not reconcile; see [`DebtTracker::open`].
    pub fn new(
        store: Arc<dyn DebtStore>,
        expenses: Arc<dyn ExpenseLedger>,
        cache_ttl: Duration,
    ) -> Self {
        let cache = Arc::new(BalanceCache::new(cache_ttl));
        let locks = Arc::new(PersonLocks::new());

        let ledger = Arc::new(LedgerService::new(store.clone(), cache.clone()));
        let reconciler = Arc::new(Reconciler::new(store.clone(), cache.clone(), locks.clone()));
        let recorder = DebtRecorder::new(store.clone(), cache);
        let engine = SettlementEngine::new(
            store,
            expenses.clone(),
            ledger.clone(),
            reconciler.clone(),
            locks,
        );

        Self {
            recorder,
            ledger,
            engine,
            reconciler,
            expenses,
        }
    }

    /// Wire the services and heal any split left unfinished by an earlier run.
    pub async fn open(
        store: Arc<dyn DebtStore>,
        expenses: Arc<dyn ExpenseLedger>,
        cache_ttl: Duration,
    ) -> AppResult<Self> {
        let tracker = Self::new(store, expenses, cache_ttl);
        let report = tracker.reconcile().await?;
        if !report.is_empty() {
            tracing::info!(
                completed = report.completed.len(),
                abandoned = report.abandoned.len(),
                cleared = report.cleared.len(),
                conflicts = report.conflicts.len(),
                "Reconciled split intents"
            );
        }
        Ok(tracker)
    }

    /// Initialize a new database at the given path (created if missing).
    pub async fn init(database_path: &str, settings: Settings) -> AppResult<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Self::with_repository(repo, settings).await
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, settings: Settings) -> AppResult<Self> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        repo.migrate().await?;
        Self::with_repository(repo, settings).await
    }

    /// A tracker backed by memory only.
    pub fn in_memory(settings: Settings) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, settings.cache_ttl)
    }

    async fn with_repository(repo: Repository, settings: Settings) -> AppResult<Self> {
        let store = Arc::new(RetryingStore::new(Arc::new(repo), settings.retry));
        Self::open(store.clone(), store, settings.cache_ttl).await
    }

    // ========================
    // Recording
    // ========================

    pub async fn record_debt(
        &self,
        person: &str,
        amount: Cents,
        description: &str,
        direction: Direction,
        date: Option<NaiveDate>,
    ) -> AppResult<DebtEntry> {
        self.recorder
            .record_debt(person, amount, description, direction, date)
            .await
    }

    pub async fn record_draft(&self, draft: DebtDraft) -> AppResult<DebtEntry> {
        self.recorder.record_draft(draft).await
    }

    // ========================
    // Settlement
    // ========================

    pub async fn settle(
        &self,
        person: &str,
        amount: Cents,
        date: NaiveDate,
    ) -> AppResult<SettlementResult> {
        self.engine.settle(person, amount, date).await
    }

    pub async fn settle_draft(&self, draft: SettlementDraft) -> AppResult<SettlementResult> {
        self.engine.settle_draft(draft).await
    }

    // ========================
    // Queries
    // ========================

    pub async fn get_balance(&self, person: &str) -> AppResult<PersonBalance> {
        self.ledger.get_balance(person).await
    }

    pub async fn list_balances(&self) -> AppResult<BalanceReport> {
        self.ledger.list_balances().await
    }

    pub async fn get_active_entries(&self, person: &str) -> AppResult<Vec<DebtEntry>> {
        self.ledger.get_active_entries(person).await
    }

    pub async fn list_entries(
        &self,
        person: Option<&str>,
        status: Option<DebtStatus>,
    ) -> AppResult<Vec<DebtEntry>> {
        self.ledger.list_entries(person, status).await
    }

    pub async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<Vec<Expense>> {
        Ok(self.expenses.list_expenses(from, to).await?)
    }

    // ========================
    // Maintenance
    // ========================

    /// Resolve every pending split intent.
    pub async fn reconcile(&self) -> AppResult<ReconcileReport> {
        self.reconciler.reconcile(None).await
    }

    /// Drop a split intent that reconciliation reported as a conflict.
    pub async fn discard_split_intent(&self, id: Uuid) -> AppResult<SplitIntent> {
        self.reconciler.discard(id).await
    }
}
