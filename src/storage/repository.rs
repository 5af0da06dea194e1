use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    DebtEntry, DebtId, DebtStatus, Direction, Expense, NewDebtEntry, NewExpense,
};

use super::{
    DebtFilter, DebtStore, EntryUpdate, ExpenseLedger, SplitIntent, StoreError, StoreResult,
    MIGRATIONS,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const DEBT_COLUMNS: &str = "id, created_date, person, display_name, description, amount_cents, direction, status, settled_date, split_from, recorded_at";

/// SQLite-backed store for the debt ledger and the expense history.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Every migration is idempotent.
    pub async fn migrate(&self) -> StoreResult<()> {
        for &(name, sql) in MIGRATIONS {
            tracing::debug!(migration = name, "Applying migration");
            sqlx::query(sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> StoreResult<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> StoreResult<DebtEntry> {
        let direction_str: String = row.try_get("direction")?;
        let status_str: String = row.try_get("status")?;
        let created_date_str: String = row.try_get("created_date")?;
        let settled_date_str: Option<String> = row.try_get("settled_date")?;
        let recorded_at_str: String = row.try_get("recorded_at")?;

        Ok(DebtEntry {
            id: row.try_get("id")?,
            created_date: parse_date(&created_date_str)?,
            person: row.try_get("person")?,
            display_name: row.try_get("display_name")?,
            description: row.try_get("description")?,
            amount: row.try_get("amount_cents")?,
            direction: Direction::from_str(&direction_str).ok_or_else(|| {
                StoreError::Corrupt(format!("invalid direction: {}", direction_str))
            })?,
            status: DebtStatus::from_str(&status_str)
                .ok_or_else(|| StoreError::Corrupt(format!("invalid status: {}", status_str)))?,
            settled_date: settled_date_str.as_deref().map(parse_date).transpose()?,
            split_from: row.try_get("split_from")?,
            recorded_at: parse_timestamp(&recorded_at_str)?,
        })
    }

    fn row_to_intent(row: &sqlx::sqlite::SqliteRow) -> StoreResult<SplitIntent> {
        let id_str: String = row.try_get("id")?;
        let settled_date_str: String = row.try_get("settled_date")?;
        let created_at_str: String = row.try_get("created_at")?;

        Ok(SplitIntent {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| StoreError::Corrupt(format!("invalid intent id: {}", e)))?,
            entry_id: row.try_get("entry_id")?,
            person: row.try_get("person")?,
            original_amount: row.try_get("original_amount_cents")?,
            paid_amount: row.try_get("paid_amount_cents")?,
            settled_date: parse_date(&settled_date_str)?,
            created_at: parse_timestamp(&created_at_str)?,
        })
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Expense> {
        let id_str: String = row.try_get("id")?;
        let date_str: String = row.try_get("date")?;
        let recorded_at_str: String = row.try_get("recorded_at")?;

        Ok(Expense {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| StoreError::Corrupt(format!("invalid expense id: {}", e)))?,
            date: parse_date(&date_str)?,
            description: row.try_get("description")?,
            amount: row.try_get("amount_cents")?,
            category: row.try_get("category")?,
            source: row.try_get("source")?,
            recorded_at: parse_timestamp(&recorded_at_str)?,
        })
    }
}

#[async_trait]
impl DebtStore for Repository {
    /// Assigns the next id from the sequence counter and inserts the row in one
    /// transaction. The counter update comes first so the write lock is taken up front.
    async fn append(&self, entry: NewDebtEntry) -> StoreResult<DebtEntry> {
        let mut tx = self.pool.begin().await?;

        let id: DebtId = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'debt_id'
            RETURNING value
            "#,
        )
        .fetch_one(&mut *tx)
        .await?
        .try_get("value")?;

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

        sqlx::query(
            r#"
            INSERT INTO debts (id, created_date, person, display_name, description, amount_cents, direction, status, settled_date, split_from, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(stored.id)
        .bind(stored.created_date.format(DATE_FORMAT).to_string())
        .bind(&stored.person)
        .bind(&stored.display_name)
        .bind(&stored.description)
        .bind(stored.amount)
        .bind(stored.direction.as_str())
        .bind(stored.status.as_str())
        .bind(stored.split_from)
        .bind(stored.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn get(&self, id: DebtId) -> StoreResult<Option<DebtEntry>> {
        let query = format!("SELECT {} FROM debts WHERE id = ?", DEBT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn query(&self, filter: &DebtFilter) -> StoreResult<Vec<DebtEntry>> {
        let mut query = format!("SELECT {} FROM debts WHERE 1=1", DEBT_COLUMNS);
        if filter.person.is_some() {
            query.push_str(" AND person = ?");
        }
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        query.push_str(" ORDER BY id");

        let mut sql_query = sqlx::query(&query);
        if let Some(person) = &filter.person {
            sql_query = sql_query.bind(person);
        }
        if let Some(status) = filter.status {
            sql_query = sql_query.bind(status.as_str());
        }

        let rows = sql_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Optimistic single-statement write: the row is only touched if it is still
    /// Active with the amount we validated against, so a concurrent settlement
    /// surfaces as a conflict instead of a lost update.
    async fn update(&self, id: DebtId, update: &EntryUpdate) -> StoreResult<DebtEntry> {
        let current = self.get(id).await?.ok_or(StoreError::NotFound(id))?;
        let next = update.apply(&current)?;

        let result = sqlx::query(
            r#"
            UPDATE debts
            SET status = ?, amount_cents = ?, settled_date = ?
            WHERE id = ? AND status = 'active' AND amount_cents = ?
            "#,
        )
        .bind(next.status.as_str())
        .bind(next.amount)
        .bind(next.settled_date.map(|d| d.format(DATE_FORMAT).to_string()))
        .bind(id)
        .bind(current.amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(id).await? {
                None => Err(StoreError::NotFound(id)),
                Some(_) => Err(StoreError::conflict(
                    id,
                    "entry was modified by another writer",
                )),
            };
        }

        Ok(next)
    }

    async fn persons(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT person FROM debts ORDER BY person")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("person").map_err(StoreError::from))
            .collect()
    }

    async fn record_split_intent(&self, intent: &SplitIntent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO split_intents (id, entry_id, person, original_amount_cents, paid_amount_cents, settled_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(intent.id.to_string())
        .bind(intent.entry_id)
        .bind(&intent.person)
        .bind(intent.original_amount)
        .bind(intent.paid_amount)
        .bind(intent.settled_date.format(DATE_FORMAT).to_string())
        .bind(intent.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_split_intent(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM split_intents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pending_split_intents(
        &self,
        person: Option<&str>,
    ) -> StoreResult<Vec<SplitIntent>> {
        let rows = match person {
            Some(person) => {
                sqlx::query(
                    r#"
                    SELECT id, entry_id, person, original_amount_cents, paid_amount_cents, settled_date, created_at
                    FROM split_intents
                    WHERE person = ?
                    ORDER BY created_at
                    "#,
                )
                .bind(person)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, entry_id, person, original_amount_cents, paid_amount_cents, settled_date, created_at
                    FROM split_intents
                    ORDER BY created_at
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::row_to_intent).collect()
    }
}

#[async_trait]
impl ExpenseLedger for Repository {
    async fn record_expense(&self, expense: NewExpense) -> StoreResult<Expense> {
        let expense = expense.into_expense();

        sqlx::query(
            r#"
            INSERT INTO expenses (id, date, description, amount_cents, category, source, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.date.format(DATE_FORMAT).to_string())
        .bind(&expense.description)
        .bind(expense.amount)
        .bind(&expense.category)
        .bind(&expense.source)
        .bind(expense.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(expense)
    }

    async fn list_expenses(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        let mut query = String::from(
            "SELECT id, date, description, amount_cents, category, source, recorded_at FROM expenses WHERE 1=1",
        );

        let from_str = from.map(|d| d.format(DATE_FORMAT).to_string());
        let to_str = to.map(|d| d.format(DATE_FORMAT).to_string());

        if from_str.is_some() {
            query.push_str(" AND date >= ?");
        }
        if to_str.is_some() {
            query.push_str(" AND date <= ?");
        }
        query.push_str(" ORDER BY date, recorded_at");

        let mut sql_query = sqlx::query(&query);
        if let Some(ref from) = from_str {
            sql_query = sql_query.bind(from);
        }
        if let Some(ref to) = to_str {
            sql_query = sql_query.bind(to);
        }

        let rows = sql_query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_expense).collect()
    }
}

fn parse_date(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("invalid date '{}': {}", s, e)))
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{}': {}", s, e)))
}
