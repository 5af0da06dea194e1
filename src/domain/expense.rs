use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type ExpenseId = Uuid;

/// Category given to expenses produced by paying off a debt.
pub const DEBT_PAYMENT_CATEGORY: &str = "Debt Payment";

/// Source tag for expenses written by the settlement engine.
pub const DEBT_SETTLEMENT_SOURCE: &str = "debt_settlement";

/// A row in the expense history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Cents,
    pub category: String,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

/// An expense waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Cents,
    pub category: String,
    pub source: String,
}

impl NewExpense {
    /// Expense for paying off money the user owed `person`.
    pub fn debt_payment(date: NaiveDate, person: &str, amount: Cents) -> Self {
        Self {
            date,
            description: format!("Debt payment to {}", person),
            amount,
            category: DEBT_PAYMENT_CATEGORY.to_string(),
            source: DEBT_SETTLEMENT_SOURCE.to_string(),
        }
    }

    pub fn into_expense(self) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            date: self.date,
            description: self.description,
            amount: self.amount,
            category: self.category,
            source: self.source,
            recorded_at: Utc::now(),
        }
    }
}
