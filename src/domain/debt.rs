use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

/// Store-assigned identifier. Strictly increasing, never reused.
pub type DebtId = i64;

/// Suffix appended to the description of the entry carrying an unpaid remainder.
pub const REMAINDER_SUFFIX: &str = " (remaining)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The counterparty owes the user
    OwedToUser,
    /// The user owes the counterparty
    OwedByUser,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::OwedToUser => "owed_to_user",
            Direction::OwedByUser => "owed_by_user",
        }
    }

    /// Also accepts the spreadsheet encoding, where "from" meant money
    /// coming from the counterparty and "to" money going to them.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "owed_to_user" | "from" => Some(Direction::OwedToUser),
            "owed_by_user" | "to" => Some(Direction::OwedByUser),
            _ => None,
        }
    }

    /// Sign applied to an amount in this direction when deriving a net balance.
    pub fn sign(&self) -> Cents {
        match self {
            Direction::OwedToUser => 1,
            Direction::OwedByUser => -1,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Active,
    /// Terminal. A settled entry is historical record and never changes again.
    Settled,
}

impl DebtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Active => "active",
            DebtStatus::Settled => "settled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(DebtStatus::Active),
            "settled" => Some(DebtStatus::Settled),
            _ => None,
        }
    }
}

impl std::fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a counterparty name into the ledger key: trimmed and case-folded.
/// Internal whitespace runs collapse to a single space. No aliasing happens here,
/// "Jon" and "John" stay two different people.
pub fn normalize_person(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Presentation form of a counterparty name: trimmed, case preserved.
pub fn display_person(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One obligation between the user and a counterparty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtEntry {
    pub id: DebtId,
    /// When the obligation was incurred. Preserved across splits.
    pub created_date: NaiveDate,
    /// Normalized counterparty key
    pub person: String,
    /// Counterparty name as typed when the obligation was recorded; remainders inherit it
    pub display_name: String,
    pub description: String,
    /// Always strictly positive
    pub amount: Cents,
    pub direction: Direction,
    pub status: DebtStatus,
    /// Present iff status is Settled
    pub settled_date: Option<NaiveDate>,
    /// For a remainder entry, the entry it was split from
    pub split_from: Option<DebtId>,
    /// When the row was written
    pub recorded_at: DateTime<Utc>,
}

impl DebtEntry {
    pub fn is_active(&self) -> bool {
        self.status == DebtStatus::Active
    }

    pub fn is_settled(&self) -> bool {
        self.status == DebtStatus::Settled
    }

    /// Signed contribution of this entry to the net balance (zero once settled).
    pub fn signed_amount(&self) -> Cents {
        if self.is_active() {
            self.direction.sign() * self.amount
        } else {
            0
        }
    }

    /// Check the row-level invariants every stored entry must satisfy.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err(format!("entry {} has non-positive amount", self.id));
        }
        if self.person.is_empty() {
            return Err(format!("entry {} has an empty person", self.id));
        }
        match (self.status, self.settled_date) {
            (DebtStatus::Settled, None) => {
                Err(format!("entry {} is settled without a settled date", self.id))
            }
            (DebtStatus::Active, Some(_)) => {
                Err(format!("entry {} is active but has a settled date", self.id))
            }
            _ => Ok(()),
        }
    }

    /// Build the successor that carries the unpaid part of this entry after a split.
    pub fn remainder(&self, remaining_amount: Cents) -> NewDebtEntry {
        NewDebtEntry {
            created_date: self.created_date,
            person: self.person.clone(),
            display_name: self.display_name.clone(),
            description: format!("{}{}", self.description, REMAINDER_SUFFIX),
            amount: remaining_amount,
            direction: self.direction,
            split_from: Some(self.id),
        }
    }
}

/// A validated entry waiting for the store to assign its id.
/// Always created Active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDebtEntry {
    pub created_date: NaiveDate,
    pub person: String,
    pub display_name: String,
    pub description: String,
    pub amount: Cents,
    pub direction: Direction,
    pub split_from: Option<DebtId>,
}

/// Structured debt as produced by a field-extraction collaborator.
/// Unvalidated: it only becomes a ledger entry through the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtDraft {
    pub person: String,
    pub amount: Cents,
    #[serde(default)]
    pub description: String,
    pub direction: Direction,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A settlement request as produced by a field-extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDraft {
    pub person: String,
    pub amount: Cents,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}
