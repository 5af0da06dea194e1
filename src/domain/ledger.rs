use serde::{Deserialize, Serialize};

use super::{Cents, DebtEntry, Direction};

/// Derived position between the user and one counterparty.
/// Positive `net_amount` means they owe the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonBalance {
    pub person: String,
    pub display_name: String,
    pub net_amount: Cents,
    pub owed_to_user: Cents,
    pub owed_by_user: Cents,
}

impl PersonBalance {
    pub fn zero(person: impl Into<String>) -> Self {
        let person = person.into();
        Self {
            display_name: person.clone(),
            person,
            net_amount: 0,
            owed_to_user: 0,
            owed_by_user: 0,
        }
    }
}

/// Compute the balance with one person from a list of entries.
/// Only Active entries for that person contribute. `display_name` comes from the
/// entry with the highest id, settled or not.
pub fn compute_balance(person: &str, entries: &[DebtEntry]) -> PersonBalance {
    let mut balance = PersonBalance::zero(person);

    let mut newest: Option<&DebtEntry> = None;
    for entry in entries.iter().filter(|e| e.person == person) {
        if newest.is_none_or(|n| entry.id > n.id) {
            newest = Some(entry);
        }
        if !entry.is_active() {
            continue;
        }
        match entry.direction {
            Direction::OwedToUser => balance.owed_to_user += entry.amount,
            Direction::OwedByUser => balance.owed_by_user += entry.amount,
        }
    }

    // The most recently recorded spelling is the one shown
    if let Some(entry) = newest {
        balance.display_name = entry.display_name.clone();
    }
    balance.net_amount = balance.owed_to_user - balance.owed_by_user;
    balance
}

/// Sort entries into allocation order: oldest `created_date` first, ties by id.
pub fn sort_for_allocation(entries: &mut [DebtEntry]) {
    entries.sort_by(|a, b| {
        a.created_date
            .cmp(&b.created_date)
            .then_with(|| a.id.cmp(&b.id))
    });
}
