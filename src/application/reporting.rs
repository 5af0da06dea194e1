use serde::{Deserialize, Serialize};

use crate::domain::{Cents, DebtEntry, Direction, PersonBalance, format_cents};

/// All balances, partitioned by who owes whom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Persons with a positive net, largest first
    pub owes_user: Vec<PersonBalance>,
    /// Persons the user owes, largest debt first
    pub user_owes: Vec<PersonBalance>,
    /// Persons whose entries cancel out exactly
    pub settled_up: Vec<PersonBalance>,
    pub total_owed_to_user: Cents,
    pub total_user_owes: Cents,
    pub net_position: Cents,
}

impl BalanceReport {
    pub fn from_balances(balances: impl IntoIterator<Item = PersonBalance>) -> Self {
        let mut report = Self::default();

        for balance in balances {
            if balance.net_amount > 0 {
                report.total_owed_to_user += balance.net_amount;
                report.owes_user.push(balance);
            } else if balance.net_amount < 0 {
                report.total_user_owes += -balance.net_amount;
                report.user_owes.push(balance);
            } else {
                report.settled_up.push(balance);
            }
        }

        let by_size = |a: &PersonBalance, b: &PersonBalance| {
            b.net_amount
                .abs()
                .cmp(&a.net_amount.abs())
                .then_with(|| a.person.cmp(&b.person))
        };
        report.owes_user.sort_by(by_size);
        report.user_owes.sort_by(by_size);
        report.settled_up.sort_by(|a, b| a.person.cmp(&b.person));

        report.net_position = report.total_owed_to_user - report.total_user_owes;
        report
    }

    /// Persons with something outstanding.
    pub fn outstanding(&self) -> impl Iterator<Item = &PersonBalance> {
        self.owes_user.iter().chain(self.user_owes.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.owes_user.is_empty() && self.user_owes.is_empty() && self.settled_up.is_empty()
    }
}

/// Confirmation line for a freshly recorded entry.
pub fn debt_recorded_message(entry: &DebtEntry) -> String {
    let amount = format_cents(entry.amount);
    let line = match entry.direction {
        Direction::OwedToUser => format!("{} owes you {}", entry.display_name, amount),
        Direction::OwedByUser => format!("You owe {} {}", entry.display_name, amount),
    };
    if entry.description.is_empty() {
        line
    } else {
        format!("{} for {}", line, entry.description)
    }
}

/// One-line summary of where the user stands with a person.
pub fn balance_message(balance: &PersonBalance) -> String {
    let name = &balance.display_name;
    if balance.net_amount > 0 {
        format!("{} owes you {}", name, format_cents(balance.net_amount))
    } else if balance.net_amount < 0 {
        format!("You owe {} {}", name, format_cents(-balance.net_amount))
    } else {
        format!("You and {} are all square!", name)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::domain::DebtStatus;

    fn balance(person: &str, owed_to_user: Cents, owed_by_user: Cents) -> PersonBalance {
        PersonBalance {
            person: person.to_lowercase(),
            display_name: person.into(),
            net_amount: owed_to_user - owed_by_user,
            owed_to_user,
            owed_by_user,
        }
    }

    #[test]
    fn test_report_partitions_and_sorts() {
        let report = BalanceReport::from_balances(vec![
            balance("Jana", 500, 0),
            balance("Petr", 0, 200),
            balance("Eva", 900, 100),
            balance("Karel", 300, 300),
            balance("Ota", 0, 700),
        ]);

        let owes: Vec<&str> = report.owes_user.iter().map(|b| b.person.as_str()).collect();
        assert_eq!(owes, vec!["eva", "jana"]);
        let owed: Vec<&str> = report.user_owes.iter().map(|b| b.person.as_str()).collect();
        assert_eq!(owed, vec!["ota", "petr"]);
        assert_eq!(report.settled_up.len(), 1);

        assert_eq!(report.total_owed_to_user, 1300);
        assert_eq!(report.total_user_owes, 900);
        assert_eq!(report.net_position, 400);
        assert_eq!(report.outstanding().count(), 4);
    }

    #[test]
    fn test_empty_report() {
        let report = BalanceReport::from_balances(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.net_position, 0);
    }

    #[test]
    fn test_balance_messages() {
        assert_eq!(balance_message(&balance("Jana", 500, 0)), "Jana owes you 5.00");
        assert_eq!(balance_message(&balance("Jana", 0, 1250)), "You owe Jana 12.50");
        assert_eq!(
            balance_message(&balance("Jana", 300, 300)),
            "You and Jana are all square!"
        );
    }

    #[test]
    fn test_recorded_message() {
        let mut entry = DebtEntry {
            id: 1,
            created_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            person: "jana".into(),
            display_name: "Jana".into(),
            description: "dinner".into(),
            amount: 500,
            direction: Direction::OwedToUser,
            status: DebtStatus::Active,
            settled_date: None,
            split_from: None,
            recorded_at: Utc::now(),
        };
        assert_eq!(debt_recorded_message(&entry), "Jana owes you 5.00 for dinner");

        entry.direction = Direction::OwedByUser;
        entry.description.clear();
        assert_eq!(debt_recorded_message(&entry), "You owe Jana 5.00");
    }
}
