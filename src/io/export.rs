use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{BalanceReport, DebtTracker};
use crate::domain::{DebtEntry, Expense, PersonBalance};

/// Full ledger snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub entries: Vec<DebtEntry>,
    pub balances: BalanceReport,
    pub expenses: Vec<Expense>,
}

/// Exporter for converting ledger data to CSV and JSON
pub struct Exporter<'a> {
    tracker: &'a DebtTracker,
}

impl<'a> Exporter<'a> {
    pub fn new(tracker: &'a DebtTracker) -> Self {
        Self { tracker }
    }

    /// Export every ledger entry, settled ones included, to CSV
    pub async fn export_entries_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.tracker.list_entries(None, None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "created_date",
            "person",
            "display_name",
            "description",
            "amount_cents",
            "direction",
            "status",
            "settled_date",
            "split_from",
        ])?;

        for entry in &entries {
            csv_writer.write_record(&[
                entry.id.to_string(),
                entry.created_date.to_string(),
                entry.person.clone(),
                entry.display_name.clone(),
                entry.description.clone(),
                entry.amount.to_string(),
                entry.direction.as_str().to_string(),
                entry.status.as_str().to_string(),
                entry
                    .settled_date
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                entry.split_from.map(|id| id.to_string()).unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export per-person balances to CSV, settled-up persons included
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let report = self.tracker.list_balances().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "person",
            "display_name",
            "owed_to_user_cents",
            "owed_by_user_cents",
            "net_cents",
        ])?;

        let balances: Vec<&PersonBalance> =
            report.outstanding().chain(report.settled_up.iter()).collect();
        for balance in &balances {
            csv_writer.write_record(&[
                balance.person.clone(),
                balance.display_name.clone(),
                balance.owed_to_user.to_string(),
                balance.owed_by_user.to_string(),
                balance.net_amount.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(balances.len())
    }

    /// Export the expense history to CSV
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.tracker.list_expenses(None, None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "description",
            "amount_cents",
            "category",
            "source",
        ])?;

        for expense in &expenses {
            csv_writer.write_record(&[
                expense.id.to_string(),
                expense.date.to_string(),
                expense.description.clone(),
                expense.amount.to_string(),
                expense.category.clone(),
                expense.source.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(expenses.len())
    }

    pub async fn export_entries_json<W: Write>(&self, writer: W) -> Result<usize> {
        let entries = self.tracker.list_entries(None, None).await?;
        write_json(writer, &entries)?;
        Ok(entries.len())
    }

    pub async fn export_balances_json<W: Write>(&self, writer: W) -> Result<BalanceReport> {
        let report = self.tracker.list_balances().await?;
        write_json(writer, &report)?;
        Ok(report)
    }

    pub async fn export_expenses_json<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.tracker.list_expenses(None, None).await?;
        write_json(writer, &expenses)?;
        Ok(expenses.len())
    }

    /// Export the whole ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            entries: self.tracker.list_entries(None, None).await?,
            balances: self.tracker.list_balances().await?,
            expenses: self.tracker.list_expenses(None, None).await?,
        };

        write_json(writer, &snapshot)?;
        Ok(snapshot)
    }
}

fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
