use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::application::{
    BalanceReport, DebtTracker, SettlementResult, Settings, balance_message,
    debt_recorded_message, today,
};
use crate::config::Config;
use crate::domain::{DebtEntry, DebtStatus, Direction, PersonBalance, format_cents, parse_cents};
use crate::intake::{DraftExtractor, Extraction, ShorthandExtractor};

/// Debtbook - who owes whom
#[derive(Parser)]
#[command(name = "debtbook")]
#[command(about = "A local-first ledger of debts between you and the people you share costs with")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides DEBTBOOK_DATABASE)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record money someone owes you
    Lend {
        /// Who owes you
        person: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// What it was for
        #[arg(short, long)]
        description: Option<String>,

        /// Date the debt was incurred (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Record money you owe someone
    Borrow {
        /// Who you owe
        person: String,

        /// Amount (e.g., "50.00" or "50")
        amount: String,

        /// What it was for
        #[arg(short, long)]
        description: Option<String>,

        /// Date the debt was incurred (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Apply a payment to everything outstanding with a person, oldest first
    Settle {
        person: String,

        /// Amount paid
        amount: String,

        /// Settlement date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show the balance with one person or with everyone
    Balance {
        /// Person (omit for everyone)
        person: Option<String>,

        /// Include people you are all square with
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// List ledger entries
    Entries {
        /// Filter by person
        #[arg(long)]
        person: Option<String>,

        /// Filter by status (active, settled)
        #[arg(long)]
        status: Option<String>,
    },

    /// List expenses written by settlements
    Expenses {
        /// Filter from date (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<String>,

        /// Filter to date (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<String>,
    },

    /// Record or settle a debt from a short message, e.g. "jana owes me 5 for dinner"
    Say {
        /// The message
        text: String,
    },

    /// Finish or report splits interrupted by an earlier crash
    Check {
        /// Drop a split intent that cannot be reconciled
        #[arg(long)]
        discard: Option<String>,
    },

    /// Export ledger data
    Export {
        /// What to export: entries, balances, expenses, full
        export_type: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

impl Cli {
    /// Log level implied by the flags, if they imply one.
    pub fn log_level_override(&self) -> Option<&'static str> {
        self.verbose.then_some("debug")
    }

    pub async fn run(self, config: Config) -> Result<()> {
        let database = self.database.unwrap_or_else(|| config.database.clone());
        let settings = Settings::from(&config);

        match self.command {
            Commands::Init => {
                DebtTracker::init(&database, settings).await?;
                println!("Database initialized: {}", database);
            }

            Commands::Lend {
                person,
                amount,
                description,
                date,
            } => {
                let tracker = connect(&database, settings).await?;
                run_record_command(
                    &tracker,
                    &person,
                    &amount,
                    description,
                    date,
                    Direction::OwedToUser,
                )
                .await?;
            }

            Commands::Borrow {
                person,
                amount,
                description,
                date,
            } => {
                let tracker = connect(&database, settings).await?;
                run_record_command(
                    &tracker,
                    &person,
                    &amount,
                    description,
                    date,
                    Direction::OwedByUser,
                )
                .await?;
            }

            Commands::Settle {
                person,
                amount,
                date,
            } => {
                let tracker = connect(&database, settings).await?;
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let date = parse_optional_date(date)?.unwrap_or_else(today);
                let result = tracker.settle(&person, amount_cents, date).await?;
                print_settlement(&result);
            }

            Commands::Balance {
                person,
                all,
                format,
            } => {
                let tracker = connect(&database, settings).await?;
                run_balance_command(&tracker, person, all, format).await?;
            }

            Commands::Entries { person, status } => {
                let tracker = connect(&database, settings).await?;
                let status = status
                    .map(|s| {
                        DebtStatus::from_str(&s.to_lowercase()).ok_or_else(|| {
                            anyhow::anyhow!("Invalid status '{}'. Valid: active, settled", s)
                        })
                    })
                    .transpose()?;
                let entries = tracker.list_entries(person.as_deref(), status).await?;
                print_entries(&entries);
            }

            Commands::Expenses { from_date, to_date } => {
                let tracker = connect(&database, settings).await?;
                let from = parse_optional_date(from_date).context("Invalid from-date")?;
                let to = parse_optional_date(to_date).context("Invalid to-date")?;
                run_expenses_command(&tracker, from, to).await?;
            }

            Commands::Say { text } => {
                let tracker = connect(&database, settings).await?;
                run_say_command(&tracker, &text).await?;
            }

            Commands::Check { discard } => {
                let tracker = connect(&database, settings).await?;
                run_check_command(&tracker, discard).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let tracker = connect(&database, settings).await?;
                run_export_command(&tracker, &export_type, output.as_deref(), format).await?;
            }
        }

        Ok(())
    }
}

async fn run_record_command(
    tracker: &DebtTracker,
    person: &str,
    amount: &str,
    description: Option<String>,
    date: Option<String>,
    direction: Direction,
) -> Result<()> {
    let amount_cents =
        parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")?;
    let date = parse_optional_date(date)?;

    let entry = tracker
        .record_debt(
            person,
            amount_cents,
            description.as_deref().unwrap_or(""),
            direction,
            date,
        )
        .await?;

    println!("Recorded: {} (#{})", debt_recorded_message(&entry), entry.id);
    Ok(())
}

async fn run_say_command(tracker: &DebtTracker, text: &str) -> Result<()> {
    let extractor = ShorthandExtractor::new();

    match extractor.extract(text).await? {
        Extraction::Debt(draft) => {
            let entry = tracker.record_draft(draft).await?;
            println!("Recorded: {} (#{})", debt_recorded_message(&entry), entry.id);
        }
        Extraction::Settlement(draft) => {
            let result = tracker.settle_draft(draft).await?;
            print_settlement(&result);
        }
    }
    Ok(())
}

async fn run_balance_command(
    tracker: &DebtTracker,
    person: Option<String>,
    all: bool,
    format: OutputFormat,
) -> Result<()> {
    match person {
        Some(name) => {
            let balance = tracker.get_balance(&name).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&balance)?),
                _ => print_person_balance(&balance),
            }
        }
        None => {
            let mut report = tracker.list_balances().await?;
            if !all {
                report.settled_up.clear();
            }
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                _ => print_balance_report(&report),
            }
        }
    }
    Ok(())
}

async fn run_expenses_command(
    tracker: &DebtTracker,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let expenses = tracker.list_expenses(from, to).await?;

    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    println!(
        "{:<12} {:>10} {:<15} DESCRIPTION",
        "DATE", "AMOUNT", "CATEGORY"
    );
    println!("{}", "-".repeat(60));
    for expense in &expenses {
        println!(
            "{:<12} {:>10} {:<15} {}",
            expense.date,
            format_cents(expense.amount),
            truncate(&expense.category, 15),
            truncate(&expense.description, 40)
        );
    }
    println!("{}", "-".repeat(60));
    println!(
        "{:<12} {:>10}",
        "TOTAL",
        format_cents(expenses.iter().map(|e| e.amount).sum())
    );
    Ok(())
}

async fn run_check_command(tracker: &DebtTracker, discard: Option<String>) -> Result<()> {
    if let Some(id) = discard {
        let id = Uuid::parse_str(&id).context("Invalid split intent ID format (expected UUID)")?;
        let intent = tracker.discard_split_intent(id).await?;
        println!(
            "Discarded split intent {} (entry #{}, {})",
            intent.id, intent.entry_id, intent.person
        );
        return Ok(());
    }

    println!("Checking for interrupted settlements...\n");

    let report = tracker.reconcile().await?;

    println!("Completed splits: {}", report.completed.len());
    for entry in &report.completed {
        println!(
            "  #{} {} {} (from #{})",
            entry.id,
            entry.display_name,
            format_cents(entry.amount),
            entry.split_from.map(|id| id.to_string()).unwrap_or_default()
        );
    }
    println!("Rolled back:      {}", report.abandoned.len());
    println!("Already done:     {}", report.cleared.len());
    println!();

    if report.is_clean() {
        println!("Ledger is consistent.");
    } else {
        println!("Unresolved split intents:");
        for conflict in &report.conflicts {
            println!(
                "  - {} (entry #{}, {}): {}",
                conflict.intent.id, conflict.intent.entry_id, conflict.intent.person, conflict.reason
            );
        }
        anyhow::bail!("Ledger check found unresolved splits; inspect them and use --discard <id>");
    }

    Ok(())
}

async fn run_export_command(
    tracker: &DebtTracker,
    export_type: &str,
    output: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(tracker);

    // Determine output writer
    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };
    let json = format == OutputFormat::Json;

    match export_type {
        "entries" => {
            let count = if json {
                exporter.export_entries_json(writer).await?
            } else {
                exporter.export_entries_csv(writer).await?
            };
            if output.is_some() {
                eprintln!("Exported {} entries", count);
            }
        }
        "balances" => {
            let count = if json {
                let report = exporter.export_balances_json(writer).await?;
                report.outstanding().count() + report.settled_up.len()
            } else {
                exporter.export_balances_csv(writer).await?
            };
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "expenses" => {
            let count = if json {
                exporter.export_expenses_json(writer).await?
            } else {
                exporter.export_expenses_csv(writer).await?
            };
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} entries, {} expenses",
                    snapshot.entries.len(),
                    snapshot.expenses.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: entries, balances, expenses, full",
                export_type
            );
        }
    }

    Ok(())
}

fn print_settlement(result: &SettlementResult) {
    println!(
        "Settled {} with {}",
        format_cents(result.amount_applied),
        result.display_name
    );

    for entry in &result.entries_settled {
        println!(
            "  #{:<5} {:>10}  {}  {}",
            entry.id,
            format_cents(entry.amount),
            direction_label(entry.direction),
            entry.description
        );
    }
    for split in &result.entries_split {
        println!(
            "  #{:<5} {:>10}  {}  {} ({} left as #{})",
            split.settled.id,
            format_cents(split.settled.amount),
            direction_label(split.settled.direction),
            split.settled.description,
            format_cents(split.remainder.amount),
            split.remainder.id
        );
    }

    if result.overpaid > 0 {
        println!(
            "Overpaid by {}. Nothing was recorded for the excess.",
            format_cents(result.overpaid)
        );
    }
    if !result.expenses.is_empty() {
        println!("Recorded {} debt payment expense(s)", result.expenses.len());
    }
    for error in &result.expense_errors {
        eprintln!("Warning: could not record debt payment expense: {}", error);
    }

    println!("{}", balance_message(&result.new_balance));
}

fn print_person_balance(balance: &PersonBalance) {
    println!("{}", balance_message(balance));
    if balance.owed_to_user > 0 && balance.owed_by_user > 0 {
        println!("  They owe you: {:>10}", format_cents(balance.owed_to_user));
        println!("  You owe them: {:>10}", format_cents(balance.owed_by_user));
    }
}

fn print_balance_report(report: &BalanceReport) {
    if report.is_empty() {
        println!("No debts recorded.");
        return;
    }

    if !report.owes_user.is_empty() {
        println!("THEY OWE YOU");
        for balance in &report.owes_user {
            println!(
                "  {:<20} {:>12}",
                truncate(&balance.display_name, 20),
                format_cents(balance.net_amount)
            );
        }
        println!();
    }

    if !report.user_owes.is_empty() {
        println!("YOU OWE THEM");
        for balance in &report.user_owes {
            println!(
                "  {:<20} {:>12}",
                truncate(&balance.display_name, 20),
                format_cents(-balance.net_amount)
            );
        }
        println!();
    }

    if !report.settled_up.is_empty() {
        println!("ALL SQUARE");
        for balance in &report.settled_up {
            println!("  {}", balance.display_name);
        }
        println!();
    }

    println!("{}", "-".repeat(35));
    println!(
        "  {:<20} {:>12}",
        "Owed to you",
        format_cents(report.total_owed_to_user)
    );
    println!(
        "  {:<20} {:>12}",
        "You owe",
        format_cents(report.total_user_owes)
    );
    println!(
        "  {:<20} {:>12}",
        "Net position",
        format_cents(report.net_position)
    );
}

fn print_entries(entries: &[DebtEntry]) {
    if entries.is_empty() {
        println!("No entries found.");
        return;
    }

    println!(
        "{:<6} {:<12} {:<15} {:<12} {:>10} {:<8} {:<12} DESCRIPTION",
        "ID", "DATE", "PERSON", "DIRECTION", "AMOUNT", "STATUS", "SETTLED"
    );
    println!("{}", "-".repeat(100));
    for entry in entries {
        println!(
            "{:<6} {:<12} {:<15} {:<12} {:>10} {:<8} {:<12} {}",
            entry.id,
            entry.created_date,
            truncate(&entry.display_name, 15),
            direction_label(entry.direction),
            format_cents(entry.amount),
            entry.status,
            entry
                .settled_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
            truncate(&entry.description, 30)
        );
    }
}

async fn connect(database: &str, settings: Settings) -> Result<DebtTracker> {
    DebtTracker::connect(database, settings)
        .await
        .with_context(|| {
            format!(
                "Failed to open database '{}'. Run `debtbook init` first",
                database
            )
        })
}

fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::OwedToUser => "owes you",
        Direction::OwedByUser => "you owe",
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn parse_optional_date(date: Option<String>) -> Result<Option<NaiveDate>> {
    date.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", s))
    })
    .transpose()
}
