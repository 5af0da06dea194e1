mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{jan, memory_tracker, test_settings};
use debtbook::application::{AppError, DebtTracker};
use debtbook::domain::{DebtEntry, DebtStatus, Direction};
use debtbook::storage::{DebtStore, EntryUpdate, Repository, SplitIntent};
use tempfile::TempDir;

/// Journal a split of `entry` and optionally apply its first write, as a crash would leave it.
async fn interrupted_split(
    store: &dyn DebtStore,
    entry: &DebtEntry,
    paid: i64,
    first_write: bool,
) -> Result<SplitIntent> {
    let intent = SplitIntent::new(entry, paid, jan(3));
    store.record_split_intent(&intent).await?;
    if first_write {
        store
            .update(entry.id, &EntryUpdate::settle_portion(paid, jan(3)))
            .await?;
    }
    Ok(intent)
}

#[tokio::test]
async fn test_completes_split_missing_its_remainder() -> Result<()> {
    let (tracker, store) = memory_tracker();
    let entry = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    interrupted_split(store.as_ref(), &entry, 150, true).await?;

    let report = tracker.reconcile().await?;

    assert!(report.is_clean());
    assert_eq!(report.completed.len(), 1);
    let remainder = &report.completed[0];
    assert_eq!(remainder.amount, 350);
    assert_eq!(remainder.created_date, jan(1));
    assert_eq!(remainder.split_from, Some(entry.id));
    assert_eq!(remainder.status, DebtStatus::Active);

    assert_eq!(tracker.get_balance("jana").await?.net_amount, 350);
    assert!(store.pending_split_intents(None).await?.is_empty());

    // Running again changes nothing
    assert!(tracker.reconcile().await?.is_empty());
    assert_eq!(tracker.list_entries(None, None).await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_drops_split_that_never_started() -> Result<()> {
    let (tracker, store) = memory_tracker();
    let entry = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    interrupted_split(store.as_ref(), &entry, 150, false).await?;

    let report = tracker.reconcile().await?;

    assert_eq!(report.abandoned.len(), 1);
    assert!(report.completed.is_empty());
    assert_eq!(tracker.list_entries(None, None).await?.len(), 1);
    assert_eq!(tracker.get_balance("jana").await?.net_amount, 500);
    assert!(store.pending_split_intents(None).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_clears_split_that_fully_landed() -> Result<()> {
    let (tracker, store) = memory_tracker();
    let entry = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    interrupted_split(store.as_ref(), &entry, 150, true).await?;
    store.append(entry.remainder(350)).await?;

    let report = tracker.reconcile().await?;

    assert_eq!(report.cleared.len(), 1);
    assert!(report.completed.is_empty());
    // No duplicated remainder
    assert_eq!(tracker.list_entries(None, None).await?.len(), 2);
    assert_eq!(tracker.get_balance("jana").await?.net_amount, 350);

    Ok(())
}

#[tokio::test]
async fn test_unexpected_state_is_a_conflict_until_discarded() -> Result<()> {
    let (tracker, store) = memory_tracker();
    let entry = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("jana", 200, "lunch", Direction::OwedToUser, Some(jan(2)))
        .await?;

    // Journaled as a 150 split, but the entry was settled in full
    let intent = interrupted_split(store.as_ref(), &entry, 150, false).await?;
    store.update(entry.id, &EntryUpdate::settle(jan(3))).await?;

    let report = tracker.reconcile().await?;
    assert!(!report.is_clean());
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].intent.id, intent.id);
    assert_eq!(store.pending_split_intents(None).await?.len(), 1);

    let err = tracker.settle("jana", 100, jan(4)).await.unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict(_)));

    let discarded = tracker.discard_split_intent(intent.id).await?;
    assert_eq!(discarded.entry_id, entry.id);

    let result = tracker.settle("jana", 100, jan(4)).await?;
    assert_eq!(result.new_balance.net_amount, 100);

    let err = tracker
        .discard_split_intent(intent.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_settle_heals_before_allocating() -> Result<()> {
    let (tracker, store) = memory_tracker();
    let entry = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    interrupted_split(store.as_ref(), &entry, 150, true).await?;

    // Pays off the 350 remainder that reconciliation restores
    let result = tracker.settle("jana", 350, jan(5)).await?;

    assert_eq!(result.entries_settled.len(), 1);
    assert_eq!(result.entries_settled[0].split_from, Some(entry.id));
    assert_eq!(result.overpaid, 0);
    assert_eq!(result.new_balance.net_amount, 0);

    Ok(())
}

#[tokio::test]
async fn test_other_persons_intents_are_left_alone_by_settle() -> Result<()> {
    let (tracker, store) = memory_tracker();
    let jana = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("petr", 200, "beer", Direction::OwedToUser, Some(jan(1)))
        .await?;
    interrupted_split(store.as_ref(), &jana, 150, true).await?;

    tracker.settle("petr", 200, jan(4)).await?;

    assert_eq!(store.pending_split_intents(Some("jana")).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_open_reconciles_persisted_database() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("ledger.db");
    let db_path = db_path.to_str().unwrap();

    let entry = {
        let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path)).await?;
        let entry = repo
            .append(debtbook::domain::NewDebtEntry {
                created_date: jan(1),
                person: "jana".into(),
                display_name: "Jana".into(),
                description: "dinner".into(),
                amount: 500,
                direction: Direction::OwedToUser,
                split_from: None,
            })
            .await?;
        interrupted_split(&repo, &entry, 150, true).await?;
        entry
    };

    let tracker = DebtTracker::connect(db_path, test_settings()).await?;

    let entries = tracker.list_entries(Some("jana"), None).await?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, entry.id);
    assert_eq!(entries[0].amount, 150);
    assert_eq!(entries[1].amount, 350);
    assert_eq!(entries[1].description, "dinner (remaining)");
    assert_eq!(tracker.get_balance("jana").await?.net_amount, 350);
    assert!(tracker.reconcile().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_open_runs_reconciliation() -> Result<()> {
    let store = Arc::new(debtbook::storage::MemoryStore::new());
    let seed = DebtTracker::new(store.clone(), store.clone(), Duration::ZERO);
    let entry = seed
        .record_debt("jana", 500, "dinner", Direction::OwedByUser, Some(jan(1)))
        .await?;
    interrupted_split(store.as_ref(), &entry, 200, true).await?;

    let tracker = DebtTracker::open(store.clone(), store.clone(), Duration::ZERO).await?;

    assert!(store.pending_split_intents(None).await?.is_empty());
    assert_eq!(tracker.get_balance("jana").await?.net_amount, -300);
    Ok(())
}
