mod common;

use anyhow::Result;
use common::{jan, test_tracker};
use debtbook::application::{AppError, DebtTracker};
use debtbook::domain::{DebtDraft, DebtStatus, Direction};

#[tokio::test]
async fn test_record_and_balance() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    let entry = tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    assert_eq!(entry.status, DebtStatus::Active);
    assert_eq!(entry.created_date, jan(1));
    assert_eq!(entry.settled_date, None);

    let balance = tracker.get_balance("jana").await?;
    assert_eq!(balance.net_amount, 500);
    assert_eq!(balance.owed_to_user, 500);
    assert_eq!(balance.owed_by_user, 0);

    tracker
        .record_debt("jana", 300, "taxi", Direction::OwedByUser, Some(jan(2)))
        .await?;

    let balance = tracker.get_balance("jana").await?;
    assert_eq!(balance.net_amount, 200);
    assert_eq!(balance.owed_to_user, 500);
    assert_eq!(balance.owed_by_user, 300);

    Ok(())
}

#[tokio::test]
async fn test_unknown_person_has_zero_balance() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    let balance = tracker.get_balance("nobody").await?;
    assert_eq!(balance.person, "nobody");
    assert_eq!(balance.net_amount, 0);
    assert_eq!(balance.owed_to_user, 0);
    assert_eq!(balance.owed_by_user, 0);

    Ok(())
}

#[tokio::test]
async fn test_ids_are_unique_and_increasing() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    let mut last = 0;
    for person in ["jana", "petr", "jana"] {
        let entry = tracker
            .record_debt(person, 100, "", Direction::OwedToUser, Some(jan(1)))
            .await?;
        assert!(entry.id > last);
        last = entry.id;
    }

    Ok(())
}

#[tokio::test]
async fn test_invalid_drafts_are_rejected_without_writing() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    let zero = tracker
        .record_debt("jana", 0, "dinner", Direction::OwedToUser, None)
        .await;
    assert!(matches!(zero, Err(AppError::Validation(_))));

    let negative = tracker
        .record_debt("jana", -100, "dinner", Direction::OwedToUser, None)
        .await;
    assert!(matches!(negative, Err(AppError::Validation(_))));

    let nobody = tracker
        .record_debt("   ", 100, "dinner", Direction::OwedToUser, None)
        .await;
    assert!(matches!(nobody, Err(AppError::Validation(_))));

    assert!(tracker.list_entries(None, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_person_names_are_normalized() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    tracker
        .record_debt("  Jana ", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("JANA", 200, "lunch", Direction::OwedToUser, Some(jan(2)))
        .await?;
    // No fuzzy matching: a different spelling is a different person
    tracker
        .record_debt("Janka", 50, "coffee", Direction::OwedToUser, Some(jan(2)))
        .await?;

    let balance = tracker.get_balance("jana").await?;
    assert_eq!(balance.net_amount, 700);
    assert_eq!(tracker.get_balance("janka").await?.net_amount, 50);

    let entries = tracker.list_entries(Some("Jana"), None).await?;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.person == "jana"));
    assert_eq!(entries[0].display_name, "Jana");
    assert_eq!(entries[1].display_name, "JANA");

    Ok(())
}

#[tokio::test]
async fn test_date_defaults_to_today() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    let entry = tracker
        .record_draft(DebtDraft {
            person: "petr".into(),
            amount: 1250,
            description: "concert".into(),
            direction: Direction::OwedByUser,
            date: None,
        })
        .await?;

    assert_eq!(entry.created_date, debtbook::application::today());
    assert_eq!(tracker.get_balance("petr").await?.net_amount, -1250);
    Ok(())
}

#[tokio::test]
async fn test_list_balances_partitions_and_totals() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("eva", 900, "tickets", Direction::OwedToUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("petr", 200, "beer", Direction::OwedByUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("karel", 300, "fuel", Direction::OwedToUser, Some(jan(1)))
        .await?;
    tracker
        .record_debt("karel", 300, "parking", Direction::OwedByUser, Some(jan(2)))
        .await?;

    let report = tracker.list_balances().await?;

    let owes: Vec<&str> = report.owes_user.iter().map(|b| b.person.as_str()).collect();
    assert_eq!(owes, vec!["eva", "jana"]);
    let owed: Vec<&str> = report.user_owes.iter().map(|b| b.person.as_str()).collect();
    assert_eq!(owed, vec!["petr"]);
    assert_eq!(report.settled_up.len(), 1);
    assert_eq!(report.settled_up[0].person, "karel");

    assert_eq!(report.total_owed_to_user, 1400);
    assert_eq!(report.total_user_owes, 200);
    assert_eq!(report.net_position, 1200);

    Ok(())
}

#[tokio::test]
async fn test_active_entries_in_allocation_order() -> Result<()> {
    let (tracker, _temp) = test_tracker().await?;

    // Recorded out of date order
    let late = tracker
        .record_debt("jana", 100, "late", Direction::OwedToUser, Some(jan(5)))
        .await?;
    let early = tracker
        .record_debt("jana", 100, "early", Direction::OwedByUser, Some(jan(1)))
        .await?;
    let same_day = tracker
        .record_debt("jana", 100, "same day", Direction::OwedToUser, Some(jan(5)))
        .await?;

    let ids: Vec<i64> = tracker
        .get_active_entries("jana")
        .await?
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec![early.id, late.id, same_day.id]);

    Ok(())
}

#[tokio::test]
async fn test_in_memory_tracker_settles() -> Result<()> {
    let tracker = DebtTracker::in_memory(common::test_settings());

    tracker
        .record_debt("jana", 500, "dinner", Direction::OwedToUser, Some(jan(1)))
        .await?;
    let result = tracker.settle("jana", 500, jan(2)).await?;

    assert_eq!(result.amount_applied, 500);
    assert_eq!(tracker.get_balance("jana").await?.net_amount, 0);
    assert!(tracker.get_active_entries("jana").await?.is_empty());

    Ok(())
}
