// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use debtbook::application::{DebtTracker, Settings};
use debtbook::storage::{MemoryStore, RetryPolicy};
use tempfile::TempDir;

/// Settings for tests: no waiting between retries, caching on.
pub fn test_settings() -> Settings {
    Settings {
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        cache_ttl: Duration::from_secs(60),
    }
}

/// Helper to create a test tracker with a temporary SQLite database
pub async fn test_tracker() -> Result<(DebtTracker, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let tracker = DebtTracker::init(db_path.to_str().unwrap(), test_settings()).await?;
    Ok((tracker, temp_dir))
}

/// Tracker over an in-memory store that the test can also reach directly
pub fn memory_tracker() -> (DebtTracker, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let tracker = DebtTracker::new(store.clone(), store.clone(), Duration::from_secs(60));
    (tracker, store)
}

/// Helper to build a date in January 2024
pub fn jan(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Helper to parse a YYYY-MM-DD date
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}
