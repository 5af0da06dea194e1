use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async lock per person key. Writers that read-modify-write a person's
/// entries hold that person's lock for the whole sequence.
#[derive(Debug, Default)]
pub struct PersonLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PersonLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `person`'s entries.
    pub async fn lock(&self, person: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks
                .entry(person.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
