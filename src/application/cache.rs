//! Explicit TTL cache handed to the services that need one.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token taken before computing a value, checked again when it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug)]
struct CacheState<K, V> {
    entries: HashMap<K, (Instant, V)>,
    /// Counter value at each key's last invalidation
    invalidated: HashMap<K, u64>,
    cleared: u64,
    counter: u64,
}

impl<K: Eq + Hash, V> CacheState<K, V> {
    fn generation(&self, key: &K) -> Generation {
        let last = self.invalidated.get(key).copied().unwrap_or(0);
        Generation(last.max(self.cleared))
    }

    fn bump(&mut self) -> u64 {
        self.counter += 1;
        self.counter
    }
}

/// Small map whose entries expire after a fixed time-to-live.
///
/// Owners invalidate keys themselves after writes; expiry is only a backstop
/// against writers outside this process. A zero TTL disables caching.
///
/// Readers that compute a value from the store take a [`Generation`] first and
/// store through [`TtlCache::insert_if_current`], so a value computed from rows
/// that were rewritten meanwhile is dropped instead of cached.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                invalidated: HashMap::new(),
                cleared: 0,
                counter: 0,
            }),
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        if !self.is_enabled() {
            return None;
        }
        let mut state = self.lock();
        let fresh = state
            .entries
            .get(key)
            .map(|(stored_at, _)| stored_at.elapsed() < self.ttl)?;
        if fresh {
            state.entries.get(key).map(|(_, value)| value.clone())
        } else {
            state.entries.remove(key);
            None
        }
    }

    /// Current generation of `key`. Take it before reading the source of a value.
    pub fn generation(&self, key: &K) -> Generation {
        self.lock().generation(key)
    }

    pub fn insert(&self, key: K, value: V) {
        if self.is_enabled() {
            self.lock().entries.insert(key, (Instant::now(), value));
        }
    }

    /// Store `value` only if `key` was not invalidated since `seen` was taken.
    /// Returns whether the value was stored.
    pub fn insert_if_current(&self, key: K, value: V, seen: Generation) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let mut state = self.lock();
        if state.generation(&key) != seen {
            return false;
        }
        state.entries.insert(key, (Instant::now(), value));
        true
    }

    pub fn invalidate(&self, key: &K)
    where
        K: Clone,
    {
        let mut state = self.lock();
        state.entries.remove(key);
        let counter = state.bump();
        state.invalidated.insert(key.clone(), counter);
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.invalidated.clear();
        state.cleared = state.bump();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another thread panicked mid-insert; the map is still usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState<K, V>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("jana".to_string(), 500);
        assert_eq!(cache.get(&"jana".to_string()), Some(500));
        assert_eq!(cache.get(&"petr".to_string()), None);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("jana".to_string(), 500);
        cache.insert("petr".to_string(), 100);

        cache.invalidate(&"jana".to_string());
        assert_eq!(cache.get(&"jana".to_string()), None);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire() {
        let cache = TtlCache::new(Duration::from_millis(5));
        cache.insert(1, "x");
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let cache = TtlCache::disabled();
        cache.insert(1, "x");
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_after_invalidation_is_dropped() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let seen = cache.generation(&"jana".to_string());

        cache.invalidate(&"jana".to_string());

        assert!(!cache.insert_if_current("jana".to_string(), 500, seen));
        assert_eq!(cache.get(&"jana".to_string()), None);

        let seen = cache.generation(&"jana".to_string());
        assert!(cache.insert_if_current("jana".to_string(), 0, seen));
        assert_eq!(cache.get(&"jana".to_string()), Some(0));
    }

    #[test]
    fn test_invalidation_of_other_keys_keeps_generation() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let seen = cache.generation(&"jana".to_string());

        cache.invalidate(&"petr".to_string());

        assert!(cache.insert_if_current("jana".to_string(), 500, seen));
    }

    #[test]
    fn test_clear_moves_every_generation() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.invalidate(&"jana".to_string());
        let seen = cache.generation(&"jana".to_string());

        cache.clear();

        assert!(!cache.insert_if_current("jana".to_string(), 500, seen));
        assert!(cache.is_empty());
    }
}
