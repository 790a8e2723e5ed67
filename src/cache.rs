//! Bounded per-actor cache with time-based expiry.
//!
//! Used for short-lived actor state such as the last chat line (spam filter)
//! and active mutes. Entries go away when they expire, when the cache is over
//! capacity (oldest insert first), or when the host reports a disconnect.

use crate::ActorId;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Expiry used when `now + ttl` does not fit in an `Instant`.
const FOREVER: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Active mutes, keyed by actor, holding the reason shown to the actor.
pub type MuteList = TtlCache<ActorId, String>;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted: Instant,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    capacity: usize,
    ttl: Duration,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        TtlCache { entries: Mutex::new(HashMap::new()), capacity: capacity.max(1), ttl }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert with the default time-to-live, returning the previous live value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.insert_for(key, value, self.ttl)
    }

    /// Insert with an explicit time-to-live, returning the previous live value.
    pub fn insert_for(&self, key: K, value: V, ttl: Duration) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        let previous = entries.remove(&key).filter(|e| e.expires_at > now).map(|e| e.value);
        let expires_at = now.checked_add(ttl).or_else(|| now.checked_add(FOREVER)).unwrap_or(now);
        entries.insert(key, Entry { value, inserted: now, expires_at });
        Self::evict(&mut entries, now, self.capacity);
        previous
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.lock().remove(key).filter(|e| e.expires_at > now).map(|e| e.value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, e| e.expires_at > now);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn evict(entries: &mut HashMap<K, Entry<V>>, now: Instant, capacity: usize) {
        entries.retain(|_, e| e.expires_at > now);
        while entries.len() > capacity {
            let oldest = entries.iter().min_by_key(|(_, e)| e.inserted).map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        TtlCache::new(1024, Duration::from_secs(300))
    }
}
