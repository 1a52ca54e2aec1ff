// ============================
// taskvault-backend/src/cache/expiring.rs
// ============================
//! Keyed store whose entries carry an absolute expiry.
//!
//! Reads never delete. An expired entry stays readable (and is reported as
//! expired) until [`ExpiringStore::sweep`] removes it, either from a test or
//! from the periodic sweeper.
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::periodic::PeriodicTask;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe `key → (value, expiry)` map.
#[derive(Debug)]
pub struct ExpiringStore<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> Default for ExpiringStore<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`, expiring `ttl` from now.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key, entry);
    }

    /// Stored value (if any) and whether it is expired or absent.
    pub fn get(&self, key: &K) -> (Option<V>, bool) {
        let now = Instant::now();
        match self.entries.read().get(key) {
            Some(entry) => (Some(entry.value.clone()), entry.is_expired(now)),
            None => (None, true),
        }
    }

    /// Remove `key`. Absent keys are ignored.
    pub fn clear(&self, key: &K) {
        self.entries.write().remove(key);
    }

    /// Absent and expired keys are indistinguishable here.
    pub fn has_expired(&self, key: &K) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .map_or(true, |entry| entry.is_expired(now))
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Raw presence, expired or not.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Start a sweeper for this store. The task only holds a weak reference,
    /// so it never keeps the store alive.
    pub fn spawn_sweeper(self: &Arc<Self>, name: &'static str, every: Duration) -> PeriodicTask {
        let store: Weak<Self> = Arc::downgrade(self);
        PeriodicTask::spawn(name, every, move || {
            store.upgrade().map_or(0, |store| store.sweep())
        })
    }
}
