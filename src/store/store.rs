//! Expiring Store Module
//!
//! Thread-safe key-value container with absolute/sliding TTL and jitter.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::trace;

use crate::store::entry::{CacheEntry, ExpirationPolicy};
use crate::store::stats::{CacheStats, Counters};

// == Expiring Store ==
/// Generic TTL store shared by every cache.
///
/// Expired entries are invisible to reads immediately; they are physically
/// removed on the next read of the same key or by [`sweep_expired`](Self::sweep_expired).
#[derive(Debug)]
pub struct ExpiringStore<K, V> {
    /// Name used in logs and diagnostics
    name: String,
    /// Key-value storage
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    /// Expiry applied to every new entry
    policy: ExpirationPolicy,
    /// Activity counters
    counters: Counters,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty store.
    pub fn new(name: impl Into<String>, policy: ExpirationPolicy) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            policy,
            counters: Counters::default(),
        }
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the expiration policy applied on insert.
    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    // == Insert ==
    /// Inserts or overwrites a value; the entry's expiry starts over.
    pub fn insert(&self, key: K, value: V) {
        let entry = CacheEntry::new(value, &self.policy);
        self.entries.write().insert(key, entry);
        self.counters.record_insert();
    }

    // == Add ==
    /// Inserts when both key and value are present, otherwise does nothing.
    ///
    /// Returns true if something was stored.
    pub fn add(&self, key: Option<K>, value: Option<V>) -> bool {
        match (key, value) {
            (Some(key), Some(value)) => {
                self.insert(key, value);
                true
            }
            _ => {
                trace!(store = %self.name, "ignoring add without key or value");
                false
            }
        }
    }

    // == Get ==
    /// Retrieves a live value, prolonging sliding expiry.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = self.entries.write();
        let expired = match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                entry.touch();
                let value = entry.value.clone();
                self.counters.record_hit();
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            self.counters.record_expirations(1);
        }
        self.counters.record_miss();
        None
    }

    // == Update ==
    /// Mutates a live value in place and restarts its expiry, as a fresh
    /// insert would.
    ///
    /// Returns false if the key is absent or expired.
    pub fn update<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V),
    {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired() => {
                f(&mut entry.value);
                entry.rearm(&self.policy);
                true
            }
            _ => false,
        }
    }

    // == Remove ==
    /// Removes an entry, returning its value if it was live.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.write().remove(key)?;
        self.counters.record_removal();
        (!removed.is_expired()).then_some(removed.value)
    }

    // == Contains ==
    /// Returns true if a live entry exists. Does not prolong sliding expiry.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .read()
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    // == Count ==
    /// Returns the number of live entries.
    pub fn count(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    // == Size ==
    /// Approximate memory footprint in bytes of the stored entries.
    ///
    /// Best effort: returns 0 instead of waiting when a writer holds the lock.
    pub fn size(&self) -> usize {
        let Some(entries) = self.entries.try_read() else {
            return 0;
        };
        let now = Instant::now();
        let live = entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count();
        live * (mem::size_of::<K>() + mem::size_of::<CacheEntry<V>>())
    }

    // == Keys ==
    /// Returns the keys of all live entries.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Values ==
    /// Returns the values of all live entries without prolonging them.
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    // == Sweep Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - entries.len();
        drop(entries);

        self.counters.record_expirations(removed);
        removed
    }

    // == Clear ==
    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.count())
    }

    // == Is Empty ==
    /// Returns true if no live entry exists.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
