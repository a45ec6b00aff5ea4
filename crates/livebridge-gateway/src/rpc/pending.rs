//! Deadline-tracked table of in-flight requests keyed by correlation id.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Entry<V> {
    // Callbacks are `Send` but rarely `Sync`; the mutex keeps the table `Sync`.
    value: Mutex<V>,
    created: Instant,
    deadline: Instant,
}

impl<V> Entry<V> {
    fn into_value(self) -> V {
        self.value.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Correlation-id keyed table with per-entry deadlines.
///
/// Values are taken out of the table before anything user-supplied runs, so
/// callbacks never execute under a shard guard.
pub struct PendingTable<V> {
    entries: DashMap<String, Entry<V>>,
}

impl<V> Default for PendingTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PendingTable<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, id: String, value: V, timeout: Duration) {
        let now = Instant::now();
        self.entries.insert(
            id,
            Entry {
                value: Mutex::new(value),
                created: now,
                deadline: now + timeout,
            },
        );
    }

    /// Remove and return the entry for `id`.
    pub fn take(&self, id: &str) -> Option<V> {
        self.entries.remove(id).map(|(_, e)| e.into_value())
    }

    /// Run `f` on the entry under its shard guard. `f` must not block or call
    /// back into the table.
    pub fn with_entry<R>(&self, id: &str, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.entries.get(id).map(|e| {
            let mut v = e.value.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *v)
        })
    }

    /// Push the deadline of `id` out to `now + timeout`.
    pub fn touch(&self, id: &str, timeout: Duration) -> bool {
        match self.entries.get_mut(id) {
            Some(mut e) => {
                e.deadline = Instant::now() + timeout;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Age of an entry, if present.
    pub fn age(&self, id: &str) -> Option<Duration> {
        self.entries.get(id).map(|e| e.created.elapsed())
    }

    /// Remove every entry whose deadline is at or before `now`, oldest first.
    pub fn drain_expired(&self, now: Instant) -> Vec<(String, V)> {
        let mut keys: Vec<(Instant, String)> = self
            .entries
            .iter()
            .filter(|e| e.value().deadline <= now)
            .map(|e| (e.value().created, e.key().clone()))
            .collect();
        keys.sort();

        keys.into_iter()
            .filter_map(|(_, k)| {
                // Re-check: the entry may have been touched or answered meanwhile.
                self.entries
                    .remove_if(&k, |_, e| e.deadline <= now)
                    .map(|(k, e)| (k, e.into_value()))
            })
            .collect()
    }

    /// Remove everything.
    pub fn drain_all(&self) -> Vec<(String, V)> {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|(k, e)| (k, e.into_value())))
            .collect()
    }
}
