//! Shared mutex-guarded dedup sets used across the pipeline.
//!
//! All three sets (name dedup at the name source, subdomain registration at
//! the root task, and the `subdomain+server` XFR filter at the subdomain
//! task) share the same shape: insert-if-absent returning a boolean, with a
//! short critical section under a single mutex. `MultiplicityCounter`
//! additionally backs the subdomain task's compare-and-swap "first
//! occurrence" detection, implemented here as an atomic counter map rather
//! than literal CAS-from-zero, since Rust's `HashMap` doesn't expose atomics
//! per entry.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

/// A mutex-guarded, insert-if-absent string set.
#[derive(Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `key` was newly inserted (i.e. not seen before).
    pub async fn insert_if_absent(&self, key: &str) -> bool {
        let mut guard = self.seen.lock().await;
        guard.insert(key.to_ascii_lowercase())
    }

    pub async fn contains(&self, key: &str) -> bool {
        let guard = self.seen.lock().await;
        guard.contains(&key.to_ascii_lowercase())
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }
}

/// Multiplicity counter keyed by subdomain, used by the subdomain task to
/// detect the first occurrence of a new subdomain.
#[derive(Default)]
pub struct MultiplicityCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl MultiplicityCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for `key` and returns `true` iff this was the
    /// first-ever increment (the 0 -> 1 transition).
    pub async fn bump_and_check_first(&self, key: &str) -> bool {
        let mut guard = self.counts.lock().await;
        let entry = guard.entry(key.to_ascii_lowercase()).or_insert(0);
        *entry += 1;
        *entry == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dedup_set_admits_each_name_once() {
        let set = DedupSet::new();
        assert!(set.insert_if_absent("WWW.Example.com").await);
        assert!(!set.insert_if_absent("www.example.com").await);
        assert_eq!(set.len().await, 1);
    }

    #[tokio::test]
    async fn multiplicity_counter_fires_once_per_key() {
        let counter = MultiplicityCounter::new();
        assert!(counter.bump_and_check_first("api.example.com").await);
        assert!(!counter.bump_and_check_first("api.example.com").await);
        assert!(!counter.bump_and_check_first("api.example.com").await);
    }
}
