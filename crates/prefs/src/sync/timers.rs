//! Keyed cancelable timers
//!
//! A timer is a deadline plus a payload, stored under a scope key. Scheduling
//! a key that already has a timer replaces it, which is what makes repeated
//! calls coalesce into a single firing after the last one. Timers never fire
//! on their own: the owner asks for the due ones with [`Timers::take_due`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Collection of pending timers keyed by scope
#[derive(Debug, Clone)]
pub struct Timers<K: Ord, P = ()> {
    pending: BTreeMap<K, (DateTime<Utc>, P)>,
}

impl<K: Ord + Clone, P> Timers<K, P> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    /// Schedule `key` to fire at `deadline`, replacing any pending timer for
    /// the same key
    pub fn schedule(&mut self, key: K, deadline: DateTime<Utc>, payload: P) {
        self.pending.insert(key, (deadline, payload));
    }

    /// Cancel the timer for `key`, returning its payload if one was pending
    pub fn cancel(&mut self, key: &K) -> Option<P> {
        self.pending.remove(key).map(|(_, payload)| payload)
    }

    /// Cancel every pending timer, returning how many were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Check if a timer is pending for `key`
    pub fn is_scheduled(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Deadline of the timer for `key`
    pub fn deadline(&self, key: &K) -> Option<DateTime<Utc>> {
        self.pending.get(key).map(|(deadline, _)| *deadline)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|(deadline, _)| *deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<(K, P)> {
        let due_keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        let mut due: Vec<(DateTime<Utc>, K, P)> = due_keys
            .into_iter()
            .filter_map(|key| {
                self.pending
                    .remove(&key)
                    .map(|(deadline, payload)| (deadline, key, payload))
            })
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        due.into_iter().map(|(_, key, payload)| (key, payload)).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K: Ord + Clone, P> Default for Timers<K, P> {
    fn default() -> Self {
        Self::new()
    }
}
