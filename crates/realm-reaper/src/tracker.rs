//! Last-seen bookkeeping.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Records when each key was last active.
///
/// Time is always passed in by the caller, never read from the system,
/// so the tracker is trivially testable and follows whatever clock its
/// owner uses.
#[derive(Debug, Clone)]
pub struct ActivityTracker<K> {
    last_seen: HashMap<K, Instant>,
}

impl<K: Copy + Eq + Hash + Ord> ActivityTracker<K> {
    pub fn new() -> Self {
        Self {
            last_seen: HashMap::new(),
        }
    }

    /// Records activity for `key` at `now`, creating the entry if needed.
    pub fn touch(&mut self, key: K, now: Instant) {
        self.last_seen.insert(key, now);
    }

    /// Refreshes `key` only if it is already tracked.
    ///
    /// Returns `false` for unknown keys: activity from a connection that
    /// has already been torn down must not resurrect its entry.
    pub fn refresh(&mut self, key: K, now: Instant) -> bool {
        match self.last_seen.get_mut(&key) {
            Some(seen) => {
                *seen = now;
                true
            }
            None => false,
        }
    }

    /// Stops tracking `key`. Returns its last-seen instant, if any.
    pub fn remove(&mut self, key: K) -> Option<Instant> {
        self.last_seen.remove(&key)
    }

    pub fn last_seen(&self, key: K) -> Option<Instant> {
        self.last_seen.get(&key).copied()
    }

    /// Keys whose last activity is strictly more than `threshold` before
    /// `now`, in ascending key order.
    pub fn idle(&self, now: Instant, threshold: Duration) -> Vec<K> {
        let mut idle: Vec<K> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > threshold)
            .map(|(key, _)| *key)
            .collect();
        idle.sort_unstable();
        idle
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.last_seen.clear();
    }

    pub fn contains(&self, key: K) -> bool {
        self.last_seen.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

impl<K: Copy + Eq + Hash + Ord> Default for ActivityTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
