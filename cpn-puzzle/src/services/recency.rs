//! Recently served puzzle identifiers
//!
//! One bounded window per tier plus one for requests without a tier. Each
//! window has its own lock, so traffic on one tier never waits on another.

use cpn_common::Difficulty;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default number of identifiers remembered per tier
pub const DEFAULT_WINDOW: usize = 30;

/// Bounded, insertion-ordered set of identifiers
#[derive(Debug)]
pub struct RecentSet {
    capacity: usize,
    ids: Mutex<VecDeque<String>>,
}

impl RecentSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ids: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        // The deque is always left consistent, so a poisoned lock is still usable
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().iter().any(|seen| seen == id)
    }

    /// Record `id` as the newest entry, evicting the oldest beyond capacity.
    ///
    /// An id already present moves to the newest position instead of being
    /// stored twice.
    pub fn insert(&self, id: &str) {
        let mut ids = self.lock();
        Self::push_newest(&mut ids, id, self.capacity);
    }

    /// Insert `id` only if absent; returns true when it was inserted
    pub fn insert_if_absent(&self, id: &str) -> bool {
        let mut ids = self.lock();
        if ids.iter().any(|seen| seen == id) {
            return false;
        }
        Self::push_newest(&mut ids, id, self.capacity);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn push_newest(ids: &mut VecDeque<String>, id: &str, capacity: usize) {
        if let Some(pos) = ids.iter().position(|seen| seen == id) {
            ids.remove(pos);
        }
        ids.push_back(id.to_string());
        while ids.len() > capacity {
            ids.pop_front();
        }
    }
}

/// Per-tier recency windows
#[derive(Debug)]
pub struct RecencyTracker {
    window: usize,
    tiers: [RecentSet; 4],
}

impl RecencyTracker {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            tiers: std::array::from_fn(|_| RecentSet::new(window)),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn slot(&self, tier: Option<Difficulty>) -> &RecentSet {
        // Index 3 holds requests that named no tier
        &self.tiers[tier.map_or(3, Difficulty::index)]
    }

    pub fn seen(&self, tier: Option<Difficulty>, id: &str) -> bool {
        self.slot(tier).contains(id)
    }

    pub fn remember(&self, tier: Option<Difficulty>, id: &str) {
        self.slot(tier).insert(id);
    }

    /// Atomic `!seen` + `remember`; true when `id` was fresh
    pub fn remember_if_unseen(&self, tier: Option<Difficulty>, id: &str) -> bool {
        self.slot(tier).insert_if_absent(id)
    }

    /// Number of ids currently remembered for `tier`
    pub fn len(&self, tier: Option<Difficulty>) -> usize {
        self.slot(tier).len()
    }
}

impl Default for RecencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_zero_window_holds_one_id() {
        let tracker = RecencyTracker::new(0);
        assert_eq!(tracker.window(), 1);
        tracker.remember(None, "aaaaa");
        tracker.remember(None, "bbbbb");
        assert_eq!(tracker.len(None), 1);
        assert!(tracker.seen(None, "bbbbb"));
    }

    #[test]
    fn test_remembered_id_is_seen() {
        let tracker = RecencyTracker::default();
        assert!(!tracker.seen(Some(Difficulty::Easy), "abc12"));
        tracker.remember(Some(Difficulty::Easy), "abc12");
        assert!(tracker.seen(Some(Difficulty::Easy), "abc12"));
    }

    #[test]
    fn test_tiers_are_independent() {
        let tracker = RecencyTracker::default();
        tracker.remember(Some(Difficulty::Hard), "abc12");
        assert!(!tracker.seen(Some(Difficulty::Easy), "abc12"));
        assert!(!tracker.seen(None, "abc12"));
    }

    #[test]
    fn test_oldest_evicted_past_window() {
        let tracker = RecencyTracker::new(30);
        for i in 0..31 {
            tracker.remember(Some(Difficulty::Medium), &format!("id{:03}", i));
        }
        assert!(!tracker.seen(Some(Difficulty::Medium), "id000"));
        assert!(tracker.seen(Some(Difficulty::Medium), "id001"));
        assert!(tracker.seen(Some(Difficulty::Medium), "id030"));
        assert_eq!(tracker.len(Some(Difficulty::Medium)), 30);
    }

    #[test]
    fn test_repeat_refreshes_instead_of_duplicating() {
        let set = RecentSet::new(3);
        set.insert("a");
        set.insert("b");
        set.insert("a");
        set.insert("c");
        set.insert("d");
        // "b" was the oldest after "a" was refreshed
        assert!(!set.contains("b"));
        assert!(set.contains("a"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_remember_if_unseen() {
        let tracker = RecencyTracker::default();
        assert!(tracker.remember_if_unseen(None, "x1y2z"));
        assert!(!tracker.remember_if_unseen(None, "x1y2z"));
        assert_eq!(tracker.len(None), 1);
    }

    #[test]
    fn test_concurrent_inserts_keep_bound() {
        let tracker = Arc::new(RecencyTracker::new(30));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("t{}-{}", t, i);
                        tracker.remember(Some(Difficulty::Easy), &id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.len(Some(Difficulty::Easy)), 30);
    }
}
