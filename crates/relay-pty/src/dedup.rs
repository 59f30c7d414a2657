//! Per-wrapper dedup of `(target, body)` outbound sends (§4.2 edge case 4,
//! §8 property 2).
//!
//! Bounded to the most recent `capacity` entries via an insertion-ordered
//! ring: a `VecDeque` of keys alongside the `HashSet`, evicting oldest-first
//! once the cap is hit (see DESIGN.md's "dedup set eviction" decision — an
//! unbounded set would leak over a long-running wrapper's lifetime).
use std::collections::{HashSet, VecDeque};

pub struct DedupSet {
    seen: HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
    capacity: usize,
}

impl DedupSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Records `(target, body)` and returns `true` if it had already been
    /// seen (the caller should drop the send), `false` if this is the
    /// first occurrence (the caller should proceed).
    pub fn check_and_insert(&mut self, target: &str, body: &str) -> bool {
        let key = (target.to_string(), body.to_string());
        if self.seen.contains(&key) {
            return true;
        }
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_identical_send_is_flagged() {
        let mut set = DedupSet::new(10);
        assert!(!set.check_and_insert("Dev", "hi"));
        assert!(set.check_and_insert("Dev", "hi"));
    }

    #[test]
    fn different_target_or_body_is_not_a_duplicate() {
        let mut set = DedupSet::new(10);
        assert!(!set.check_and_insert("Dev", "hi"));
        assert!(!set.check_and_insert("QA", "hi"));
        assert!(!set.check_and_insert("Dev", "bye"));
    }

    #[test]
    fn capacity_evicts_oldest_entry() {
        let mut set = DedupSet::new(2);
        set.check_and_insert("A", "1");
        set.check_and_insert("B", "2");
        set.check_and_insert("C", "3"); // evicts ("A", "1")
        assert_eq!(set.len(), 2);
        // "A","1" was evicted, so it's no longer considered a duplicate.
        assert!(!set.check_and_insert("A", "1"));
    }
}
