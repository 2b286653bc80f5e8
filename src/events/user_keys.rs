//! Deduplication of users reported through index events.
use std::collections::{HashSet, VecDeque};

/// Set of user keys already reported in the current flush window.
///
/// The set is bounded: once `capacity` keys are stored, noticing a new key evicts the oldest
/// one. An evicted user may be reported a second time in the same window, but is never skipped.
#[derive(Debug)]
pub struct UserKeys {
    capacity: usize,
    keys: HashSet<String>,
    insertion_order: VecDeque<String>,
}

impl UserKeys {
    /// Create a set holding up to `capacity` keys. Capacity is at least one.
    pub fn new(capacity: usize) -> UserKeys {
        UserKeys {
            capacity: capacity.max(1),
            keys: HashSet::new(),
            insertion_order: VecDeque::new(),
        }
    }

    /// Record `key` as reported.
    ///
    /// Returns `true` if the key was already reported in this window.
    pub fn notice(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return true;
        }

        if self.keys.len() >= self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.to_owned());
        self.insertion_order.push_back(key.to_owned());
        false
    }

    /// Forget every key. Called at the end of each flush window.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.insertion_order.clear();
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
