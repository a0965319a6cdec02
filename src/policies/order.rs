//! Key containers shared by the policy implementations.
//!
//! Both containers give deterministic iteration and selection that depends
//! only on the order of operations, never on hash iteration order.

use std::collections::{BTreeMap, HashMap};

use crate::ObjectKey;

/// Queue of distinct keys with O(log n) removal from any position.
///
/// The front is the oldest entry; `push_back` and `move_to_back` make a key
/// the newest.
#[derive(Debug, Clone, Default)]
pub struct OrderedKeys {
    by_seq: BTreeMap<u64, ObjectKey>,
    seq_of: HashMap<ObjectKey, u64>,
    next_seq: u64,
}

impl OrderedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key` as the newest entry; returns false if already queued
    pub fn push_back(&mut self, key: ObjectKey) -> bool {
        if self.seq_of.contains_key(&key) {
            return false;
        }
        self.append(key);
        true
    }

    /// Make a queued key the newest entry; returns false if not queued
    pub fn move_to_back(&mut self, key: ObjectKey) -> bool {
        match self.seq_of.remove(&key) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                self.append(key);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: ObjectKey) -> bool {
        match self.seq_of.remove(&key) {
            Some(seq) => {
                self.by_seq.remove(&seq);
                true
            }
            None => false,
        }
    }

    pub fn pop_front(&mut self) -> Option<ObjectKey> {
        let (_, key) = self.by_seq.pop_first()?;
        self.seq_of.remove(&key);
        Some(key)
    }

    /// Oldest key
    pub fn front(&self) -> Option<ObjectKey> {
        self.by_seq.first_key_value().map(|(_, &key)| key)
    }

    /// Newest key
    pub fn back(&self) -> Option<ObjectKey> {
        self.by_seq.last_key_value().map(|(_, &key)| key)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.seq_of.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.seq_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq_of.is_empty()
    }

    /// Keys from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.by_seq.values().copied()
    }

    fn append(&mut self, key: ObjectKey) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(seq, key);
        self.seq_of.insert(key, seq);
    }
}

/// Set of keys addressable by position, for uniform random sampling
#[derive(Debug, Clone, Default)]
pub struct IndexedKeys {
    keys: Vec<ObjectKey>,
    slots: HashMap<ObjectKey, usize>,
}

impl IndexedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ObjectKey) -> bool {
        if self.slots.contains_key(&key) {
            return false;
        }
        self.slots.insert(key, self.keys.len());
        self.keys.push(key);
        true
    }

    /// Remove `key`; the last key takes over its slot
    pub fn remove(&mut self, key: ObjectKey) -> bool {
        let Some(slot) = self.slots.remove(&key) else {
            return false;
        };
        self.keys.swap_remove(slot);
        if let Some(&moved) = self.keys.get(slot) {
            self.slots.insert(moved, slot);
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<ObjectKey> {
        self.keys.get(index).copied()
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.slots.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Bounded FIFO history of evicted keys and their sizes.
///
/// Pushing past `capacity` bytes forgets the oldest entries first.
#[derive(Debug, Clone, Default)]
pub struct GhostQueue {
    order: OrderedKeys,
    sizes: HashMap<ObjectKey, u64>,
    size: u64,
    capacity: u64,
}

impl GhostQueue {
    pub fn new(capacity: u64) -> Self {
        Self { capacity, ..Self::default() }
    }

    /// Remember `key`, refreshing its position if already present
    pub fn push(&mut self, key: ObjectKey, size: u64) {
        self.remove(key);
        self.order.push_back(key);
        self.sizes.insert(key, size);
        self.size += size;
        while self.size > self.capacity {
            let Some(oldest) = self.order.front() else {
                break;
            };
            self.remove(oldest);
        }
    }

    /// Forget `key`; returns whether it was remembered
    pub fn remove(&mut self, key: ObjectKey) -> bool {
        match self.sizes.remove(&key) {
            Some(size) => {
                self.order.remove(key);
                self.size -= size;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.sizes.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total size of remembered objects
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_keys_queue_operations() {
        let mut q = OrderedKeys::new();
        assert!(q.push_back(1));
        assert!(q.push_back(2));
        assert!(q.push_back(3));
        assert!(!q.push_back(2));
        assert_eq!(q.front(), Some(1));
        assert_eq!(q.back(), Some(3));

        assert!(q.move_to_back(1));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![2, 3, 1]);

        assert!(q.remove(3));
        assert!(!q.remove(3));
        assert_eq!(q.pop_front(), Some(2));
        assert_eq!(q.pop_front(), Some(1));
        assert_eq!(q.pop_front(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_indexed_keys_swap_remove_keeps_slots() {
        let mut set = IndexedKeys::new();
        for key in [10, 20, 30, 40] {
            assert!(set.insert(key));
        }
        assert!(set.remove(20));
        // 40 moved into slot 1
        assert_eq!(set.get(1), Some(40));
        assert!(set.remove(40));
        assert_eq!(set.get(1), Some(30));
        assert_eq!(set.len(), 2);
        assert!(set.contains(10));
        assert!(!set.contains(40));
        assert!(!set.remove(99));
    }

    #[test]
    fn test_ghost_queue_forgets_oldest_past_capacity() {
        let mut ghost = GhostQueue::new(3);
        ghost.push(1, 1);
        ghost.push(2, 1);
        ghost.push(3, 1);
        ghost.push(4, 2);
        assert!(!ghost.contains(1));
        assert!(!ghost.contains(2));
        assert!(ghost.contains(3));
        assert!(ghost.contains(4));
        assert_eq!(ghost.size(), 3);

        assert!(ghost.remove(3));
        assert!(!ghost.remove(3));
        assert_eq!(ghost.len(), 1);
    }

    #[test]
    fn test_oversized_ghost_entry_is_not_kept() {
        let mut ghost = GhostQueue::new(2);
        ghost.push(1, 5);
        assert!(ghost.is_empty());
        assert_eq!(ghost.size(), 0);
    }
}
