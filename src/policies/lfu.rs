use std::collections::{BTreeSet, HashMap};

use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};
use super::PolicyType;

/// A Least Frequently Used (LFU) eviction policy
///
/// Evicts the object with the lowest access frequency. When multiple
/// objects share the lowest frequency, the oldest inserted among them is
/// evicted.
#[derive(Debug, Default)]
pub struct LfuPolicy {
    /// Maps key to (frequency, insertion sequence)
    entries: HashMap<ObjectKey, (u64, u64)>,
    /// Ordered by (frequency, insertion sequence) for O(log n) victim lookup
    ranking: BTreeSet<(u64, u64, ObjectKey)>,
    next_seq: u64,
}

impl LfuPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access frequency of a resident key
    pub fn frequency(&self, key: ObjectKey) -> Option<u64> {
        self.entries.get(&key).map(|&(freq, _)| freq)
    }
}

impl EvictionPolicy for LfuPolicy {
    fn name(&self) -> &str {
        PolicyType::Lfu.name()
    }

    fn evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject) -> Option<ObjectKey> {
        self.ranking.first().map(|&(_, _, key)| key)
    }

    fn update_after_hit(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        if let Some((freq, seq)) = self.entries.get_mut(&obj.key) {
            self.ranking.remove(&(*freq, *seq, obj.key));
            *freq += 1;
            self.ranking.insert((*freq, *seq, obj.key));
        }
    }

    fn update_after_insert(&mut self, _snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(obj.key, (1, seq));
        self.ranking.insert((1, seq, obj.key));
    }

    fn update_after_evict(&mut self, _snapshot: &CacheSnapshot<'_>, _incoming: &CacheObject, evicted: &CacheObject) {
        if let Some((freq, seq)) = self.entries.remove(&evicted.key) {
            self.ranking.remove(&(freq, seq, evicted.key));
        }
    }

    fn metadata_len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::test_util::{drive, resident};

    #[test]
    fn test_lfu_evicts_least_frequent() {
        let engine = drive(LfuPolicy::new(), 3, &[1, 1, 2, 2, 3, 4]);
        assert_eq!(resident(&engine), vec![1, 2, 4]);
        assert_eq!(engine.policy().frequency(1), Some(2));
    }

    #[test]
    fn test_lfu_ties_evict_oldest_insert() {
        let engine = drive(LfuPolicy::new(), 2, &[5, 6, 7]);
        assert_eq!(resident(&engine), vec![6, 7]);
    }

    #[test]
    fn test_lfu_frequency_resets_after_eviction() {
        let engine = drive(LfuPolicy::new(), 1, &[1, 1, 1, 2, 1]);
        assert_eq!(engine.policy().frequency(1), Some(1));
        assert_eq!(engine.policy().frequency(2), None);
        assert_eq!(engine.policy().metadata_len(), 1);
    }
}
