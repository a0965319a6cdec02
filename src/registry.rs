//! Object registry.
//!
//! Maps the identifiers found in a trace onto dense [`ObjectKey`]s, issued
//! in first-seen order so that key order, and with it every policy's
//! tie-breaking, is a pure function of the trace.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::TraceError;
use crate::{CacheObject, ObjectKey, SizeMode};

/// Bookkeeping for one distinct object of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Most recently observed size, after normalization
    pub size: u64,
    /// Request index of the first reference
    pub first_seen: u64,
    /// Request index of the latest reference
    pub last_seen: u64,
    /// Number of references so far
    pub references: u64,
}

/// Registry of the objects referenced by a trace
#[derive(Debug)]
pub struct ObjectRegistry<K> {
    ids: HashMap<K, ObjectKey>,
    entries: Vec<ObjectEntry>,
    mode: SizeMode,
}

impl<K: Hash + Eq> ObjectRegistry<K> {
    pub fn new(mode: SizeMode) -> Self {
        Self { ids: HashMap::new(), entries: Vec::new(), mode }
    }

    /// Record a reference to `id` at request `index` and return the object to
    /// hand to the cache engine.
    ///
    /// In size-aware mode a zero size is rejected; otherwise every size is
    /// normalized to 1.
    pub fn observe(&mut self, id: K, size: u64, index: u64) -> Result<CacheObject, TraceError> {
        let size = match self.mode {
            SizeMode::IgnoreObjectSize => 1,
            SizeMode::ConsiderObjectSize if size == 0 => return Err(TraceError::ZeroSize { index }),
            SizeMode::ConsiderObjectSize => size,
        };

        let next = self.entries.len() as ObjectKey;
        let key = *self.ids.entry(id).or_insert(next);
        if key == next {
            self.entries.push(ObjectEntry { size, first_seen: index, last_seen: index, references: 1 });
        } else {
            let entry = &mut self.entries[key as usize];
            entry.size = size;
            entry.last_seen = index;
            entry.references += 1;
        }
        Ok(CacheObject::new(key, size))
    }

    /// Key already issued for `id`, if any
    pub fn key_of(&self, id: &K) -> Option<ObjectKey> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, key: ObjectKey) -> Option<&ObjectEntry> {
        self.entries.get(key as usize)
    }

    /// Number of distinct objects seen
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_mode(&self) -> SizeMode {
        self.mode
    }
}
