use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Exported modules of the crate
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod policies;
pub mod registry;
pub mod sim;
pub mod stats;
pub mod sweep;
pub mod trace;
pub mod tune;

pub use config::{Capacity, SimConfig};
pub use error::{ErrorKind, ParamError, Result, SimError, TraceError};
pub use sim::{distinct_objects, evaluate, load_requests, resolve_capacity, run, simulate};

/// Dense identifier issued by the [`registry::ObjectRegistry`] for every
/// distinct object of a trace, in first-seen order
pub type ObjectKey = u64;

/// How object sizes count against cache capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeMode {
    /// Every object has size 1; capacity is an object count
    #[default]
    IgnoreObjectSize,
    /// Objects keep their trace size; capacity is a byte budget
    ConsiderObjectSize,
}

/// An object referenced by a trace request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheObject {
    pub key: ObjectKey,
    pub size: u64,
}

impl CacheObject {
    /// Create an object of the given size
    pub fn new(key: ObjectKey, size: u64) -> Self {
        Self { key, size }
    }

    /// Create a unit-size object, as used when object sizes are ignored
    pub fn unit(key: ObjectKey) -> Self {
        Self { key, size: 1 }
    }
}

/// Read-only view of the cache handed to eviction policies.
///
/// Resident objects are kept in key order, so enumerating them is
/// deterministic. The engine builds a fresh snapshot for every callback;
/// policies can read through it but never change membership.
#[derive(Debug, Clone, Copy)]
pub struct CacheSnapshot<'a> {
    objects: &'a BTreeMap<ObjectKey, CacheObject>,
    stats: &'a stats::CacheStats,
    capacity: u64,
    occupied: u64,
}

impl<'a> CacheSnapshot<'a> {
    /// Build a snapshot over a resident set and its running counters
    pub fn new(
        objects: &'a BTreeMap<ObjectKey, CacheObject>,
        stats: &'a stats::CacheStats,
        capacity: u64,
        occupied: u64,
    ) -> Self {
        Self { objects, stats, capacity, occupied }
    }

    /// Resident objects ordered by key
    pub fn objects(&self) -> &'a BTreeMap<ObjectKey, CacheObject> {
        self.objects
    }

    /// Resident keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = ObjectKey> + 'a {
        self.objects.keys().copied()
    }

    pub fn get(&self, key: ObjectKey) -> Option<&'a CacheObject> {
        self.objects.get(&key)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(&key)
    }

    /// Number of resident objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Maximum total size of resident objects
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Total size of resident objects
    pub fn occupied_size(&self) -> u64 {
        self.occupied
    }

    /// Requests processed so far, including the one being handled.
    ///
    /// This is the logical clock; policies use it as their recency source.
    pub fn access_count(&self) -> u64 {
        self.stats.requests
    }

    pub fn hit_count(&self) -> u64 {
        self.stats.hits
    }

    pub fn miss_count(&self) -> u64 {
        self.stats.misses
    }
}

/// Core trait defining eviction policy behavior.
///
/// The cache engine owns membership and counters; a policy only selects
/// victims and keeps its own per-object metadata in sync through the
/// callbacks below. Per object the legal sequence is
/// `insert -> hit* -> evict`, and the engine never calls a hit or evict
/// callback for a key that is not resident.
pub trait EvictionPolicy {
    /// Short policy name used in reports and errors
    fn name(&self) -> &str;

    /// Choose the resident object to evict to make room for `incoming`.
    ///
    /// Only called on a miss with a non-empty cache. The returned key must be
    /// resident; `None` or any other key aborts the run. Implementations may
    /// reorganize their private state here but must not forget any key.
    fn evict(&mut self, snapshot: &CacheSnapshot<'_>, incoming: &CacheObject) -> Option<ObjectKey>;

    /// Called once per hit, after the hit has been counted
    fn update_after_hit(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject);

    /// Called once per insertion; `obj` is already resident.
    ///
    /// Must create all metadata for `obj.key`.
    fn update_after_insert(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject);

    /// Called once per eviction, after `evicted` left the cache and before
    /// `incoming` is inserted.
    ///
    /// Must drop all per-object metadata for `evicted.key`.
    fn update_after_evict(
        &mut self,
        snapshot: &CacheSnapshot<'_>,
        incoming: &CacheObject,
        evicted: &CacheObject,
    );

    /// Number of resident objects the policy currently tracks.
    ///
    /// Equals the resident count for a policy that neither leaks nor loses
    /// metadata.
    fn metadata_len(&self) -> usize;

    /// Number of non-resident keys kept as bounded eviction history
    fn ghost_len(&self) -> usize {
        0
    }
}

impl<P: EvictionPolicy + ?Sized> EvictionPolicy for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn evict(&mut self, snapshot: &CacheSnapshot<'_>, incoming: &CacheObject) -> Option<ObjectKey> {
        (**self).evict(snapshot, incoming)
    }

    fn update_after_hit(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        (**self).update_after_hit(snapshot, obj)
    }

    fn update_after_insert(&mut self, snapshot: &CacheSnapshot<'_>, obj: &CacheObject) {
        (**self).update_after_insert(snapshot, obj)
    }

    fn update_after_evict(
        &mut self,
        snapshot: &CacheSnapshot<'_>,
        incoming: &CacheObject,
        evicted: &CacheObject,
    ) {
        (**self).update_after_evict(snapshot, incoming, evicted)
    }

    fn metadata_len(&self) -> usize {
        (**self).metadata_len()
    }

    fn ghost_len(&self) -> usize {
        (**self).ghost_len()
    }
}

/// Boxed policy as produced by the policy factory
pub type BoxedPolicy = Box<dyn EvictionPolicy + Send>;

// Convenient re-exports for common types and modules
pub mod prelude {
    pub use super::{BoxedPolicy, CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey, SizeMode};
    pub use super::config::Capacity;
    pub use super::engine::{Access, CacheEngine};
    pub use super::error::{Result, SimError};
    pub use super::params::{ParamSet, ParamSpace, ParamSpec, ParamValue};
    pub use super::policies::{create_policy, PolicyType, ScoredPolicy};
    pub use super::stats::{CacheStats, SimReport};
    pub use super::trace::TraceFormat;
}
