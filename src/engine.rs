//! The cache engine.
//!
//! [`CacheEngine`] owns the resident object set and the run counters, and
//! sequences every request through lookup, then either the hit path or the
//! miss path (evict until the object fits, then insert). Policies are driven
//! through [`EvictionPolicy`] callbacks with a fresh [`CacheSnapshot`] each
//! time; they never touch membership.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{Result, SimError};
use crate::stats::CacheStats;
use crate::{CacheObject, CacheSnapshot, EvictionPolicy, ObjectKey};

/// Outcome of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The object was resident
    Hit,
    /// The object missed and was inserted after `evictions` victims left
    Inserted { evictions: usize },
    /// The object missed and is larger than the whole cache
    Bypassed,
}

impl Access {
    pub fn is_hit(&self) -> bool {
        matches!(self, Access::Hit)
    }
}

/// Fixed-capacity cache driven by an eviction policy
#[derive(Debug)]
pub struct CacheEngine<P: EvictionPolicy> {
    policy: P,
    objects: BTreeMap<ObjectKey, CacheObject>,
    capacity: u64,
    occupied: u64,
    stats: CacheStats,
}

impl<P: EvictionPolicy> CacheEngine<P> {
    /// Create an empty cache of `capacity` (objects, or bytes in size-aware mode)
    pub fn new(policy: P, capacity: u64) -> Result<Self> {
        if capacity == 0 {
            return Err(SimError::ZeroCapacity);
        }
        Ok(Self {
            policy,
            objects: BTreeMap::new(),
            capacity,
            occupied: 0,
            stats: CacheStats::default(),
        })
    }

    /// Process one request.
    ///
    /// A policy that names no victim, or a non-resident one, aborts the run
    /// with a contract error; the engine never substitutes its own choice.
    pub fn process(&mut self, obj: CacheObject) -> Result<Access> {
        self.stats.record_request(obj.size);

        if let Some(&resident) = self.objects.get(&obj.key) {
            self.stats.record_hit();
            let snapshot = CacheSnapshot::new(&self.objects, &self.stats, self.capacity, self.occupied);
            self.policy.update_after_hit(&snapshot, &resident);
            return Ok(Access::Hit);
        }

        self.stats.record_miss(obj.size);
        if obj.size > self.capacity {
            self.stats.bypasses += 1;
            trace!(key = obj.key, size = obj.size, "object larger than cache, not admitted");
            return Ok(Access::Bypassed);
        }

        let mut evictions = 0;
        while self.occupied + obj.size > self.capacity {
            self.evict_one(&obj)?;
            evictions += 1;
        }

        self.objects.insert(obj.key, obj);
        self.occupied += obj.size;
        self.stats.insertions += 1;
        let snapshot = CacheSnapshot::new(&self.objects, &self.stats, self.capacity, self.occupied);
        self.policy.update_after_insert(&snapshot, &obj);

        Ok(Access::Inserted { evictions })
    }

    /// Process every request of `requests` in order, stopping at the first error
    pub fn replay<I>(&mut self, requests: I) -> Result<()>
    where
        I: IntoIterator<Item = CacheObject>,
    {
        for obj in requests {
            self.process(obj)?;
        }
        Ok(())
    }

    fn evict_one(&mut self, incoming: &CacheObject) -> Result<()> {
        let snapshot = CacheSnapshot::new(&self.objects, &self.stats, self.capacity, self.occupied);
        let victim = self.policy.evict(&snapshot, incoming).ok_or_else(|| SimError::NoVictim {
            policy: self.policy.name().to_string(),
            resident: self.objects.len(),
        })?;

        let evicted = self.objects.remove(&victim).ok_or_else(|| SimError::InvalidVictim {
            policy: self.policy.name().to_string(),
            key: victim,
        })?;
        self.occupied -= evicted.size;
        self.stats.evictions += 1;
        trace!(victim, incoming = incoming.key, "evicted");

        let snapshot = CacheSnapshot::new(&self.objects, &self.stats, self.capacity, self.occupied);
        self.policy.update_after_evict(&snapshot, incoming, &evicted);
        Ok(())
    }

    /// Read-only view of the current cache state
    pub fn snapshot(&self) -> CacheSnapshot<'_> {
        CacheSnapshot::new(&self.objects, &self.stats, self.capacity, self.occupied)
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
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

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Total size of resident objects
    pub fn occupied_size(&self) -> u64 {
        self.occupied
    }

    /// Tear the cache down and return the final counters
    pub fn finish(self) -> CacheStats {
        self.stats
    }
}
