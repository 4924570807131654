//! Short-lived denylist of locations a job source failed to path to.
//!
//! A location is unreachable while the current tick is before its
//! expiration. Entries are evicted lazily on lookup. The cache is never
//! persisted; it refills as path searches fail again.

use std::collections::BTreeMap;

use delve_types::IntVector3;

/// Location to expiration tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unreachables {
    ttl: u64,
    entries: BTreeMap<IntVector3, u64>,
}

impl Unreachables {
    /// Default entry lifetime in ticks.
    pub const DEFAULT_TTL: u64 = 25;

    /// Create an empty cache whose entries live `ttl` ticks.
    pub const fn new(ttl: u64) -> Self {
        Self {
            ttl,
            entries: BTreeMap::new(),
        }
    }

    /// Record `p` as unreachable as of tick `now`.
    pub fn add(&mut self, p: IntVector3, now: u64) {
        self.entries.insert(p, now.saturating_add(self.ttl));
    }

    /// Whether `p` is still considered unreachable at tick `now`.
    /// Expired entries are evicted.
    pub fn is_unreachable(&mut self, p: IntVector3, now: u64) -> bool {
        match self.entries.get(&p) {
            Some(&expires) if now < expires => true,
            Some(_) => {
                self.entries.remove(&p);
                false
            }
            None => false,
        }
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for Unreachables {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
