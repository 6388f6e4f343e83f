// src/exec/cache.rs

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::fingerprint::Fingerprint;
use crate::task::UnitId;

/// Identifies one execution: which unit ran, on which input, under which run
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub unit: UnitId,
    pub input: Fingerprint,
    pub run_config: Fingerprint,
}

/// Output of one execution and how long it took.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub output: V,
    pub elapsed: Duration,
}

/// Hit/miss counters for one executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// In-memory result cache keyed by [`CacheKey`].
///
/// Entries are written once and never updated. A cache can be taken out of
/// one executor and handed to another to skip work across runs.
#[derive(Debug, Clone)]
pub struct Cache<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
}

impl<V> Cache<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Store an entry unless the key is already present.
    ///
    /// Returns `false` if an entry existed; the existing entry is kept.
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry<V>) -> bool {
        if self.entries.contains_key(&key) {
            debug!(unit = %key.unit, input = ?key.input, "cache entry already present; keeping it");
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        debug!(dropped, "cleared execution cache");
    }
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self::new()
    }
}
