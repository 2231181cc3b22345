//! Resource Store
//!
//! Fixed-capacity key/value store with a pluggable eviction policy. Entry
//! timestamps come from a per-store logical clock, so two accesses never tie.

pub mod eviction;

use crate::error::SyscallError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use tracing::{debug, error};

pub use eviction::{EvictionKind, EvictionPolicy, Fifo, Lru};

/// Stored value plus its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    /// Logical time of the last read or write
    pub timestamp: u64,
    /// Logical time the key was first inserted
    pub inserted: u64,
}

struct StoreInner<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    clock: u64,
    evictions: u64,
}

impl<K, V> StoreInner<K, V> {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Capacity-bounded store guarded by a single mutex
pub struct ResourceStore<K, V> {
    capacity: usize,
    policy: Box<dyn EvictionPolicy<K, V>>,
    inner: Mutex<StoreInner<K, V>>,
}

impl<K, V> ResourceStore<K, V>
where
    K: Eq + Hash + Clone + Display + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new(capacity: usize, policy: Box<dyn EvictionPolicy<K, V>>) -> Self {
        Self {
            capacity,
            policy,
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                clock: 0,
                evictions: 0,
            }),
        }
    }

    /// Insert or replace `key`.
    ///
    /// Inserting a new key into a full store evicts exactly one entry, which
    /// is returned.
    pub fn write(&self, key: K, value: V) -> Result<Option<K>, SyscallError> {
        let mut inner = self.inner.lock();
        let now = inner.tick();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.timestamp = now;
            return Ok(None);
        }

        let mut evicted = None;
        if inner.entries.len() >= self.capacity {
            if let Some(victim) = self.policy.select_victim(&inner.entries) {
                inner.entries.remove(&victim);
                inner.evictions += 1;
                debug!(
                    key = %victim,
                    policy = self.policy.name(),
                    "Evicted store entry"
                );
                evicted = Some(victim);
            }
            if inner.entries.len() >= self.capacity {
                error!(
                    len = inner.entries.len(),
                    capacity = self.capacity,
                    "Store still full after eviction"
                );
                return Err(SyscallError::InvariantViolation(format!(
                    "store holds {} entries at capacity {} after eviction",
                    inner.entries.len(),
                    self.capacity
                )));
            }
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                timestamp: now,
                inserted: now,
            },
        );
        Ok(evicted)
    }

    /// Read `key`, refreshing its access timestamp.
    pub fn read(&self, key: &K) -> Result<V, SyscallError> {
        let mut inner = self.inner.lock();
        let now = inner.tick();
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.timestamp = now;
                Ok(entry.value.clone())
            }
            None => Err(SyscallError::KeyNotFound(key.to_string())),
        }
    }

    /// Replace the value of `key`, writing it if absent.
    pub fn update(&self, key: K, value: V) -> Result<Option<K>, SyscallError> {
        self.write(key, value)
    }

    /// Remove `key`, returning its value.
    pub fn delete(&self, key: &K) -> Result<V, SyscallError> {
        self.inner
            .lock()
            .entries
            .remove(key)
            .map(|entry| entry.value)
            .ok_or_else(|| SyscallError::KeyNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries dropped by the eviction policy
    pub fn evictions(&self) -> u64 {
        self.inner.lock().evictions
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Keys currently present, in no particular order
    pub fn keys(&self) -> Vec<K> {
        self.inner.lock().entries.keys().cloned().collect()
    }
}
