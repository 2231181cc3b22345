//! Eviction policies for the resource store.

use super::CacheEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Strategy choosing which entry to drop when the store is full
///
/// The choice must be a deterministic function of entry timestamps or
/// insertion order.
pub trait EvictionPolicy<K, V>: Send + Sync {
    fn name(&self) -> &'static str;

    fn select_victim(&self, entries: &HashMap<K, CacheEntry<V>>) -> Option<K>;
}

/// Least recently used: smallest access timestamp
#[derive(Debug, Clone, Copy, Default)]
pub struct Lru;

impl<K, V> EvictionPolicy<K, V> for Lru
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn name(&self) -> &'static str {
        "lru"
    }

    fn select_victim(&self, entries: &HashMap<K, CacheEntry<V>>) -> Option<K> {
        entries
            .iter()
            .min_by_key(|(_, entry)| entry.timestamp)
            .map(|(key, _)| key.clone())
    }
}

/// First in, first out: earliest insertion, ignoring access
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl<K, V> EvictionPolicy<K, V> for Fifo
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn select_victim(&self, entries: &HashMap<K, CacheEntry<V>>) -> Option<K> {
        entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted)
            .map(|(key, _)| key.clone())
    }
}

/// Configurable policy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionKind {
    #[default]
    Lru,
    Fifo,
}

impl EvictionKind {
    pub fn policy<K, V>(&self) -> Box<dyn EvictionPolicy<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        match self {
            EvictionKind::Lru => Box::new(Lru),
            EvictionKind::Fifo => Box::new(Fifo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: u64, inserted: u64) -> CacheEntry<()> {
        CacheEntry {
            value: (),
            timestamp,
            inserted,
        }
    }

    #[test]
    fn test_lru_and_fifo_disagree_on_refreshed_entry() {
        let mut entries = HashMap::new();
        // "a" inserted first but touched most recently
        entries.insert("a", entry(9, 1));
        entries.insert("b", entry(5, 2));
        entries.insert("c", entry(7, 3));

        assert_eq!(Lru.select_victim(&entries), Some("b"));
        assert_eq!(Fifo.select_victim(&entries), Some("a"));
    }

    #[test]
    fn test_empty_store_has_no_victim() {
        let entries: HashMap<&str, CacheEntry<()>> = HashMap::new();
        assert_eq!(Lru.select_victim(&entries), None);
        assert_eq!(Fifo.select_victim(&entries), None);
    }

    #[test]
    fn test_kind_builds_named_policy() {
        let lru = EvictionKind::Lru.policy::<String, u32>();
        let fifo = EvictionKind::Fifo.policy::<String, u32>();
        assert_eq!(lru.name(), "lru");
        assert_eq!(fifo.name(), "fifo");
    }
}
