//! Bounded LRU cache of reusable prepared statements.

use std::collections::HashMap;

use super::{SharedStatement, StatementKey};

type EvictionListener = Box<dyn Fn(&SharedStatement) + Send + Sync>;

struct CacheEntry {
    statement: SharedStatement,
    last_used: u64,
}

/// A bounded mapping from statement fingerprints to reusable prepared
/// statements.
///
/// When an insert pushes the cache past its capacity, the least recently
/// used entry is evicted and the eviction listener is invoked with it; the
/// listener is responsible for closing the statement and must swallow
/// close failures itself so that one bad close cannot leak the others.
///
/// A capacity of `0` disables caching: every put immediately evicts the
/// incoming statement.
pub struct LruStatementCache {
    capacity: usize,
    entries: HashMap<StatementKey, CacheEntry>,
    sequence: u64,
    eviction_listener: Option<EvictionListener>,
}

impl std::fmt::Debug for LruStatementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruStatementCache")
            .field("capacity", &self.capacity)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl LruStatementCache {
    /// Creates a cache bounded at `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            sequence: 0,
            eviction_listener: None,
        }
    }

    /// Installs the eviction listener invoked with every evicted statement.
    pub fn set_eviction_listener(
        &mut self,
        listener: impl Fn(&SharedStatement) + Send + Sync + 'static,
    ) {
        self.eviction_listener = Some(Box::new(listener));
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of cached statements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no statements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the statement cached under `key`, marking it most recently
    /// used.
    ///
    /// The statement stays in the cache; the returned handle shares it.
    pub fn get(&mut self, key: &StatementKey) -> Option<SharedStatement> {
        self.sequence += 1;
        let sequence = self.sequence;
        let entry = self.entries.get_mut(key)?;
        entry.last_used = sequence;
        Some(entry.statement.clone())
    }

    /// Caches `statement` under `key` and returns it.
    ///
    /// If the key is already present the previous statement is evicted.
    /// If the insert exceeds capacity the least recently used entry is
    /// evicted.
    pub fn put(&mut self, key: StatementKey, statement: SharedStatement) -> SharedStatement {
        if self.capacity == 0 {
            self.fire_eviction(&statement);
            return statement;
        }

        self.sequence += 1;
        let entry = CacheEntry {
            statement: statement.clone(),
            last_used: self.sequence,
        };
        if let Some(previous) = self.entries.insert(key, entry) {
            self.fire_eviction(&previous.statement);
        } else if self.entries.len() > self.capacity {
            self.evict_least_recently_used();
        }
        statement
    }

    /// Evicts every entry, least recently used first.
    pub fn clear(&mut self) {
        let mut entries: Vec<CacheEntry> = self.entries.drain().map(|(_, entry)| entry).collect();
        entries.sort_by_key(|entry| entry.last_used);
        for entry in entries {
            self.fire_eviction(&entry.statement);
        }
    }

    fn evict_least_recently_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            if let Some(entry) = self.entries.remove(&key) {
                tracing::debug!(sql = key.sql(), "evicting least recently used statement");
                self.fire_eviction(&entry.statement);
            }
        }
    }

    fn fire_eviction(&self, statement: &SharedStatement) {
        if let Some(listener) = &self.eviction_listener {
            listener(statement);
        }
    }
}
