//! In-memory storage implementation

use super::value::Value;
use crate::config::{system_clock, Clock};
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

type Hasher = BuildHasherDefault<SipHasher13>;

/// A stored value and its expiration
#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Value,

    /// Absolute UNIX timestamp in seconds
    pub expire_at: Option<i64>,
}

/// In-memory key-value store
///
/// Every write or delete of a key bumps a store-wide version counter and
/// records it against the key. The record outlives the key itself, so a
/// watcher notices a delete followed by a re-create.
pub struct MemoryStore {
    entries: HashMap<Bytes, Entry, Hasher>,
    versions: HashMap<Bytes, u64, Hasher>,
    version: u64,
    clock: Clock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(system_clock)
    }

    /// Create a store whose expirations are judged against `clock`
    pub fn with_clock(clock: Clock) -> Self {
        MemoryStore {
            entries: HashMap::with_capacity_and_hasher(1024, Hasher::default()),
            versions: HashMap::with_hasher(Hasher::default()),
            version: 0,
            clock,
        }
    }

    pub fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Drop the key if its expiration has passed
    fn purge_expired(&mut self, key: &Bytes) {
        let now = self.now();
        let expired = self
            .entries
            .get(key)
            .and_then(|entry| entry.expire_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
        }
    }

    /// Record a modification of `key`
    pub fn touch(&mut self, key: &Bytes) {
        self.version += 1;
        self.versions.insert(key.clone(), self.version);
    }

    /// Version of the last modification of `key`, 0 if never modified
    pub fn version_of(&self, key: &Bytes) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Get a value by key, None if missing or expired
    pub fn get(&mut self, key: &Bytes) -> Option<&Value> {
        self.purge_expired(key);
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Mutable access to the value, inserting `default` when the key is absent
    ///
    /// The caller is responsible for calling [`MemoryStore::touch`] once the
    /// modification is done.
    pub fn get_or_insert(&mut self, key: &Bytes, default: impl FnOnce() -> Value) -> &mut Value {
        self.purge_expired(key);
        &mut self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry {
                value: default(),
                expire_at: None,
            })
            .value
    }

    /// Store a value, clearing any expiration
    pub fn set(&mut self, key: impl Into<Bytes>, value: Value) {
        let key = key.into();
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                expire_at: None,
            },
        );
        self.touch(&key);
    }

    /// Delete a key, returns true if the key existed
    pub fn delete(&mut self, key: &Bytes) -> bool {
        self.purge_expired(key);
        if self.entries.remove(key).is_some() {
            self.touch(key);
            true
        } else {
            false
        }
    }

    /// Expire the key at an absolute timestamp; a past timestamp deletes it
    pub fn expire_at(&mut self, key: &Bytes, at: i64) -> bool {
        self.purge_expired(key);
        if !self.entries.contains_key(key) {
            return false;
        }
        if at <= self.now() {
            self.entries.remove(key);
        } else if let Some(entry) = self.entries.get_mut(key) {
            entry.expire_at = Some(at);
        }
        self.touch(key);
        true
    }

    /// Remaining TTL in seconds, -1 without expiration, -2 if missing
    pub fn ttl(&mut self, key: &Bytes) -> i64 {
        self.purge_expired(key);
        let now = self.now();
        match self.entries.get(key) {
            Some(Entry {
                expire_at: Some(at),
                ..
            }) => at - now,
            Some(_) => -1,
            None => -2,
        }
    }

    /// Absolute expiration of a live key
    pub fn expiration(&mut self, key: &Bytes) -> Option<i64> {
        self.purge_expired(key);
        self.entries.get(key).and_then(|entry| entry.expire_at)
    }

    /// All live keys, sorted
    pub fn keys(&self) -> Vec<Bytes> {
        let now = self.now();
        let mut keys: Vec<Bytes> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expire_at.map_or(true, |at| at > now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remove all keys
    pub fn clear(&mut self) {
        let keys: Vec<Bytes> = self.entries.keys().cloned().collect();
        self.entries.clear();
        for key in &keys {
            self.touch(key);
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.now();
        self.entries
            .values()
            .filter(|entry| entry.expire_at.map_or(true, |at| at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
