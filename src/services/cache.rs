use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use super::clock::Clock;

/// How long entries live, per key.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    per_key: HashMap<String, Duration>,
}

impl TtlPolicy {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            per_key: HashMap::new(),
        }
    }

    pub fn with_key(mut self, key: &str, ttl: Duration) -> Self {
        self.per_key.insert(key.to_string(), ttl);
        self
    }

    pub fn ttl_for(&self, key: &str) -> Duration {
        self.per_key.get(key).copied().unwrap_or(self.default_ttl)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

pub struct Cache<V> {
    clock: Arc<dyn Clock>,
    policy: TtlPolicy,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Cache<V> {
    pub fn new(clock: Arc<dyn Clock>, policy: TtlPolicy) -> Self {
        Self {
            clock,
            policy,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh value for `key`; expired entries are dropped on read.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if now - entry.stored_at < self.policy.ttl_for(key) => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: V) {
        let stored_at = self.clock.now();
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), CacheEntry { value, stored_at });
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    pub fn stored_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .map(|entry| entry.stored_at)
    }
}
