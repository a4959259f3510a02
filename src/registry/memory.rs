//! In-process registry store.
//!
//! Backs tests and single-node deployments where no shared Redis is
//! configured. TTLs are enforced lazily: expired keys are dropped when the
//! store is next touched.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::RegistryStore;
use crate::error::Result;

#[derive(Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    values: HashMap<String, String>,
    deadlines: HashMap<String, Instant>,
}

impl Inner {
    fn drop_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.deadlines.remove(&key);
            self.sets.remove(&key);
            self.hashes.remove(&key);
            self.values.remove(&key);
        }
    }

    fn key_exists(&self, key: &str) -> bool {
        self.sets.contains_key(key) || self.hashes.contains_key(key) || self.values.contains_key(key)
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let existed = self.key_exists(key);
        self.sets.remove(key);
        self.hashes.remove(key);
        self.values.remove(key);
        self.deadlines.remove(key);
        existed
    }
}

/// Registry store held entirely in process memory.
#[derive(Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Match a key against a glob pattern where `*` matches any run of
/// characters (the subset of Redis MATCH syntax the registry uses).
pub fn glob_match(pattern: &str, key: &str) -> bool {
    fn matches(p: &[u8], k: &[u8]) -> bool {
        match (p.first(), k.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                matches(&p[1..], k) || (!k.is_empty() && matches(p, &k[1..]))
            }
            (Some(pc), Some(kc)) if pc == kc => matches(&p[1..], &k[1..]),
            _ => false,
        }
    }
    matches(pattern.as_bytes(), key.as_bytes())
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        let removed = inner
            .sets
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false);
        let now_empty = inner.sets.get(key).map(HashSet::is_empty).unwrap_or(false);
        if now_empty {
            inner.sets.remove(key);
            inner.deadlines.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        Ok(inner.sets.get(key).cloned().unwrap_or_default())
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        let entry = inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert_with(|| "0".to_string());
        let current: i64 = entry.parse().unwrap_or(0);
        let next = current + delta;
        *entry = next.to_string();
        Ok(next)
    }

    async fn put_value(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        inner.values.insert(key.to_string(), value.to_string());
        inner.deadlines.insert(key.to_string(), Instant::now() + ttl);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        if inner.key_exists(key) {
            inner.deadlines.insert(key.to_string(), Instant::now() + ttl);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn persist(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        if inner.key_exists(key) {
            Ok(inner.deadlines.remove(key).is_some())
        } else {
            Ok(false)
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        Ok(inner.remove_key(key))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.write().await;
        inner.drop_expired();
        let mut keys: Vec<String> = inner
            .sets
            .keys()
            .chain(inner.hashes.keys())
            .chain(inner.values.keys())
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
