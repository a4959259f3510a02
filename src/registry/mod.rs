//! Shared peer-registry store.
//!
//! The registry is a cache of hints, not a ledger: every operation is a
//! single atomic command against the backing store, and multi-step
//! sequences (set-add followed by expire) are deliberately not
//! transactional. The periodic maintenance resync is the correctness
//! mechanism for entries that lose their TTL between steps.

pub mod keys;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::Result;

pub use memory::MemoryRegistry;
pub use redis::RedisRegistry;

/// Key/value store operations the peer registry relies on.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Add a member to a set. Returns true when the member was newly added.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member from a set. Returns true when the member was present.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set; an absent key reads as the empty set.
    async fn set_members(&self, key: &str) -> Result<HashSet<String>>;

    /// Write one field of a hash.
    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Read all fields of a hash; an absent key reads as the empty map.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Atomically increment an integer hash field, returning the new value.
    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Set a plain value with a TTL.
    async fn put_value(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// (Re)apply a TTL to a key. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remove any TTL from a key, making it permanent until deleted.
    async fn persist(&self, key: &str) -> Result<bool>;

    /// Delete a key. Returns true when the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All keys matching a glob pattern. Bounded, infrequent use only
    /// (disconnect cleanup); not on any per-message hot path.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}
