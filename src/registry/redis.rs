//! Redis-backed registry store.
//!
//! Every trait operation maps to a single Redis command, so each call is
//! atomic on its own; nothing here opens transactions. The connection
//! manager reconnects on its own and clones are cheap handles.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::RegistryStore;
use crate::error::{AppError, Result};

/// Registry store backed by a shared Redis instance.
pub struct RedisRegistry {
    conn: ConnectionManager,
}

impl RedisRegistry {
    /// Connect to Redis at the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::Config(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Registry(format!("Failed to connect to Redis: {}", e)))?;
        Ok(Self { conn })
    }
}

fn registry_err(op: &str, key: &str, e: redis::RedisError) -> AppError {
    AppError::Registry(format!("{} '{}' failed: {}", op, key, e))
}

#[async_trait]
impl RegistryStore for RedisRegistry {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = conn
            .sadd(key, member)
            .await
            .map_err(|e| registry_err("SADD", key, e))?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn
            .srem(key, member)
            .await
            .map_err(|e| registry_err("SREM", key, e))?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>> {
        let mut conn = self.conn.clone();
        let members: HashSet<String> = conn
            .smembers(key)
            .await
            .map_err(|e| registry_err("SMEMBERS", key, e))?;
        Ok(members)
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .hset(key, field, value)
            .await
            .map_err(|e| registry_err("HSET", key, e))?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let entries: HashMap<String, String> = conn
            .hgetall(key)
            .await
            .map_err(|e| registry_err("HGETALL", key, e))?;
        Ok(entries)
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn
            .hincr(key, field, delta)
            .await
            .map_err(|e| registry_err("HINCRBY", key, e))?;
        Ok(value)
    }

    async fn put_value(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| registry_err("SETEX", key, e))?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let updated: bool = conn
            .expire(key, ttl.as_secs() as i64)
            .await
            .map_err(|e| registry_err("EXPIRE", key, e))?;
        Ok(updated)
    }

    async fn persist(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let updated: bool = conn
            .persist(key)
            .await
            .map_err(|e| registry_err("PERSIST", key, e))?;
        Ok(updated)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn.del(key).await.map_err(|e| registry_err("DEL", key, e))?;
        Ok(deleted > 0)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(pattern)
            .await
            .map_err(|e| registry_err("SCAN", pattern, e))?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| registry_err("PING", "", e))?;
        Ok(())
    }
}
