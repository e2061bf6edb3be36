//! In-memory KV adapter
//!
//! HashMap-backed implementation of [`KvStore`] with expiry checked on read.
//! Used as the default binding for the binary and throughout the tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use super::KvStore;
use crate::error::Result;

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}

// == Memory KV ==
/// In-process [`KvStore`] backed by a HashMap behind an async RwLock.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, StoredValue>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Utc::now();
        let entries = self.entries.read().await;
        entries.values().filter(|v| !v.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get_json(&self, key: &str) -> Result<Option<Value>> {
        let now = Utc::now();

        // Write lock so expired entries can be pruned in place.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(stored) if stored.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(stored) => Ok(Some(stored.value.clone())),
            None => Ok(None),
        }
    }

    async fn put_json(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.and_then(|d| {
            chrono::Duration::from_std(d)
                .ok()
                .map(|d| Utc::now() + d)
        });

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoredValue { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_get() {
        let kv = MemoryKv::new();
        kv.put_json("key1", json!({"a": 1}), None).await.unwrap();

        let value = kv.get_json("key1").await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
        assert_eq!(kv.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_absent() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get_json("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let kv = MemoryKv::new();
        kv.put_json("key1", json!(1), None).await.unwrap();
        kv.delete("key1").await.unwrap();

        assert_eq!(kv.get_json("key1").await.unwrap(), None);
        assert!(kv.is_empty().await);

        // Deleting again is a no-op, not an error.
        kv.delete("key1").await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite() {
        let kv = MemoryKv::new();
        kv.put_json("key1", json!("first"), None).await.unwrap();
        kv.put_json("key1", json!("second"), None).await.unwrap();

        assert_eq!(kv.get_json("key1").await.unwrap(), Some(json!("second")));
        assert_eq!(kv.len().await, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_on_read() {
        let kv = MemoryKv::new();
        kv.put_json("short", json!(1), Some(Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(kv.get_json("short").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(kv.get_json("short").await.unwrap(), None);
        assert!(kv.is_empty().await);
    }
}
