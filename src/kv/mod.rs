//! Key-Value Store Interface
//!
//! The relay treats its backing store as an external, eventually-consistent
//! mapping from string key to JSON value. Everything above this layer goes
//! through [`KvStore`], so a durable binding can replace the in-memory
//! adapter without touching the cache managers.

mod memory;

pub use memory::MemoryKv;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;

// == KV Store Trait ==
/// Minimal interface consumed by the cache managers.
///
/// Values are JSON-serialized domain records. There is no transaction or
/// lock primitive: all mutation safety above this trait comes from
/// read-modify-write discipline, with last-writer-wins accepted.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a JSON value, `None` when the key is absent or expired.
    async fn get_json(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a JSON value with an optional expiry.
    async fn put_json(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Removes a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

// == Typed Helpers ==
/// Reads and deserializes a stored record.
pub async fn get_typed<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> Result<Option<T>> {
    match kv.get_json(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serializes and writes a record.
pub async fn put_typed<T: Serialize>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    kv.put_json(key, serde_json::to_value(value)?, ttl).await
}
