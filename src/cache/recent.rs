//! Advisory recent-items list
//!
//! A capped FIFO of recently served strings kept under its own KV key and
//! fed into upstream generation to bias it away from repeats. This is not
//! a uniqueness guarantee: the list and the pool are independently
//! read-modify-written, the generator is free to ignore the hint, and
//! every failure here degrades to "no hint".

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::warn;

use crate::kv::KvStore;

// == Recent List ==
#[derive(Clone)]
pub struct RecentList {
    kv: Arc<dyn KvStore>,
    key: String,
    max_len: usize,
}

impl RecentList {
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>, max_len: usize) -> Self {
        Self {
            kv,
            key: key.into(),
            max_len,
        }
    }

    /// Loads the list, empty on any failure.
    pub async fn load(&self) -> Vec<String> {
        match self.kv.get_json(&self.key).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, "recent list read failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Prepends `new_items` to `existing` and persists the front
    /// `max_len` entries. Write failures are swallowed; the list is a
    /// hint, not state anything depends on.
    pub async fn remember(&self, new_items: &[String], existing: Vec<String>) {
        let mut updated: Vec<String> = new_items.to_vec();
        updated.extend(existing);
        updated.truncate(self.max_len);

        if let Err(e) = self
            .kv
            .put_json(&self.key, json!(updated), None::<Duration>)
            .await
        {
            warn!(key = %self.key, "recent list write failed: {}", e);
        }
    }
}
