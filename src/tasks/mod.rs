//! Background Tasks Module
//!
//! Detached refill/refresh tasks spawned off the response path. Each
//! helper returns the `JoinHandle` so the spawner holds a cancellable
//! handle (handlers drop it, tests await it); task failures are logged
//! and swallowed, never surfaced to a client, and tasks are not retried.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{ItemPool, RecentList, SnapshotCache};
use crate::error::Result;
use crate::models::NameEntry;
use crate::upstream::NameSource;

// == Names Pool Refill ==
/// Fetches a batch of names and appends it to the pool, then records the
/// generated names on the advisory recent list.
pub fn spawn_names_refill(
    pool: ItemPool<NameEntry>,
    source: Arc<dyn NameSource>,
    recent: RecentList,
    batch_size: usize,
    avoid: Vec<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(batch_size, "background names refill started");

        match source.generate(batch_size, &avoid).await {
            Ok(names) if !names.is_empty() => {
                let generated: Vec<String> = names.iter().map(|n| n.name.clone()).collect();
                let size = pool.refill_append(names).await;
                info!(size, "names pool refilled");
                recent.remember(&generated, avoid).await;
            }
            Ok(_) => warn!("names refill produced no items, pool left as-is"),
            Err(e) => warn!("names refill failed: {}", e),
        }
    })
}

// == Snapshot Refresh ==
/// Recomputes a snapshot and overwrites the stored one. Overwrites are
/// idempotent, so redundant refreshes scheduled by concurrent stale
/// reads are harmless.
pub fn spawn_snapshot_refresh<T, F, Fut>(cache: SnapshotCache<T>, recompute: F) -> JoinHandle<()>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(async move {
        match recompute().await {
            Ok(data) => {
                if let Err(e) = cache.store(data).await {
                    warn!("snapshot refresh write failed: {}", e);
                }
            }
            Err(e) => warn!("snapshot refresh failed: {}", e),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::kv::{KvStore, MemoryKv};
    use async_trait::async_trait;

    struct StaticNames(Vec<NameEntry>);

    #[async_trait]
    impl NameSource for StaticNames {
        async fn generate(&self, count: usize, _avoid: &[String]) -> Result<Vec<NameEntry>> {
            Ok(self.0.iter().take(count).cloned().collect())
        }
    }

    struct BrokenNames;

    #[async_trait]
    impl NameSource for BrokenNames {
        async fn generate(&self, _count: usize, _avoid: &[String]) -> Result<Vec<NameEntry>> {
            Err(RelayError::Upstream("generator down".to_string()))
        }
    }

    fn batch(n: usize) -> Vec<NameEntry> {
        (0..n)
            .map(|i| NameEntry::new(format!("Name{}", i), "meaning"))
            .collect()
    }

    #[tokio::test]
    async fn test_refill_appends_and_records_recent() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let pool: ItemPool<NameEntry> = ItemPool::new(Arc::clone(&kv), "names_cache", 40);
        let recent = RecentList::new(Arc::clone(&kv), "recent_names", 50);
        let source: Arc<dyn NameSource> = Arc::new(StaticNames(batch(20)));

        spawn_names_refill(pool.clone(), source, recent.clone(), 20, Vec::new())
            .await
            .unwrap();

        assert_eq!(pool.info().await.unwrap().cached_count, 20);
        assert_eq!(recent.load().await.len(), 20);
    }

    #[tokio::test]
    async fn test_refill_failure_is_swallowed() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let pool: ItemPool<NameEntry> = ItemPool::new(Arc::clone(&kv), "names_cache", 40);
        let recent = RecentList::new(Arc::clone(&kv), "recent_names", 50);

        // The task completes without panicking and leaves the pool alone.
        spawn_names_refill(pool.clone(), Arc::new(BrokenNames), recent, 20, Vec::new())
            .await
            .unwrap();

        assert!(pool.info().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_refresh_overwrites() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let cache: SnapshotCache<String> = SnapshotCache::new(kv, "snap", 300, 3600);
        cache.store("old".to_string()).await.unwrap();

        spawn_snapshot_refresh(cache.clone(), || async { Ok("new".to_string()) })
            .await
            .unwrap();

        assert_eq!(cache.load().await.unwrap().data, "new");
    }
}
