//! FIFO item pool
//!
//! A pool of pre-fetched items stored under a fixed KV key. Requests consume
//! items from the front; refills append a fresh batch to whatever is
//! currently stored. An emptied pool is deleted rather than stored empty,
//! so "key present" implies "at least one item available" except during a
//! read-modify-write race between concurrent requests.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::kv::{self, KvStore};

// == Stored Record ==
/// The record persisted under the pool key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PooledBatch<T> {
    pub items: Vec<T>,
    pub fetched_at: DateTime<Utc>,
}

/// Debug view of the pool for `/api` responses.
#[derive(Debug, Clone, Serialize)]
pub struct PoolInfo {
    pub cached_count: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Result of serving a request through the pool.
#[derive(Debug)]
pub struct TakeOutcome<T> {
    /// Items to serve, in pool order (synchronously fetched items follow
    /// any pooled ones).
    pub items: Vec<T>,
    /// Pool size after this call, used for the low-water check.
    pub remaining: usize,
    /// How many of `items` came from the pool rather than a live fetch.
    pub from_cache: usize,
}

// == Item Pool ==
/// FIFO pool over one KV key. Cloning is cheap; clones share the store.
pub struct ItemPool<T> {
    kv: Arc<dyn KvStore>,
    key: String,
    /// Upper bound enforced on refill appends. Without it, refills racing
    /// with slow traffic could grow the stored value unboundedly.
    max_items: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ItemPool<T> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            key: self.key.clone(),
            max_items: self.max_items,
            _marker: PhantomData,
        }
    }
}

impl<T> ItemPool<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>, max_items: usize) -> Self {
        Self {
            kv,
            key: key.into(),
            max_items,
            _marker: PhantomData,
        }
    }

    // == Take ==
    /// Removes up to `count` items from the front of the pool.
    ///
    /// Read-modify-write: when the stored pool holds at least `count` items,
    /// the front `count` are split off, the remainder is persisted (or the
    /// key deleted when empty), and `(taken, remaining)` is returned. When
    /// the pool is absent or holds fewer than `count`, nothing is mutated
    /// and the pre-existing size is reported alongside an empty take.
    ///
    /// Any KV failure is treated as a cache miss, never propagated.
    pub async fn take(&self, count: usize) -> (Vec<T>, usize) {
        let batch: PooledBatch<T> = match kv::get_typed(self.kv.as_ref(), &self.key).await {
            Ok(Some(batch)) => batch,
            Ok(None) => return (Vec::new(), 0),
            Err(e) => {
                warn!(key = %self.key, "pool read failed, treating as miss: {}", e);
                return (Vec::new(), 0);
            }
        };

        if batch.items.len() < count {
            return (Vec::new(), batch.items.len());
        }

        let mut items = batch.items;
        let remainder = items.split_off(count);
        let remaining = remainder.len();

        let write = if remainder.is_empty() {
            debug!(key = %self.key, "pool exhausted, deleting key");
            self.kv.delete(&self.key).await
        } else {
            let updated = PooledBatch {
                items: remainder,
                fetched_at: batch.fetched_at,
            };
            kv::put_typed(self.kv.as_ref(), &self.key, &updated, None).await
        };

        if let Err(e) = write {
            // The old batch is still stored; the taken items may be served
            // again by a later request. Duplicates are tolerated, a short
            // response is not, so report a miss.
            warn!(key = %self.key, "pool write failed, treating as miss: {}", e);
            return (Vec::new(), 0);
        }

        (items, remaining)
    }

    // == Refill Append ==
    /// Appends a fresh batch to whatever is currently stored.
    ///
    /// Re-reads the entry immediately before writing rather than relying on
    /// a value captured earlier, because this runs detached and may race
    /// with foreground takes. Appends beyond `max_items` are dropped.
    /// Returns the stored pool size after the write (0 on failure).
    pub async fn refill_append(&self, new_items: Vec<T>) -> usize {
        if new_items.is_empty() {
            debug!(key = %self.key, "empty refill batch, skipping write");
            return self.current_len().await;
        }

        let mut items = match kv::get_typed::<PooledBatch<T>>(self.kv.as_ref(), &self.key).await {
            Ok(Some(batch)) => batch.items,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, "pool read failed during refill, starting empty: {}", e);
                Vec::new()
            }
        };

        items.extend(new_items);
        if items.len() > self.max_items {
            warn!(
                key = %self.key,
                dropped = items.len() - self.max_items,
                "refill overflow, capping pool at {}",
                self.max_items
            );
            items.truncate(self.max_items);
        }

        let updated = PooledBatch {
            items,
            fetched_at: Utc::now(),
        };
        let size = updated.items.len();

        match kv::put_typed(self.kv.as_ref(), &self.key, &updated, None).await {
            Ok(()) => {
                debug!(key = %self.key, size, "pool refilled");
                size
            }
            Err(e) => {
                warn!(key = %self.key, "pool write failed during refill: {}", e);
                0
            }
        }
    }

    // == Take Or Fetch ==
    /// Serves exactly `count` items when any source can supply them.
    ///
    /// Takes from the pool first; on a shortfall, calls `fetch` for the
    /// missing count. A fetch is free to return more than asked, in which
    /// case the surplus is appended back onto the pool. The returned item
    /// count can only fall short of `count` when the fetch itself returned
    /// fewer items than requested.
    pub async fn take_or_fetch<F, Fut>(&self, count: usize, fetch: F) -> Result<TakeOutcome<T>>
    where
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let (mut items, mut remaining) = self.take(count).await;
        let from_cache = items.len();

        if items.len() < count {
            let shortfall = count - items.len();
            debug!(key = %self.key, shortfall, "pool short, fetching synchronously");

            let mut fetched = fetch(shortfall).await?;
            if fetched.len() > shortfall {
                let surplus = fetched.split_off(shortfall);
                remaining = self.refill_append(surplus).await;
            }
            items.extend(fetched);
        }

        Ok(TakeOutcome {
            items,
            remaining,
            from_cache,
        })
    }

    // == Info ==
    /// Pool size and fetch timestamp for debug output, `None` when absent
    /// or unreadable.
    pub async fn info(&self) -> Option<PoolInfo> {
        match kv::get_typed::<PooledBatch<T>>(self.kv.as_ref(), &self.key).await {
            Ok(Some(batch)) => Some(PoolInfo {
                cached_count: batch.items.len(),
                fetched_at: batch.fetched_at,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %self.key, "pool info read failed: {}", e);
                None
            }
        }
    }

    async fn current_len(&self) -> usize {
        match kv::get_typed::<PooledBatch<T>>(self.kv.as_ref(), &self.key).await {
            Ok(Some(batch)) => batch.items.len(),
            _ => 0,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::kv::MemoryKv;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;

    /// KV double that fails every operation, for the degrade path.
    struct FailingKv;

    #[async_trait]
    impl KvStore for FailingKv {
        async fn get_json(&self, _key: &str) -> Result<Option<Value>> {
            Err(RelayError::Store("kv unavailable".to_string()))
        }

        async fn put_json(&self, _key: &str, _value: Value, _ttl: Option<Duration>) -> Result<()> {
            Err(RelayError::Store("kv unavailable".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<()> {
            Err(RelayError::Store("kv unavailable".to_string()))
        }
    }

    fn pool_on(kv: Arc<dyn KvStore>) -> ItemPool<String> {
        ItemPool::new(kv, "test_pool", 40)
    }

    async fn seed(pool: &ItemPool<String>, count: usize) {
        let items: Vec<String> = (0..count).map(|i| format!("item{}", i)).collect();
        pool.refill_append(items).await;
    }

    #[tokio::test]
    async fn test_take_splits_front_and_persists_remainder() {
        let kv = Arc::new(MemoryKv::new());
        let pool = pool_on(kv);
        seed(&pool, 6).await;

        let (taken, remaining) = pool.take(4).await;

        assert_eq!(taken, vec!["item0", "item1", "item2", "item3"]);
        assert_eq!(remaining, 2);
        assert_eq!(pool.info().await.unwrap().cached_count, 2);
    }

    #[tokio::test]
    async fn test_take_insufficient_does_not_mutate() {
        let kv = Arc::new(MemoryKv::new());
        let pool = pool_on(kv);
        seed(&pool, 2).await;

        let (taken, remaining) = pool.take(4).await;

        assert!(taken.is_empty());
        assert_eq!(remaining, 2);
        // Stored pool is untouched.
        assert_eq!(pool.info().await.unwrap().cached_count, 2);
    }

    #[tokio::test]
    async fn test_take_to_zero_deletes_key() {
        let kv = Arc::new(MemoryKv::new());
        let pool = pool_on(Arc::clone(&kv) as Arc<dyn KvStore>);
        seed(&pool, 4).await;

        let (taken, remaining) = pool.take(4).await;

        assert_eq!(taken.len(), 4);
        assert_eq!(remaining, 0);
        // Key is absent, not present-with-empty-list.
        assert_eq!(kv.get_json("test_pool").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_take_absent_pool() {
        let pool = pool_on(Arc::new(MemoryKv::new()));
        let (taken, remaining) = pool.take(4).await;
        assert!(taken.is_empty());
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_take_on_failing_kv_is_a_miss() {
        let pool = pool_on(Arc::new(FailingKv));
        let (taken, remaining) = pool.take(4).await;
        assert!(taken.is_empty());
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_refill_appends_after_concurrent_take() {
        let kv = Arc::new(MemoryKv::new());
        let pool = pool_on(kv);
        seed(&pool, 6).await;

        // A foreground take shrinks the pool between the refill decision
        // and the refill write; the append must build on the shrunken pool.
        let (_, remaining) = pool.take(4).await;
        assert_eq!(remaining, 2);

        let size = pool
            .refill_append(vec!["fresh0".to_string(), "fresh1".to_string()])
            .await;

        assert_eq!(size, 4);
        let (taken, _) = pool.take(4).await;
        assert_eq!(taken, vec!["item4", "item5", "fresh0", "fresh1"]);
    }

    #[tokio::test]
    async fn test_refill_caps_pool_size() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let pool: ItemPool<String> = ItemPool::new(kv, "test_pool", 5);
        seed(&pool, 3).await;

        let size = pool
            .refill_append((0..10).map(|i| format!("extra{}", i)).collect())
            .await;

        assert_eq!(size, 5);
    }

    #[tokio::test]
    async fn test_refill_empty_batch_skips_write() {
        let kv = Arc::new(MemoryKv::new());
        let pool = pool_on(Arc::clone(&kv) as Arc<dyn KvStore>);

        let size = pool.refill_append(Vec::new()).await;

        assert_eq!(size, 0);
        assert_eq!(kv.get_json("test_pool").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_take_or_fetch_persists_surplus() {
        // Empty pool, fetch returns 20, request asks for 4: the first 4 are
        // served synchronously and the other 16 are persisted.
        let pool = pool_on(Arc::new(MemoryKv::new()));

        let outcome = pool
            .take_or_fetch(4, |shortfall| async move {
                assert_eq!(shortfall, 4);
                Ok((0..20).map(|i| format!("gen{}", i)).collect())
            })
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 4);
        assert_eq!(outcome.items[0], "gen0");
        assert_eq!(outcome.from_cache, 0);
        assert_eq!(outcome.remaining, 16);
        assert_eq!(pool.info().await.unwrap().cached_count, 16);
    }

    #[tokio::test]
    async fn test_take_or_fetch_serves_from_pool_without_fetch() {
        let pool = pool_on(Arc::new(MemoryKv::new()));
        seed(&pool, 6).await;

        let outcome = pool
            .take_or_fetch(4, |_| async { panic!("fetch must not run on a warm pool") })
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 4);
        assert_eq!(outcome.from_cache, 4);
        assert_eq!(outcome.remaining, 2);
    }

    #[tokio::test]
    async fn test_take_or_fetch_on_failing_kv_still_serves() {
        let pool = pool_on(Arc::new(FailingKv));

        let outcome = pool
            .take_or_fetch(4, |shortfall| async move {
                Ok((0..shortfall).map(|i| format!("gen{}", i)).collect())
            })
            .await
            .unwrap();

        assert_eq!(outcome.items.len(), 4);
        assert_eq!(outcome.from_cache, 0);
    }

    #[tokio::test]
    async fn test_take_or_fetch_propagates_fetch_error() {
        let pool = pool_on(Arc::new(MemoryKv::new()));

        let result = pool
            .take_or_fetch(4, |_| async {
                Err::<Vec<String>, _>(RelayError::Upstream("down".to_string()))
            })
            .await;

        assert!(matches!(result, Err(RelayError::Upstream(_))));
    }
}

// == Property Tests ==
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::kv::MemoryKv;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // With no concurrent writers, every successful take shrinks the
        // stored pool by exactly min(n, size) when size >= n, and a pool
        // that reaches zero leaves the key absent.
        #[test]
        fn prop_pool_monotonic_shrink(
            initial in 1usize..40,
            takes in prop::collection::vec(1usize..8, 1..12)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async move {
                let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
                let pool: ItemPool<u32> = ItemPool::new(Arc::clone(&kv), "prop_pool", 64);
                pool.refill_append((0..initial as u32).collect()).await;

                let mut expected = initial;
                for n in takes {
                    let (taken, remaining) = pool.take(n).await;
                    if expected >= n {
                        prop_assert_eq!(taken.len(), n);
                        expected -= n;
                    } else {
                        prop_assert!(taken.is_empty());
                    }
                    prop_assert_eq!(remaining, expected);
                }

                if expected == 0 {
                    prop_assert_eq!(kv.get_json("prop_pool").await.unwrap(), None);
                } else {
                    prop_assert_eq!(pool.info().await.unwrap().cached_count, expected);
                }
                Ok(())
            })?;
        }
    }
}
