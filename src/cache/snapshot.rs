//! Single-snapshot cache
//!
//! One computed aggregate stored under a fixed KV key, classified into
//! three freshness bands by age:
//! - fresh: serve as-is, no I/O side effects
//! - stale: serve as-is and refresh in the background
//! - expired (or missing): recompute synchronously, with any stored
//!   snapshot, however old, as the last-resort fallback when the
//!   recompute fails
//!
//! There is no persisted "currently refreshing" flag, so concurrent
//! requests in the stale band may each schedule a redundant refresh.
//! Refreshes are idempotent overwrites, so this is a bounded-cost race.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::kv::{self, KvStore};

// == Stored Record ==
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredSnapshot<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

/// Age band of a stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

/// A snapshot served to a caller, along with the handle of any background
/// refresh the read scheduled. Callers on the response path drop the
/// handle; tests await it for determinism.
#[derive(Debug)]
pub struct Served<T> {
    pub data: T,
    pub refresh: Option<JoinHandle<()>>,
}

// == Snapshot Cache ==
/// Read-through cache over one snapshot key. Cloning shares the store.
pub struct SnapshotCache<T> {
    kv: Arc<dyn KvStore>,
    key: String,
    fresh_ttl: Duration,
    stale_ttl: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SnapshotCache<T> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            key: self.key.clone(),
            fresh_ttl: self.fresh_ttl,
            stale_ttl: self.stale_ttl,
            _marker: PhantomData,
        }
    }
}

impl<T> SnapshotCache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        kv: Arc<dyn KvStore>,
        key: impl Into<String>,
        fresh_ttl_secs: u64,
        stale_ttl_secs: u64,
    ) -> Self {
        Self {
            kv,
            key: key.into(),
            fresh_ttl: Duration::seconds(fresh_ttl_secs as i64),
            stale_ttl: Duration::seconds(stale_ttl_secs as i64),
            _marker: PhantomData,
        }
    }

    /// Loads whatever snapshot is stored, however old. KV failures read as
    /// "no snapshot".
    pub async fn load(&self) -> Option<StoredSnapshot<T>> {
        match kv::get_typed(self.kv.as_ref(), &self.key).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(key = %self.key, "snapshot read failed, treating as miss: {}", e);
                None
            }
        }
    }

    pub fn classify(&self, snapshot: &StoredSnapshot<T>, now: DateTime<Utc>) -> Freshness {
        let age = now - snapshot.timestamp;
        if age < self.fresh_ttl {
            Freshness::Fresh
        } else if age < self.stale_ttl {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Overwrites the stored snapshot with a fresh timestamp.
    pub async fn store(&self, data: T) -> Result<()> {
        let snapshot = StoredSnapshot {
            data,
            timestamp: Utc::now(),
        };
        kv::put_typed(self.kv.as_ref(), &self.key, &snapshot, None).await
    }

    // == Read Through ==
    /// Serves the snapshot according to its freshness band, recomputing
    /// via `recompute` where the band requires it.
    ///
    /// A stale read returns the pre-refresh value; the scheduled refresh
    /// runs detached and must not delay the caller. A failed synchronous
    /// recompute falls back to any stored snapshot; the recompute error
    /// propagates only when no snapshot exists at all.
    pub async fn read_through<F, Fut>(&self, recompute: F) -> Result<Served<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = Utc::now();

        if let Some(snapshot) = self.load().await {
            match self.classify(&snapshot, now) {
                Freshness::Fresh => {
                    debug!(key = %self.key, "serving fresh snapshot");
                    return Ok(Served {
                        data: snapshot.data,
                        refresh: None,
                    });
                }
                Freshness::Stale => {
                    debug!(key = %self.key, "serving stale snapshot, refreshing in background");
                    let handle = crate::tasks::spawn_snapshot_refresh(self.clone(), recompute);
                    return Ok(Served {
                        data: snapshot.data,
                        refresh: Some(handle),
                    });
                }
                Freshness::Expired => {
                    debug!(key = %self.key, "snapshot expired, recomputing");
                }
            }
        }

        match recompute().await {
            Ok(data) => {
                if let Err(e) = self.store(data.clone()).await {
                    warn!(key = %self.key, "snapshot write failed: {}", e);
                }
                Ok(Served {
                    data,
                    refresh: None,
                })
            }
            Err(e) => {
                // Recompute failed; an even-older snapshot beats an error.
                if let Some(snapshot) = self.load().await {
                    warn!(key = %self.key, "recompute failed, serving stale snapshot: {}", e);
                    return Ok(Served {
                        data: snapshot.data,
                        refresh: None,
                    });
                }
                Err(e)
            }
        }
    }
}
