//! Cache Manager Module
//!
//! The read-through caching core, in two shapes:
//! - [`ItemPool`]: a FIFO pool of pre-fetched items consumed from the front,
//!   refilled in the background when it runs low.
//! - [`SnapshotCache`]: a single aggregate snapshot with fresh/stale/expired
//!   freshness bands and a last-resort stale fallback.
//!
//! Both operate on shared KV keys without locks; correctness under
//! concurrent requests comes from read-modify-write discipline, with
//! last-writer-wins races accepted (worst case is a duplicate upstream
//! fetch or a few lost pooled items).

mod pool;
mod recent;
mod snapshot;

pub use pool::{ItemPool, PoolInfo, PooledBatch, TakeOutcome};
pub use recent::RecentList;
pub use snapshot::{Freshness, Served, SnapshotCache, StoredSnapshot};
