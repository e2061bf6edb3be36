//! Merge Relay - a read-through cache in front of slow upstream feeds
//!
//! Reshapes third-party API payloads into flat merge variable sets for a
//! display widget, hiding upstream latency behind pooled and snapshot caches.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod kv;
pub mod models;
pub mod shape;
pub mod tasks;
pub mod upstream;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{RelayError, Result};
