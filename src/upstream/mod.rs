//! Upstream Sources
//!
//! Domain-specific clients for the third-party APIs, each behind a trait
//! so handlers and tests can swap in doubles. The shared HTTP plumbing
//! (retry, timeout, JSON extraction) lives in `fetch`.

mod chat;
mod incinerator;
mod names;
mod recipes;

pub use incinerator::CinderSource;
pub use names::{fallback_names, OpenAiNames};
pub use recipes::SpoonacularSource;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FormattedRecipe, IncineratorSnapshot, NameEntry, Recipe};

/// Generates name/meaning pairs, biased away from `avoid`.
///
/// Implementations are expected to degrade internally (static dataset)
/// rather than fail; an `Err` means even the degraded path is gone.
#[async_trait]
pub trait NameSource: Send + Sync {
    async fn generate(&self, count: usize, avoid: &[String]) -> Result<Vec<NameEntry>>;
}

/// Fetches recipe batches and condenses single recipes for display.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Fetches up to `count` random recipes for a cuisine. An upstream
    /// rejection yields an empty batch, not an error.
    async fn fetch_batch(&self, cuisine: &str, count: usize) -> Result<Vec<Recipe>>;

    /// Condenses a recipe into display fields. Never fails: a broken LLM
    /// path falls back to deterministic local formatting.
    async fn condense(&self, recipe: &Recipe, requested_cuisine: &str) -> FormattedRecipe;
}

/// Recomputes the full incinerator metrics snapshot from upstream.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn compute(&self) -> Result<IncineratorSnapshot>;
}
