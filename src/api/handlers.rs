//! API Handlers
//!
//! One handler family per upstream feed, each in two flavors: the default
//! route returns flat merge variables for the display widget, the `/api`
//! route adds raw payloads and cache internals for debugging.

use std::sync::Arc;

use axum::{extract::State, Json};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::info;

use crate::cache::{ItemPool, RecentList, SnapshotCache};
use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::fetch::{PriceChain, RetryPolicy};
use crate::kv::{KvStore, MemoryKv};
use crate::models::{IncineratorSnapshot, NameEntry, Recipe};
use crate::shape;
use crate::tasks;
use crate::upstream::{
    CinderSource, MetricsSource, NameSource, OpenAiNames, RecipeSource, SpoonacularSource,
};

// KV keys, one per cached feed plus the advisory recent list.
const NAMES_CACHE_KEY: &str = "names_cache";
const RECENT_NAMES_KEY: &str = "recent_names";
const RECIPES_CACHE_KEY: &str = "recipe_cache";
const METRICS_CACHE_KEY: &str = "sol-incinerator-data";

/// Application state shared across all handlers.
///
/// The KV store and the upstream sources sit behind trait objects so
/// tests can swap in doubles without touching the handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub names: Arc<dyn NameSource>,
    pub recipes: Arc<dyn RecipeSource>,
    pub metrics: Arc<dyn MetricsSource>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        kv: Arc<dyn KvStore>,
        names: Arc<dyn NameSource>,
        recipes: Arc<dyn RecipeSource>,
        metrics: Arc<dyn MetricsSource>,
        config: Config,
    ) -> Self {
        Self {
            kv,
            names,
            recipes,
            metrics,
            config: Arc::new(config),
        }
    }

    /// Wires up the real upstream clients and the in-memory KV binding.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();
        let policy = RetryPolicy::from_config(config);

        let names = OpenAiNames::new(
            client.clone(),
            &config.openai_api_key,
            &config.openai_model,
            policy.clone(),
        );
        let recipes = SpoonacularSource::new(
            client.clone(),
            &config.spoonacular_api_key,
            &config.openai_api_key,
            &config.openai_model,
            policy.clone(),
        );
        let price = PriceChain::new(client.clone(), &config.jup_api_key, policy.clone());
        let metrics = CinderSource::new(
            client,
            &config.cinder_api_base,
            &config.cinder_api_key,
            price,
            policy,
        );

        Self::new(
            Arc::new(MemoryKv::new()),
            Arc::new(names),
            Arc::new(recipes),
            Arc::new(metrics),
            config.clone(),
        )
    }

    fn names_pool(&self) -> ItemPool<NameEntry> {
        ItemPool::new(
            Arc::clone(&self.kv),
            NAMES_CACHE_KEY,
            self.config.names_max_pool(),
        )
    }

    fn recipes_pool(&self) -> ItemPool<Recipe> {
        ItemPool::new(
            Arc::clone(&self.kv),
            RECIPES_CACHE_KEY,
            self.config.recipes_max_pool(),
        )
    }

    fn recent_names(&self) -> RecentList {
        RecentList::new(
            Arc::clone(&self.kv),
            RECENT_NAMES_KEY,
            self.config.max_recent_names,
        )
    }

    fn metrics_cache(&self) -> SnapshotCache<IncineratorSnapshot> {
        SnapshotCache::new(
            Arc::clone(&self.kv),
            METRICS_CACHE_KEY,
            self.config.metrics_fresh_ttl,
            self.config.metrics_stale_ttl,
        )
    }
}

// == Health ==
/// Handler for GET /health
pub async fn health_handler() -> &'static str {
    "OK"
}

// == Names ==
/// Handler for GET /names
pub async fn names_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    serve_names(&state, false).await
}

/// Handler for GET /names/api
pub async fn names_api_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    serve_names(&state, true).await
}

async fn serve_names(state: &AppState, debug: bool) -> Result<Json<Value>> {
    let recent_list = state.recent_names();
    let recent = recent_list.load().await;
    let pool = state.names_pool();

    let source = Arc::clone(&state.names);
    let avoid = recent.clone();
    let outcome = pool
        .take_or_fetch(state.config.names_per_request, move |shortfall| async move {
            source.generate(shortfall, &avoid).await
        })
        .await?;

    // Low-water policy: refill in the background, never on the response path.
    if outcome.remaining < state.config.names_low_water {
        info!(
            remaining = outcome.remaining,
            "names pool low, scheduling background refill"
        );
        let _refill = tasks::spawn_names_refill(
            pool.clone(),
            Arc::clone(&state.names),
            recent_list.clone(),
            state.config.names_batch_size,
            recent.clone(),
        );
    }

    let served: Vec<String> = outcome.items.iter().map(|n| n.name.clone()).collect();
    recent_list.remember(&served, recent.clone()).await;

    if debug {
        return Ok(Json(json!({
            "names": outcome.items,
            "recent_names": recent,
            "cache_info": pool.info().await,
            "raw": true,
        })));
    }

    Ok(Json(shape::flatten_names(&outcome.items)?))
}

// == Recipes ==
/// Handler for GET /recipes
pub async fn recipes_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    serve_recipe(&state, false).await
}

/// Handler for GET /recipes/api
pub async fn recipes_api_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    serve_recipe(&state, true).await
}

async fn serve_recipe(state: &AppState, debug: bool) -> Result<Json<Value>> {
    let cuisine = state
        .config
        .cuisines
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| "american".to_string());

    let pool = state.recipes_pool();
    let source = Arc::clone(&state.recipes);
    let batch_size = state.config.recipes_batch_size;
    let batch_cuisine = cuisine.clone();

    // One recipe per request; an exhausted pool triggers a synchronous
    // batch fetch whose surplus refills the pool for future requests.
    let outcome = pool
        .take_or_fetch(1, move |_shortfall| async move {
            source.fetch_batch(&batch_cuisine, batch_size).await
        })
        .await?;

    let recipe = outcome
        .items
        .into_iter()
        .next()
        .ok_or_else(|| RelayError::NoData("failed to fetch recipe".to_string()))?;

    let formatted = state.recipes.condense(&recipe, &cuisine).await;
    let mut shaped = shape::shape_recipe(&formatted, &recipe);

    if debug {
        if let Value::Object(map) = &mut shaped {
            map.insert("raw_recipe".to_string(), serde_json::to_value(&recipe)?);
            map.insert("cache_info".to_string(), json!(pool.info().await));
        }
    }

    Ok(Json(shaped))
}

// == Incinerator Metrics ==
/// Handler for GET /incinerator
pub async fn incinerator_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    serve_metrics(&state, false).await
}

/// Handler for GET /incinerator/api
pub async fn incinerator_api_handler(State(state): State<AppState>) -> Result<Json<Value>> {
    serve_metrics(&state, true).await
}

async fn serve_metrics(state: &AppState, debug: bool) -> Result<Json<Value>> {
    let cache = state.metrics_cache();
    let source = Arc::clone(&state.metrics);

    let served = cache
        .read_through(move || async move { source.compute().await })
        .await?;

    let mut shaped = shape::shape_metrics(&served.data);
    if debug {
        if let Value::Object(map) = &mut shaped {
            map.insert("raw".to_string(), served.data.raw.clone());
        }
    }

    Ok(Json(shaped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FormattedRecipe;
    use async_trait::async_trait;
    use chrono::Utc;

    struct StaticNames {
        per_call: usize,
    }

    #[async_trait]
    impl NameSource for StaticNames {
        async fn generate(&self, count: usize, _avoid: &[String]) -> Result<Vec<NameEntry>> {
            let n = self.per_call.max(count);
            Ok((0..n)
                .map(|i| NameEntry::new(format!("Gen{}", i), "meaning"))
                .collect())
        }
    }

    struct StaticRecipes;

    #[async_trait]
    impl RecipeSource for StaticRecipes {
        async fn fetch_batch(&self, _cuisine: &str, count: usize) -> Result<Vec<Recipe>> {
            Ok((0..count)
                .map(|i| {
                    serde_json::from_value(json!({
                        "id": i + 1,
                        "title": format!("Recipe {}", i + 1),
                    }))
                    .unwrap()
                })
                .collect())
        }

        async fn condense(&self, recipe: &Recipe, requested_cuisine: &str) -> FormattedRecipe {
            FormattedRecipe {
                title: recipe.title.clone(),
                cuisine: requested_cuisine.to_string(),
                cook_time: "30 min".to_string(),
                ingredients: "stub".to_string(),
                instructions: "stub".to_string(),
            }
        }
    }

    struct StaticMetrics;

    #[async_trait]
    impl MetricsSource for StaticMetrics {
        async fn compute(&self) -> Result<IncineratorSnapshot> {
            Ok(IncineratorSnapshot {
                sol_price: 100.0,
                total_sol_reclaimed: 1000.0,
                total_transactions: 10,
                total_users: 5,
                total_fees_sol: 1.0,
                current_month_fees_sol: 0.5,
                prev_month_fees_sol: 0.5,
                monthly_new_transactions: 1,
                monthly_new_users: 1,
                weekly_chart: vec![],
                computed_at: Utc::now(),
                raw: json!({"stub": true}),
            })
        }
    }

    fn test_state() -> AppState {
        AppState::new(
            Arc::new(MemoryKv::new()),
            Arc::new(StaticNames { per_call: 0 }),
            Arc::new(StaticRecipes),
            Arc::new(StaticMetrics),
            Config::default(),
        )
    }

    #[tokio::test]
    async fn test_names_handler_serves_four() {
        let response = names_handler(State(test_state())).await.unwrap();
        assert_eq!(response.0["name1"], "Gen0");
        assert_eq!(response.0["name4"], "Gen3");
    }

    #[tokio::test]
    async fn test_names_api_handler_includes_debug_fields() {
        let response = names_api_handler(State(test_state())).await.unwrap();
        assert_eq!(response.0["raw"], true);
        assert!(response.0["names"].is_array());
        assert!(response.0.get("recent_names").is_some());
    }

    #[tokio::test]
    async fn test_recipes_handler_shapes_first_of_batch() {
        let response = recipes_handler(State(test_state())).await.unwrap();
        assert_eq!(response.0["title"], "Recipe 1");
        assert_eq!(response.0["cook_time"], "30 min");
    }

    #[tokio::test]
    async fn test_incinerator_handler_serves_merge_variables() {
        let response = incinerator_handler(State(test_state())).await.unwrap();
        assert_eq!(response.0["total_sol_reclaimed"], "1.00K");
        assert!(response.0.get("raw").is_none());

        let response = incinerator_api_handler(State(test_state())).await.unwrap();
        assert_eq!(response.0["raw"]["stub"], true);
    }

    #[tokio::test]
    async fn test_health_handler() {
        assert_eq!(health_handler().await, "OK");
    }
}
