//! Configuration Module
//!
//! Handles loading and managing relay configuration from environment variables.

use std::env;

/// Relay configuration parameters.
///
/// Credentials have no defaults and load as empty strings when unset; the
/// affected upstream calls then fail and the fallback paths take over.
/// All tunables can be configured via environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,

    /// OpenAI API key for name generation and recipe condensing
    pub openai_api_key: String,
    /// Chat model used for LLM calls
    pub openai_model: String,
    /// Spoonacular API key for recipe search
    pub spoonacular_api_key: String,
    /// Incinerator stats API key (Authorization header)
    pub cinder_api_key: String,
    /// Incinerator stats API base URL
    pub cinder_api_base: String,
    /// Jupiter price API key (x-api-key header)
    pub jup_api_key: String,

    /// Cuisines to pick from at random for recipe requests
    pub cuisines: Vec<String>,

    /// Names fetched per background refill batch
    pub names_batch_size: usize,
    /// Remaining-pool threshold that triggers a background refill
    pub names_low_water: usize,
    /// Names served per request
    pub names_per_request: usize,
    /// Maximum length of the advisory recent-names list
    pub max_recent_names: usize,
    /// Recipes fetched per batch when the pool is exhausted
    pub recipes_batch_size: usize,

    /// Seconds a metrics snapshot is served without any refresh
    pub metrics_fresh_ttl: u64,
    /// Seconds a metrics snapshot is still served while refreshing in background
    pub metrics_stale_ttl: u64,

    /// Retries per upstream call (total attempts = retries + 1)
    pub fetch_retries: u32,
    /// Per-attempt timeout in milliseconds
    pub fetch_timeout_ms: u64,
    /// Linear backoff base in milliseconds between attempts
    pub fetch_backoff_ms: u64,
}

const DEFAULT_CUISINES: &str =
    "african,asian,american,british,cajun,caribbean,chinese,french,greek,indian,\
     italian,japanese,korean,mexican,middle eastern,spanish,thai,vietnamese";

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `OPENAI_API_KEY`, `SPOONACULAR_API_KEY`, `CINDER_API_KEY`,
    ///   `JUP_API_KEY` - upstream credentials (default: empty)
    /// - `OPENAI_MODEL` - chat model (default: gpt-5.2-chat-latest)
    /// - `CINDER_API_BASE` - stats API base URL
    /// - `CUISINES` - comma-separated cuisine list
    /// - `NAMES_BATCH_SIZE` (20), `NAMES_LOW_WATER` (8),
    ///   `NAMES_PER_REQUEST` (4), `MAX_RECENT_NAMES` (50),
    ///   `RECIPES_BATCH_SIZE` (10)
    /// - `METRICS_FRESH_TTL` (300), `METRICS_STALE_TTL` (3600) - seconds
    /// - `FETCH_RETRIES` (2), `FETCH_TIMEOUT_MS` (8000),
    ///   `FETCH_BACKOFF_MS` (100)
    pub fn from_env() -> Self {
        Self {
            server_port: env_parsed("SERVER_PORT", 3000),
            openai_api_key: env_string("OPENAI_API_KEY", ""),
            openai_model: env_string("OPENAI_MODEL", "gpt-5.2-chat-latest"),
            spoonacular_api_key: env_string("SPOONACULAR_API_KEY", ""),
            cinder_api_key: env_string("CINDER_API_KEY", ""),
            cinder_api_base: env_string("CINDER_API_BASE", "https://sol-incinerator.dev/api"),
            jup_api_key: env_string("JUP_API_KEY", ""),
            cuisines: parse_cuisines(&env_string("CUISINES", DEFAULT_CUISINES)),
            names_batch_size: env_parsed("NAMES_BATCH_SIZE", 20),
            names_low_water: env_parsed("NAMES_LOW_WATER", 8),
            names_per_request: env_parsed("NAMES_PER_REQUEST", 4),
            max_recent_names: env_parsed("MAX_RECENT_NAMES", 50),
            recipes_batch_size: env_parsed("RECIPES_BATCH_SIZE", 10),
            metrics_fresh_ttl: env_parsed("METRICS_FRESH_TTL", 300),
            metrics_stale_ttl: env_parsed("METRICS_STALE_TTL", 3600),
            fetch_retries: env_parsed("FETCH_RETRIES", 2),
            fetch_timeout_ms: env_parsed("FETCH_TIMEOUT_MS", 8000),
            fetch_backoff_ms: env_parsed("FETCH_BACKOFF_MS", 100),
        }
    }

    /// Refills may grow a pool past its working size under sustained low
    /// traffic, so appends are capped at twice the batch size.
    pub fn names_max_pool(&self) -> usize {
        self.names_batch_size * 2
    }

    /// See [`Config::names_max_pool`].
    pub fn recipes_max_pool(&self) -> usize {
        self.recipes_batch_size * 2
    }
}

fn parse_cuisines(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            openai_api_key: String::new(),
            openai_model: "gpt-5.2-chat-latest".to_string(),
            spoonacular_api_key: String::new(),
            cinder_api_key: String::new(),
            cinder_api_base: "https://sol-incinerator.dev/api".to_string(),
            jup_api_key: String::new(),
            cuisines: parse_cuisines(DEFAULT_CUISINES),
            names_batch_size: 20,
            names_low_water: 8,
            names_per_request: 4,
            max_recent_names: 50,
            recipes_batch_size: 10,
            metrics_fresh_ttl: 300,
            metrics_stale_ttl: 3600,
            fetch_retries: 2,
            fetch_timeout_ms: 8000,
            fetch_backoff_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.names_batch_size, 20);
        assert_eq!(config.names_low_water, 8);
        assert_eq!(config.metrics_fresh_ttl, 300);
        assert_eq!(config.metrics_stale_ttl, 3600);
        assert_eq!(config.names_max_pool(), 40);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("SERVER_PORT");
        env::remove_var("NAMES_BATCH_SIZE");
        env::remove_var("CUISINES");

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.names_batch_size, 20);
        assert!(config.cuisines.contains(&"italian".to_string()));
    }

    #[test]
    fn test_parse_cuisines_trims_and_drops_empties() {
        let cuisines = parse_cuisines(" italian , thai ,, mexican ");
        assert_eq!(cuisines, vec!["italian", "thai", "mexican"]);
    }
}
