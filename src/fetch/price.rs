//! SOL price lookup with a provider fallback chain
//!
//! Jupiter (keyed) is tried first, then CryptoCompare, then CoinGecko.
//! The first provider returning a usable positive value wins. When every
//! provider fails the chain returns 0.0, which callers must treat as
//! "price unknown" rather than a true reading.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{send_with_retry, RetryPolicy};

const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
const JUPITER_PRICE_URL: &str = "https://api.jup.ag/price/v3";
const CRYPTOCOMPARE_URL: &str = "https://min-api.cryptocompare.com/data/price?fsym=SOL&tsyms=USD";
const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3/simple/price?ids=solana&vs_currencies=usd";

#[derive(Debug, Deserialize)]
struct JupiterPriceEntry {
    #[serde(rename = "usdPrice")]
    usd_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CryptoCompareResponse {
    #[serde(rename = "USD")]
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoResponse {
    solana: Option<CoinGeckoPrice>,
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    usd: Option<f64>,
}

// == Price Chain ==
#[derive(Debug, Clone)]
pub struct PriceChain {
    client: Client,
    jup_api_key: String,
    policy: RetryPolicy,
}

impl PriceChain {
    pub fn new(client: Client, jup_api_key: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            jup_api_key: jup_api_key.into(),
            policy,
        }
    }

    /// Current SOL/USD price, or 0.0 when every provider fails.
    pub async fn sol_price_usd(&self) -> f64 {
        if let Some(price) = self.from_jupiter().await {
            return price;
        }
        if let Some(price) = self.from_cryptocompare().await {
            return price;
        }
        if let Some(price) = self.from_coingecko().await {
            return price;
        }

        warn!("all price providers failed, reporting unknown price");
        0.0
    }

    async fn from_jupiter(&self) -> Option<f64> {
        let request = self
            .client
            .get(format!("{}?ids={}", JUPITER_PRICE_URL, SOL_MINT))
            .header("x-api-key", &self.jup_api_key);

        let response = send_with_retry(request, &self.policy).await.ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "jupiter price lookup failed");
            return None;
        }

        let prices: HashMap<String, JupiterPriceEntry> = response.json().await.ok()?;
        prices
            .get(SOL_MINT)
            .and_then(|entry| entry.usd_price)
            .filter(|p| *p > 0.0)
    }

    async fn from_cryptocompare(&self) -> Option<f64> {
        let request = self.client.get(CRYPTOCOMPARE_URL);
        let response = send_with_retry(request, &self.policy).await.ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "cryptocompare price lookup failed");
            return None;
        }

        let parsed: CryptoCompareResponse = response.json().await.ok()?;
        parsed.usd.filter(|p| *p > 0.0)
    }

    async fn from_coingecko(&self) -> Option<f64> {
        let request = self.client.get(COINGECKO_URL);
        let response = send_with_retry(request, &self.policy).await.ok()?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "coingecko price lookup failed");
            return None;
        }

        let parsed: CoinGeckoResponse = response.json().await.ok()?;
        parsed
            .solana
            .and_then(|entry| entry.usd)
            .filter(|p| *p > 0.0)
    }
}
