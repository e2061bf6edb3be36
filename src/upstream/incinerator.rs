//! Incinerator stats aggregation
//!
//! Five stats feeds are fetched concurrently (any failure fails the whole
//! recompute, which the snapshot cache then rescues with stale data where
//! it can) and folded into one [`IncineratorSnapshot`], alongside the SOL
//! price from the provider fallback chain.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::info;

use super::MetricsSource;
use crate::error::{RelayError, Result};
use crate::fetch::{send_with_retry, PriceChain, RetryPolicy};
use crate::models::IncineratorSnapshot;

const CHART_WEEKS: usize = 12;
/// Weeks with at most this much in fees are treated as incomplete and
/// excluded from the chart.
const MIN_COMPLETE_WEEK_SOL: f64 = 1.0;

#[derive(Debug, Deserialize)]
struct TotalSolResponse {
    #[serde(rename = "totalSolReclaimed")]
    total_sol_reclaimed: String,
}

/// A point in the stats time series. Upstream is loose about both the
/// date field name and the value type (string or number).
#[derive(Debug, Clone, Deserialize)]
struct TimeSeriesPoint {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    date: Option<String>,
    value: Value,
}

impl TimeSeriesPoint {
    fn value_f64(&self) -> f64 {
        match &self.value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// M/D chart label from whichever date field is present.
    fn label(&self) -> String {
        let raw = self.date.as_deref().or(self.timestamp.as_deref()).unwrap_or("");

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return format!("{}/{}", dt.format("%-m"), dt.format("%-d"));
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return format!("{}/{}", date.format("%-m"), date.format("%-d"));
        }
        "?".to_string()
    }
}

fn last_value(series: &[TimeSeriesPoint]) -> f64 {
    series.last().map(TimeSeriesPoint::value_f64).unwrap_or(0.0)
}

fn second_last_value(series: &[TimeSeriesPoint]) -> f64 {
    match series.len() {
        0 | 1 => 0.0,
        n => series[n - 2].value_f64(),
    }
}

// == Cinder Source ==
pub struct CinderSource {
    client: Client,
    api_base: String,
    api_key: String,
    price: PriceChain,
    policy: RetryPolicy,
}

impl CinderSource {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        price: PriceChain,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            api_key: api_key.into(),
            price,
            policy,
        }
    }

    async fn get_stats<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self
            .client
            .get(format!("{}{}", self.api_base, path))
            .header("Authorization", &self.api_key);

        let response = send_with_retry(request, &self.policy).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Upstream(format!("{} returned {}", path, status)));
        }

        response
            .json()
            .await
            .map_err(|e| RelayError::MalformedPayload(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl MetricsSource for CinderSource {
    async fn compute(&self) -> Result<IncineratorSnapshot> {
        info!("recomputing incinerator snapshot");

        let (sol_price, stats) = tokio::join!(self.price.sol_price_usd(), async {
            tokio::try_join!(
                self.get_stats::<TotalSolResponse>("/stats/totalSolReclaimed"),
                self.get_stats::<Vec<TimeSeriesPoint>>("/stats/charts/monthly/fees"),
                self.get_stats::<Vec<TimeSeriesPoint>>("/stats/charts/weekly/fees"),
                self.get_stats::<Vec<TimeSeriesPoint>>("/stats/cumulativeTransactions"),
                self.get_stats::<Vec<TimeSeriesPoint>>("/stats/charts/monthly/cumulative_users"),
            )
        });
        let (total_sol, monthly_fees, weekly_fees, cumulative_tx, cumulative_users) = stats?;

        build_snapshot(
            &total_sol,
            &monthly_fees,
            &weekly_fees,
            &cumulative_tx,
            &cumulative_users,
            sol_price,
        )
    }
}

/// Pure aggregation of the upstream readings into a snapshot.
fn build_snapshot(
    total_sol: &TotalSolResponse,
    monthly_fees: &[TimeSeriesPoint],
    weekly_fees: &[TimeSeriesPoint],
    cumulative_tx: &[TimeSeriesPoint],
    cumulative_users: &[TimeSeriesPoint],
    sol_price: f64,
) -> Result<IncineratorSnapshot> {
    let total_sol_reclaimed: f64 = total_sol.total_sol_reclaimed.parse().map_err(|_| {
        RelayError::MalformedPayload(format!(
            "unparsable totalSolReclaimed: {}",
            total_sol.total_sol_reclaimed
        ))
    })?;

    let total_transactions = last_value(cumulative_tx) as i64;
    let total_users = last_value(cumulative_users) as i64;
    let prev_month_transactions = second_last_value(cumulative_tx) as i64;
    let prev_month_users = second_last_value(cumulative_users) as i64;

    let total_fees_sol: f64 = monthly_fees.iter().map(TimeSeriesPoint::value_f64).sum();
    let current_month_fees_sol = last_value(monthly_fees);
    let prev_month_fees_sol = second_last_value(monthly_fees);

    let weekly_chart: Vec<(String, i64)> = weekly_fees
        .iter()
        .filter(|point| point.value_f64() > MIN_COMPLETE_WEEK_SOL)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .take(CHART_WEEKS)
        .rev()
        .map(|point| {
            let usd = point.value_f64() * sol_price;
            (point.label(), usd.round() as i64)
        })
        .collect();

    Ok(IncineratorSnapshot {
        sol_price,
        total_sol_reclaimed,
        total_transactions,
        total_users,
        total_fees_sol,
        current_month_fees_sol,
        prev_month_fees_sol,
        monthly_new_transactions: total_transactions - prev_month_transactions,
        monthly_new_users: total_users - prev_month_users,
        weekly_chart,
        computed_at: Utc::now(),
        raw: json!({
            "totalSolReclaimed": total_sol.total_sol_reclaimed,
            "latestTransactions": total_transactions,
            "latestUsers": total_users,
            "totalFeesSol": total_fees_sol,
            "solPrice": sol_price,
            "monthlyFeesCount": monthly_fees.len(),
        }),
    })
}
