//! Incinerator metrics snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregate computed from the incinerator stats feeds plus the SOL price.
///
/// This is the record the snapshot cache persists; the shaper turns it
/// into formatted merge variables. `sol_price` of 0.0 means "unknown"
/// (every price provider failed), never an actual reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncineratorSnapshot {
    pub sol_price: f64,
    pub total_sol_reclaimed: f64,
    pub total_transactions: i64,
    pub total_users: i64,
    pub total_fees_sol: f64,
    pub current_month_fees_sol: f64,
    pub prev_month_fees_sol: f64,
    pub monthly_new_transactions: i64,
    pub monthly_new_users: i64,
    /// Last 12 complete weeks of fees as (M/D label, fee USD) pairs.
    pub weekly_chart: Vec<(String, i64)>,
    pub computed_at: DateTime<Utc>,
    /// Raw upstream readings, exposed on the `/api` route for debugging.
    pub raw: Value,
}
