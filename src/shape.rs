//! Response Shaper
//!
//! Pure functions mapping domain records into the flat merge-variable
//! objects the display widget consumes. No I/O happens here.

use chrono::FixedOffset;
use serde_json::{json, Value};

use crate::error::{RelayError, Result};
use crate::models::{FormattedRecipe, IncineratorSnapshot, NameEntry, Recipe};

// == Names ==
/// Flattens four names into `name1..name4` / `meaning1..meaning4`.
pub fn flatten_names(names: &[NameEntry]) -> Result<Value> {
    if names.len() < 4 {
        return Err(RelayError::NoData(format!(
            "needed 4 names, have {}",
            names.len()
        )));
    }

    let mut flat = serde_json::Map::new();
    for (i, entry) in names.iter().take(4).enumerate() {
        flat.insert(format!("name{}", i + 1), json!(entry.name));
        flat.insert(format!("meaning{}", i + 1), json!(entry.meaning));
    }
    Ok(Value::Object(flat))
}

// == Recipes ==
/// Merge variables for one condensed recipe.
///
/// The image URL is rebuilt at the largest resolution Spoonacular hosts
/// (636x393) from the recipe id, falling back to whatever image URL the
/// API returned.
pub fn shape_recipe(formatted: &FormattedRecipe, recipe: &Recipe) -> Value {
    let image_url = if recipe.id > 0 {
        format!("https://img.spoonacular.com/recipes/{}-636x393.jpg", recipe.id)
    } else {
        recipe.image.clone().unwrap_or_default()
    };

    json!({
        "title": non_empty_or(&formatted.title, &recipe.title),
        "cuisine": &formatted.cuisine,
        "cook_time": non_empty_or(&formatted.cook_time, "Time unknown"),
        "ingredients": &formatted.ingredients,
        "instructions": &formatted.instructions,
        "image_url": image_url,
    })
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

// == Incinerator Metrics ==
/// Merge variables for the metrics snapshot, formatted the way the
/// display template expects (K/M suffixes, `$` prefixes, fixed decimals).
pub fn shape_metrics(snapshot: &IncineratorSnapshot) -> Value {
    let total_sol_usd = snapshot.total_sol_reclaimed * snapshot.sol_price;
    let total_fees_usd = snapshot.total_fees_sol * snapshot.sol_price;
    let current_month_fees_usd = snapshot.current_month_fees_sol * snapshot.sol_price;
    let prev_month_fees_usd = snapshot.prev_month_fees_sol * snapshot.sol_price;

    let avg_sol_per_user = if snapshot.total_users > 0 {
        snapshot.total_sol_reclaimed / snapshot.total_users as f64
    } else {
        0.0
    };
    let avg_sol_per_tx = if snapshot.total_transactions > 0 {
        snapshot.total_sol_reclaimed / snapshot.total_transactions as f64
    } else {
        0.0
    };

    let chart: Vec<Value> = snapshot
        .weekly_chart
        .iter()
        .map(|(label, usd)| json!([label, usd]))
        .collect();

    json!({
        "sol_price": format!("{:.2}", snapshot.sol_price),
        "sol_price_formatted": format_usd(snapshot.sol_price),
        "total_sol_reclaimed": format_sol(snapshot.total_sol_reclaimed),
        "total_sol_reclaimed_raw": format!("{:.2}", snapshot.total_sol_reclaimed),
        "total_sol_reclaimed_usd": format_usd(total_sol_usd),
        "total_sol_reclaimed_usd_raw": format!("{:.2}", total_sol_usd),
        "total_users": format_number(snapshot.total_users),
        "total_users_raw": snapshot.total_users,
        "total_transactions": format_number(snapshot.total_transactions),
        "total_transactions_raw": snapshot.total_transactions,
        "total_fees_sol": format_sol(snapshot.total_fees_sol),
        "total_fees_sol_raw": format!("{:.4}", snapshot.total_fees_sol),
        "total_fees_usd": format_usd(total_fees_usd),
        "total_fees_usd_raw": format!("{:.2}", total_fees_usd),
        "monthly_fees_sol": format_sol(snapshot.current_month_fees_sol),
        "monthly_fees_sol_raw": format!("{:.4}", snapshot.current_month_fees_sol),
        "monthly_fees_usd": format_usd(current_month_fees_usd),
        "monthly_fees_usd_raw": format!("{:.2}", current_month_fees_usd),
        "prev_month_fees_sol": format_sol(snapshot.prev_month_fees_sol),
        "prev_month_fees_usd": format_usd(prev_month_fees_usd),
        "monthly_new_users": format_number(snapshot.monthly_new_users),
        "monthly_new_users_raw": snapshot.monthly_new_users,
        "monthly_new_transactions": format_number(snapshot.monthly_new_transactions),
        "monthly_new_transactions_raw": snapshot.monthly_new_transactions,
        "avg_sol_per_user": format!("{:.4}", avg_sol_per_user),
        "avg_sol_per_user_display": format_sol(avg_sol_per_user),
        "avg_sol_per_tx": format!("{:.6}", avg_sol_per_tx),
        "updated_at": snapshot.computed_at.to_rfc3339(),
        "updated_display": format_display_time(snapshot),
        "weekly_profit_chart_data": serde_json::to_string(&chart).unwrap_or_default(),
    })
}

fn format_sol(sol: f64) -> String {
    if sol >= 1_000_000.0 {
        format!("{:.2}M", sol / 1_000_000.0)
    } else if sol >= 1_000.0 {
        format!("{:.2}K", sol / 1_000.0)
    } else if sol >= 1.0 {
        format!("{:.2}", sol)
    } else {
        format!("{:.4}", sol)
    }
}

fn format_usd(usd: f64) -> String {
    if usd >= 1_000_000.0 {
        format!("${:.2}M", usd / 1_000_000.0)
    } else if usd >= 1_000.0 {
        format!("${:.2}K", usd / 1_000.0)
    } else {
        format!("${:.2}", usd)
    }
}

fn format_number(n: i64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Display timestamp in US Eastern standard time. A fixed UTC-5 offset
/// stands in for the tz database; the field is cosmetic and DST drift
/// is accepted.
fn format_display_time(snapshot: &IncineratorSnapshot) -> String {
    let eastern = FixedOffset::west_opt(5 * 3600).expect("valid fixed offset");
    snapshot
        .computed_at
        .with_timezone(&eastern)
        .format("%b %-d, %-I:%M %p")
        .to_string()
}
