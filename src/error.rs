//! Error types for the relay
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Relay Error Enum ==
/// Unified error type for the relay service.
///
/// Most failures are recovered internally (stale cache, static fallbacks);
/// an error only reaches a client once every fallback path is exhausted.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Upstream API call failed at the transport level after retries
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Key-value store read or write failed
    #[error("Store error: {0}")]
    Store(String),

    /// Upstream responded but the payload was unusable
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Every data source (cache, upstream, static fallback) is exhausted
    #[error("No data available: {0}")]
    NoData(String),
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::MalformedPayload(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Any surfaced error means total fallback exhaustion, so everything
        // maps uniformly to 500 with a short message for the display client.
        let body = Json(json!({
            "error": self.to_string()
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the relay.
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RelayError::NoData("nothing cached".to_string());
        assert_eq!(err.to_string(), "No data available: nothing cached");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: RelayError = parse_err.into();
        assert!(matches!(err, RelayError::MalformedPayload(_)));
    }
}
