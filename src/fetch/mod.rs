//! Upstream Fetcher
//!
//! Outbound HTTP plumbing shared by every upstream client: bounded retry
//! with linear backoff and a per-attempt timeout, plus a tolerant JSON
//! extractor for LLM responses that wrap their payload in prose.

mod price;

pub use price::PriceChain;

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{RelayError, Result};

// == Retry Policy ==
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = retries + 1).
    pub retries: u32,
    /// Per-attempt timeout; the only cancellation mechanism for a fetch.
    pub timeout: Duration,
    /// Linear backoff base: the wait before attempt n is `base * n`.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            timeout: Duration::from_millis(8000),
            backoff_base: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.fetch_retries,
            timeout: Duration::from_millis(config.fetch_timeout_ms),
            backoff_base: Duration::from_millis(config.fetch_backoff_ms),
        }
    }
}

// == Send With Retry ==
/// Sends a request up to `retries + 1` times.
///
/// A non-2xx response is retried, but once attempts run out the last
/// response is returned as-is so the caller can inspect the status; only
/// transport-level failure (timeout, connection refused) of the final
/// attempt becomes an error.
pub async fn send_with_retry(request: RequestBuilder, policy: &RetryPolicy) -> Result<Response> {
    for attempt in 0..=policy.retries {
        let builder = request
            .try_clone()
            .ok_or_else(|| RelayError::Upstream("request body is not retryable".to_string()))?;

        match builder.timeout(policy.timeout).send().await {
            Ok(response) if response.status().is_success() || attempt == policy.retries => {
                return Ok(response);
            }
            Ok(response) => {
                debug!(
                    status = %response.status(),
                    attempt,
                    "upstream returned non-success, retrying"
                );
            }
            Err(e) => {
                if attempt == policy.retries {
                    return Err(RelayError::Upstream(e.to_string()));
                }
                warn!(attempt, "upstream request failed, retrying: {}", e);
            }
        }

        tokio::time::sleep(policy.backoff_base * (attempt + 1)).await;
    }

    // Loop always returns on the final attempt.
    unreachable!("retry loop exhausted without returning")
}

// == JSON Extraction ==
/// Returns the first balanced JSON object or array substring, tolerating
/// leading and trailing prose or markdown fences around it.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_extract_json_plain_object() {
        let text = r#"{"names": [{"name": "Luke"}]}"#;
        assert_eq!(extract_json(text), Some(text));
    }

    #[test]
    fn test_extract_json_with_surrounding_prose() {
        let text = "Sure! Here are your names:\n```json\n{\"names\": []}\n```\nEnjoy!";
        assert_eq!(extract_json(text), Some(r#"{"names": []}"#));
    }

    #[test]
    fn test_extract_json_nested_braces_in_strings() {
        let text = r#"prefix {"note": "braces } inside \" strings", "n": 1} suffix"#;
        let extracted = extract_json(text).unwrap();
        let parsed: Value = serde_json::from_str(extracted).unwrap();
        assert_eq!(parsed["n"], 1);
    }

    #[test]
    fn test_extract_json_array() {
        let text = "data: [1, 2, [3]] trailing";
        assert_eq!(extract_json(text), Some("[1, 2, [3]]"));
    }

    #[test]
    fn test_extract_json_unbalanced_returns_none() {
        assert_eq!(extract_json(r#"{"broken": true"#), None);
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryPolicy::from_config(&Config::default());
        assert_eq!(policy.retries, 2);
        assert_eq!(policy.timeout, Duration::from_millis(8000));
        assert_eq!(policy.backoff_base, Duration::from_millis(100));
    }
}
