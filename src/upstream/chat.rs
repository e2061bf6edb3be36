//! OpenAI chat-completion wire types and call helper
//!
//! Shared by the name generator and the recipe condenser.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::fetch::{send_with_retry, RetryPolicy};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

/// Runs one chat completion and returns the assistant message content.
///
/// Errors cover HTTP rejection, an error object in the body, and empty
/// content; callers decide what fallback applies.
pub(super) async fn chat_completion(
    client: &Client,
    api_key: &str,
    model: &str,
    prompt: &str,
    max_completion_tokens: u32,
    policy: &RetryPolicy,
) -> Result<String> {
    let body = ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: prompt,
        }],
        max_completion_tokens,
    };

    let request = client
        .post(CHAT_COMPLETIONS_URL)
        .bearer_auth(api_key)
        .json(&body);

    let response = send_with_retry(request, policy).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RelayError::Upstream(format!(
            "chat completion returned {}: {}",
            status, body
        )));
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| RelayError::MalformedPayload(format!("chat response: {}", e)))?;

    if let Some(usage) = &parsed.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "chat tokens used"
        );
    }

    if let Some(error) = parsed.error {
        return Err(RelayError::Upstream(format!("chat API error: {}", error.message)));
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(RelayError::MalformedPayload("empty chat content".to_string()));
    }

    Ok(content)
}
