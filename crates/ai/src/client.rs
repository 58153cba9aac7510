//! LLM client for Gemini-style `generateContent` endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Default timeout of one LLM call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A text-in, text-out language model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single user prompt and return the trimmed reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Connection settings for the LLM endpoint.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Model endpoint; `:generateContent` is appended
    pub api_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model name, reported in logs
    pub model: String,
    /// Per-call HTTP timeout
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.example.com/ai".to_string(),
            api_key: String::new(),
            model: "gemini-pro".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AiConfig {
    /// Read `AI_API_URL`, `AI_API_KEY`, `AI_MODEL` and `AI_TIMEOUT_SECS`,
    /// keeping defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("AI_API_URL").unwrap_or(defaults.api_url),
            api_key: std::env::var("AI_API_KEY").unwrap_or(defaults.api_key),
            model: std::env::var("AI_MODEL").unwrap_or(defaults.model),
            timeout: timeout_secs(std::env::var("AI_TIMEOUT_SECS").ok().as_deref())
                .unwrap_or(defaults.timeout),
        }
    }
}

/// A positive number of seconds.
fn timeout_secs(raw: Option<&str>) -> Option<Duration> {
    raw?.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Message recorded on the task when the provider rejects a call.
fn rejected_message(status: reqwest::StatusCode) -> String {
    format!("AI service is temporarily unavailable (status {})", status.as_u16())
}

/// Client for Gemini-style `generateContent` APIs.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: AiConfig,
}

impl GeminiClient {
    /// Create a new client.
    pub fn new(config: AiConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}:generateContent", self.config.api_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Pull the first candidate's first text part out of a reply.
fn reply_text(response: GenerateResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .map(|text| text.trim().to_string())
        .context("invalid AI response format")
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
        });

        debug!(model = %self.config.model, prompt_len = prompt.len(), "Calling LLM");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .context("AI service is temporarily unavailable")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(%status, error = %error_text, "LLM call rejected");
            anyhow::bail!(rejected_message(status));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse AI response")?;

        reply_text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: serde_json::Value) -> Result<String> {
        reply_text(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn test_reply_text_takes_first_part() {
        let text = parse(json!({
            "candidates": [
                {"content": {"parts": [{"text": "  FADE IN.\n"}, {"text": "ignored"}]}},
                {"content": {"parts": [{"text": "second candidate"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(text, "FADE IN.");
    }

    #[test]
    fn test_reply_without_candidates_is_invalid() {
        let err = parse(json!({"candidates": []})).unwrap_err();
        assert_eq!(err.to_string(), "invalid AI response format");

        let err = parse(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap_err();
        assert_eq!(err.to_string(), "invalid AI response format");
    }

    #[test]
    fn test_reply_without_parts_is_invalid() {
        assert!(parse(json!({"candidates": [{"content": {"parts": []}}]})).is_err());
        assert!(parse(json!({"candidates": [{"finishReason": "STOP"}]})).is_err());
    }

    #[test]
    fn test_rejection_hides_provider_body() {
        let message = rejected_message(reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(message, "AI service is temporarily unavailable (status 429)");
    }

    #[test]
    fn test_timeout_secs() {
        assert_eq!(timeout_secs(Some("30")), Some(Duration::from_secs(30)));
        assert_eq!(timeout_secs(Some(" 5 ")), Some(Duration::from_secs(5)));
        assert_eq!(timeout_secs(Some("0")), None);
        assert_eq!(timeout_secs(Some("soon")), None);
        assert_eq!(timeout_secs(None), None);
    }

    #[test]
    fn test_endpoint_appends_method() {
        let client = GeminiClient::new(AiConfig {
            api_url: "https://llm.local/v1/models/gemini-pro/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://llm.local/v1/models/gemini-pro:generateContent"
        );
    }
}
