//! Token-candidate source abstraction and implementations.
//!
//! Defines the [`TokenSource`] trait and concrete implementations:
//! - **[`DisabledSource`]** — returns errors; used when no provider is configured.
//! - **[`OpenAiSource`]** — calls an OpenAI-compatible chat completions
//!   endpoint for one token at a time with top-logprob candidates.
//!
//! A source answers one question: given the text so far, which tokens could
//! come next and how likely are they? The grammar never reaches into the
//! source; the driver owns the seam between the two.
//!
//! # Provider Selection
//!
//! Use [`create_source`] to instantiate the appropriate source based on the
//! configuration. The `url` setting points `openai` at any server speaking
//! the chat completions protocol with logprobs (vLLM, llama.cpp, Ollama's
//! OpenAI endpoint).
//!
//! # Retry Strategy
//!
//! The OpenAI source uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::models::CandidateToken;

/// Instruction prepended to every request so the model stays in
/// JSON-producing mode regardless of the caller's prompt.
const SYSTEM_PROMPT: &str = "You are a JSON generator. Generate valid JSON only.";

/// A source of ranked next-token candidates.
///
/// Must return at least one candidate whenever the underlying model has any
/// continuation; an empty response is treated by the driver exactly like
/// "no valid candidates."
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4-turbo"`).
    fn model_name(&self) -> &str;

    /// Candidate continuations of `prefix` with their log-probabilities,
    /// most probable first.
    async fn next_candidates(&self, prefix: &str) -> Result<Vec<CandidateToken>>;
}

// ============ Disabled Source ============

/// A no-op token source that always returns errors.
///
/// Used when `provider.provider = "disabled"` in the configuration.
pub struct DisabledSource;

#[async_trait]
impl TokenSource for DisabledSource {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn next_candidates(&self, _prefix: &str) -> Result<Vec<CandidateToken>> {
        bail!("Token provider is disabled")
    }
}

// ============ OpenAI-compatible Source ============

/// Token source backed by an OpenAI-compatible chat completions endpoint.
///
/// Each call requests exactly one completion token with
/// `logprobs: true, top_logprobs: n`, and the returned top-logprob list
/// becomes the candidate set. Requires the `OPENAI_API_KEY` environment
/// variable to be set.
pub struct OpenAiSource {
    /// Model name (e.g. `"gpt-4-turbo"`).
    model: String,
    /// Base URL of the API (default `https://api.openai.com`).
    url: String,
    temperature: f64,
    top_logprobs: u32,
    timeout_secs: u64,
    max_retries: u32,
}

impl OpenAiSource {
    /// Create a new OpenAI-compatible source from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config, or if
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("provider.model required for OpenAI source"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        // Verify API key is available
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            url,
            temperature: config.temperature,
            top_logprobs: config.top_logprobs,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl TokenSource for OpenAiSource {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn next_candidates(&self, prefix: &str) -> Result<Vec<CandidateToken>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prefix },
            ],
            "max_tokens": 1,
            "n": 1,
            "temperature": self.temperature,
            "logprobs": true,
            "top_logprobs": self.top_logprobs,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/v1/chat/completions", self.url))
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Completions API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Completions API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Token request failed after retries")))
    }
}

/// Parse a chat completions response into the candidate list.
///
/// Extracts `choices[0].logprobs.content[0].top_logprobs[]`, preserving the
/// API's ranking order. A response with an empty `content` list (the model
/// had no continuation) yields an empty candidate set.
fn parse_completion_response(json: &serde_json::Value) -> Result<Vec<CandidateToken>> {
    let choices = json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid completions response: missing choices array"))?;

    let first = choices
        .first()
        .ok_or_else(|| anyhow::anyhow!("Invalid completions response: empty choices array"))?;

    let content = first
        .get("logprobs")
        .and_then(|l| l.get("content"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid completions response: missing logprobs content"))?;

    let Some(position) = content.first() else {
        return Ok(Vec::new());
    };

    let top = position
        .get("top_logprobs")
        .and_then(|t| t.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid completions response: missing top_logprobs"))?;

    let mut candidates = Vec::with_capacity(top.len());

    for item in top {
        let text = item
            .get("token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid completions response: missing token text"))?;
        let logprob = item
            .get("logprob")
            .and_then(|l| l.as_f64())
            .unwrap_or(f64::NEG_INFINITY);

        candidates.push(CandidateToken::new(text, logprob));
    }

    Ok(candidates)
}

/// Create the appropriate [`TokenSource`] based on configuration.
///
/// # Supported Providers
///
/// | Config Value | Source |
/// |-------------|--------|
/// | `"disabled"` | [`DisabledSource`] |
/// | `"openai"` | [`OpenAiSource`] |
///
/// # Errors
///
/// Returns an error for unknown provider names or if the source cannot be
/// initialized (missing model or API key).
pub fn create_source(config: &ProviderConfig) -> Result<Box<dyn TokenSource>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledSource)),
        "openai" => Ok(Box::new(OpenAiSource::new(config)?)),
        other => bail!("Unknown token provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completion_response() {
        let json = serde_json::json!({
            "choices": [{
                "logprobs": {
                    "content": [{
                        "token": "{",
                        "logprob": -0.1,
                        "top_logprobs": [
                            { "token": "{", "logprob": -0.1 },
                            { "token": "[", "logprob": -2.0 },
                            { "token": " ", "logprob": -3.5 },
                        ]
                    }]
                }
            }]
        });

        let candidates = parse_completion_response(&json).unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].text, "{");
        assert_eq!(candidates[0].logprob, -0.1);
        assert_eq!(candidates[1].text, "[");
        assert_eq!(candidates[2].text, " ");
    }

    #[test]
    fn test_parse_empty_content_yields_no_candidates() {
        let json = serde_json::json!({
            "choices": [{ "logprobs": { "content": [] } }]
        });

        let candidates = parse_completion_response(&json).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_parse_missing_logprobs_is_error() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "{}" } }]
        });

        assert!(parse_completion_response(&json).is_err());
    }

    #[test]
    fn test_create_source_disabled() {
        let config = ProviderConfig::default();
        let source = create_source(&config).unwrap();
        assert_eq!(source.model_name(), "disabled");
    }

    #[test]
    fn test_create_source_unknown_provider() {
        let config = ProviderConfig {
            provider: "oracle".to_string(),
            ..ProviderConfig::default()
        };
        assert!(create_source(&config).is_err());
    }

    #[test]
    fn test_openai_source_requires_model() {
        let config = ProviderConfig {
            provider: "openai".to_string(),
            ..ProviderConfig::default()
        };
        assert!(OpenAiSource::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_source_errors() {
        let result = DisabledSource.next_candidates("prefix").await;
        assert!(result.is_err());
    }
}
