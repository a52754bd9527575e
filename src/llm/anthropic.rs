//! Anthropic Messages API client.

use async_trait::async_trait;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LanguageModel, LlmError};
use crate::circuit_breaker::CircuitBreaker;
use crate::matching_config::{LlmConfig, RecoveryConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Language model backed by the Anthropic Messages API
#[derive(Debug)]
pub struct AnthropicClient {
    api_key: String,
    config: LlmConfig,
    recovery: RecoveryConfig,
    breaker: CircuitBreaker,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl AnthropicClient {
    /// Create a client for the given API key
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NotConfigured`] when the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: &str, config: LlmConfig, recovery: RecoveryConfig) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured("ANTHROPIC_API_KEY is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LlmError::NotConfigured(format!("HTTP client: {e}")))?;
        let breaker = CircuitBreaker::new(&recovery);
        Ok(Self {
            api_key: api_key.trim().to_string(),
            config,
            recovery,
            breaker,
            client,
        })
    }

    async fn send_once(&self, prompt: &str) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if status != 200 {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api { status, message });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Parse(e.to_string()))?;
        parsed
            .content
            .into_iter()
            .find_map(|block| (block.block_type == "text").then_some(block.text).flatten())
            .ok_or_else(|| LlmError::Parse("no text block in model response".to_string()))
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        if self.breaker.is_open() {
            return Err(LlmError::CircuitOpen);
        }

        let mut attempt: u32 = 0;
        loop {
            match self.send_once(prompt).await {
                Ok(text) => {
                    self.breaker.record_success();
                    debug!("Model replied with {} characters", text.len());
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.recovery.max_retries => {
                    attempt += 1;
                    let mut delay_ms = calculate_retry_delay(attempt, &self.recovery);
                    if let LlmError::RateLimited {
                        retry_after_secs: Some(secs),
                    } = &e
                    {
                        delay_ms = delay_ms.max(secs.saturating_mul(1000));
                    }
                    warn!(
                        "Model call failed ({}), retry {}/{} in {}ms",
                        e, attempt, self.recovery.max_retries, delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    return Err(e);
                }
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Delay before retry number `attempt` (1-based): exponential backoff with jitter
///
/// The exponential part is capped at `max_retry_delay_ms`; up to a quarter of it
/// is added as random jitter.
pub fn calculate_retry_delay(attempt: u32, recovery: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    let backoff = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(recovery.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=backoff / 4);
    backoff + jitter
}
