//! # Language Model Module
//!
//! Abstraction over the text-generation service used to parse recipes, suggest
//! categories and select products. The service is a black box: it receives a
//! prompt and answers with text expected to contain JSON.
//!
//! - [`AnthropicClient`]: Anthropic Messages API client with retries and a circuit breaker
//! - [`FakeLanguageModel`]: scripted, offline model for tests and dry runs
//! - [`parse_json_reply`]: JSON extraction from free-form model replies

mod anthropic;
mod fake;
mod json;

pub use anthropic::{calculate_retry_delay, AnthropicClient};
pub use fake::FakeLanguageModel;
pub use json::{extract_json, parse_json_reply};

use async_trait::async_trait;
use std::fmt;

/// Errors raised while talking to the language model
#[derive(Debug, Clone, PartialEq)]
pub enum LlmError {
    /// The request could not be sent or its body could not be read
    Request(String),
    /// The API answered with an error status
    Api { status: u16, message: String },
    /// The API asked us to slow down
    RateLimited { retry_after_secs: Option<u64> },
    /// The reply did not contain the expected JSON
    Parse(String),
    /// The client is missing required settings
    NotConfigured(String),
    /// Too many consecutive failures, calls are failing fast
    CircuitOpen,
}

impl LlmError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Request(msg) => write!(f, "Model request failed: {msg}"),
            LlmError::Api { status, message } => {
                write!(f, "Model API returned {status}: {message}")
            }
            LlmError::RateLimited { retry_after_secs } => match retry_after_secs {
                Some(secs) => write!(f, "Model rate limited, retry after {secs}s"),
                None => write!(f, "Model rate limited"),
            },
            LlmError::Parse(msg) => write!(f, "Unreadable model reply: {msg}"),
            LlmError::NotConfigured(msg) => write!(f, "Model not configured: {msg}"),
            LlmError::CircuitOpen => write!(f, "Model circuit breaker is open"),
        }
    }
}

impl std::error::Error for LlmError {}

/// A text-generation service
///
/// Implementations must be thread-safe: one instance is shared by every
/// concurrent ingredient pipeline.
#[async_trait]
pub trait LanguageModel: Send + Sync + fmt::Debug {
    /// Send a prompt and return the model's text reply
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}
