//! Scripted language model for tests and offline runs.
//!
//! Replies are chosen by checking whether the prompt contains a registered
//! substring; the first matching rule wins. Every prompt is recorded so tests can
//! assert on what was sent.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use super::{LanguageModel, LlmError};

#[derive(Debug, Clone)]
enum FakeReply {
    Text(String),
    Failure(LlmError),
}

#[derive(Debug, Clone)]
struct FakeRule {
    needle: String,
    reply: FakeReply,
    delay: Option<Duration>,
}

/// A language model returning canned replies
#[derive(Debug, Default)]
pub struct FakeLanguageModel {
    rules: Vec<FakeRule>,
    default_reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeLanguageModel {
    /// Create a model with no rules; unmatched prompts fail with a parse error
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to prompts containing `needle`
    pub fn with_response(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push(FakeRule {
            needle: needle.to_string(),
            reply: FakeReply::Text(reply.to_string()),
            delay: None,
        });
        self
    }

    /// Reply with `reply` to prompts containing `needle`, after `delay`
    pub fn with_delayed_response(mut self, needle: &str, reply: &str, delay: Duration) -> Self {
        self.rules.push(FakeRule {
            needle: needle.to_string(),
            reply: FakeReply::Text(reply.to_string()),
            delay: Some(delay),
        });
        self
    }

    /// Fail prompts containing `needle` with `error`
    pub fn with_failure(mut self, needle: &str, error: LlmError) -> Self {
        self.rules.push(FakeRule {
            needle: needle.to_string(),
            reply: FakeReply::Failure(error),
            delay: None,
        });
        self
    }

    /// Reply used when no rule matches
    pub fn with_default_response(mut self, reply: &str) -> Self {
        self.default_reply = Some(reply.to_string());
        self
    }

    /// Prompts received so far, in arrival order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of prompts received so far
    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        let rule = self.rules.iter().find(|rule| prompt.contains(&rule.needle));
        match rule {
            Some(rule) => {
                if let Some(delay) = rule.delay {
                    tokio::time::sleep(delay).await;
                }
                match &rule.reply {
                    FakeReply::Text(text) => Ok(text.clone()),
                    FakeReply::Failure(error) => Err(error.clone()),
                }
            }
            None => self
                .default_reply
                .clone()
                .ok_or_else(|| LlmError::Parse("no scripted reply for prompt".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}
