//! Scheme LLM Provider Layer
//!
//! Pluggable reasoning providers for the extraction pipeline.
//!
//! # Architecture
//!
//! This crate provides implementations of the `ReasoningProvider` trait from
//! `scheme-domain`. Every provider shares a [`UsageStats`] accumulator so
//! token counts stay correct when attempts run concurrently.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic scripted provider for testing
//! - `OpenRouterProvider`: OpenAI-compatible chat completions over HTTP
//!
//! # Examples
//!
//! ```
//! use scheme_llm::MockProvider;
//! use scheme_domain::{GenerationParams, Message, ReasoningProvider};
//!
//! let provider = MockProvider::new(r#"{"schemes": []}"#);
//! let result = provider
//!     .complete(&[Message::user("hi")], &GenerationParams::default())
//!     .unwrap();
//! assert_eq!(result, r#"{"schemes": []}"#);
//! ```

#![warn(missing_docs)]

pub mod openrouter;
pub mod usage;

use scheme_domain::{GenerationParams, Message, ReasoningProvider, TransportFailure, UsageSnapshot};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

pub use openrouter::OpenRouterProvider;
pub use usage::UsageStats;

/// Errors that can occur during LLM operations
///
/// All variants are transport failures from the pipeline's point of view.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Request did not complete within the configured timeout
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response envelope from the provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

impl TransportFailure for LlmError {
    fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Timeout(_))
    }
}

/// One scripted mock reply
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(LlmError),
}

/// Mock provider for deterministic testing
///
/// Replies are served from a FIFO script; once the script is exhausted every
/// call gets the default response. All calls are recorded so tests can
/// inspect the prompts each stage sent.
///
/// # Examples
///
/// ```
/// use scheme_llm::{LlmError, MockProvider};
/// use scheme_domain::{GenerationParams, Message, ReasoningProvider};
///
/// let provider = MockProvider::new("fallback")
///     .with_responses(["first", "second"]);
/// provider.push_error(LlmError::Timeout(30));
///
/// let params = GenerationParams::default();
/// let msgs = [Message::user("x")];
/// assert_eq!(provider.complete(&msgs, &params).unwrap(), "first");
/// assert_eq!(provider.complete(&msgs, &params).unwrap(), "second");
/// assert!(provider.complete(&msgs, &params).is_err());
/// assert_eq!(provider.complete(&msgs, &params).unwrap(), "fallback");
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    script: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
    usage: Arc<UsageStats>,
    model_name: String,
}

impl MockProvider {
    /// Create a MockProvider answering every call with `response`
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            usage: Arc::new(UsageStats::new()),
            model_name: "mock".to_string(),
        }
    }

    /// Queue scripted responses, served in order
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for response in responses {
            self.push_response(response);
        }
        self
    }

    /// Set the reported model name
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Queue one scripted response
    pub fn push_response(&self, response: impl Into<String>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(MockReply::Text(response.into()));
    }

    /// Queue one scripted failure
    pub fn push_error(&self, error: LlmError) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(MockReply::Fail(error));
    }

    /// Number of times `complete` was called, failures included
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Messages of every call so far, in call order
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

/// Rough token estimate for mock usage accounting
fn approx_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

impl ReasoningProvider for MockProvider {
    type Error = LlmError;

    fn complete(&self, messages: &[Message], _params: &GenerationParams) -> Result<String, Self::Error> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());

        let reply = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        let text = match reply {
            Some(MockReply::Fail(e)) => return Err(e),
            Some(MockReply::Text(text)) => text,
            None => self.default_response.clone(),
        };

        let prompt_tokens: u64 = messages.iter().map(|m| approx_tokens(&m.content)).sum();
        let completion_tokens = approx_tokens(&text);
        self.usage
            .record(prompt_tokens, completion_tokens, prompt_tokens + completion_tokens);

        Ok(text)
    }

    fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(provider: &MockProvider) -> Result<String, LlmError> {
        provider.complete(&[Message::user("prompt")], &GenerationParams::default())
    }

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        assert_eq!(call(&provider).unwrap(), "Test response");
    }

    #[test]
    fn test_mock_provider_script_order() {
        let provider = MockProvider::default().with_responses(["one", "two"]);
        assert_eq!(call(&provider).unwrap(), "one");
        assert_eq!(call(&provider).unwrap(), "two");
        assert_eq!(call(&provider).unwrap(), "Default mock response");
    }

    #[test]
    fn test_mock_provider_error() {
        let provider = MockProvider::default();
        provider.push_error(LlmError::Timeout(5));
        provider.push_error(LlmError::Communication("reset".to_string()));

        let first = call(&provider).unwrap_err();
        assert!(first.is_timeout());
        let second = call(&provider).unwrap_err();
        assert!(!second.is_timeout());
    }

    #[test]
    fn test_mock_provider_records_calls_and_usage() {
        let provider = MockProvider::new("abcdefgh");
        call(&provider).unwrap();
        provider.push_error(LlmError::RateLimitExceeded);
        let _ = call(&provider);

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls()[0][0].content, "prompt");

        // Failed calls are not counted as completed usage
        let usage = provider.usage();
        assert_eq!(usage.call_count, 1);
        assert_eq!(usage.completion_tokens, 2);
    }

    #[test]
    fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();
        call(&provider1).unwrap();
        assert_eq!(provider2.call_count(), 1);
        assert_eq!(provider2.usage().call_count, 1);
    }
}
