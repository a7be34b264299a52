//! OpenRouter Provider Implementation
//!
//! Provides integration with OpenRouter's OpenAI-compatible chat completions
//! API. Any endpoint speaking the same `/chat/completions` shape works.
//!
//! # Features
//!
//! - Async HTTP communication with a blocking `ReasoningProvider` wrapper
//! - Configurable endpoint, model and timeout
//! - Timeouts reported distinctly from other transport failures
//! - Token usage accumulated from the response `usage` block
//!
//! # Examples
//!
//! ```no_run
//! use scheme_llm::OpenRouterProvider;
//!
//! let provider = OpenRouterProvider::new("sk-or-...", "qwen/qwen3-next-80b-a3b-instruct")
//!     .unwrap();
//! ```

use crate::{LlmError, UsageStats};
use scheme_domain::{GenerationParams, Message, ReasoningProvider, UsageSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Default OpenRouter API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen/qwen3-next-80b-a3b-instruct";

/// Default timeout for LLM requests (120 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// OpenRouter chat-completions provider
///
/// No retries are attempted: a failed or timed-out request is reported once
/// and the caller decides what to do with the attempt.
pub struct OpenRouterProvider {
    endpoint: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
    client: reqwest::Client,
    usage: Arc<UsageStats>,
}

/// Request body for the chat completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

/// Response from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider
    ///
    /// # Parameters
    ///
    /// - `api_key`: OpenRouter API key
    /// - `model`: Model identifier (e.g., "qwen/qwen3-next-80b-a3b-instruct")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
            usage: Arc::new(UsageStats::new()),
        })
    }

    /// Point the provider at another OpenAI-compatible endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Result<Self, LlmError> {
        self.client = build_client(timeout_secs)?;
        self.timeout_secs = timeout_secs;
        Ok(self)
    }

    /// Complete a conversation using the chat completions API
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The request times out (`LlmError::Timeout`)
    /// - The model is unknown (`LlmError::ModelNotAvailable`)
    /// - The provider rate-limits the key (`LlmError::RateLimitExceeded`)
    /// - Network communication fails or the envelope is malformed
    pub async fn chat(&self, messages: &[Message], params: &GenerationParams) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.endpoint);

        let request_body = ChatRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!("Calling {} with model {}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenRouter returned HTTP {}", status);
            return Err(LlmError::Communication(format!("HTTP {}: {}", status, error_text)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response has no choices".to_string()))?;

        let usage = chat.usage.unwrap_or_default();
        self.usage
            .record(usage.prompt_tokens, usage.completion_tokens, usage.total_tokens);

        info!(
            "LLM response received: {} chars, tokens: {}",
            text.len(),
            usage.total_tokens
        );

        Ok(text)
    }

    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            error!("OpenRouter API timeout after {}s", self.timeout_secs);
            LlmError::Timeout(self.timeout_secs)
        } else {
            error!("OpenRouter API request failed: {}", e);
            LlmError::Communication(format!("Request failed: {}", e))
        }
    }
}

impl ReasoningProvider for OpenRouterProvider {
    type Error = LlmError;

    fn complete(&self, messages: &[Message], params: &GenerationParams) -> Result<String, Self::Error> {
        // Blocking wrapper: reuse the ambient runtime from a blocking thread,
        // or spin up a private one when called outside tokio.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(self.chat(messages, params)),
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LlmError::Other(format!("Failed to start runtime: {}", e)))?
                .block_on(self.chat(messages, params)),
        }
    }

    fn usage(&self) -> UsageSnapshot {
        self.usage.snapshot()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
