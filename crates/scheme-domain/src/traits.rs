//! Trait definitions for external interactions
//!
//! These traits define the boundary between the extraction pipeline and the
//! language-model transport. Implementations live in `scheme-llm`.

use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation
    System,
    /// Input supplied by the pipeline
    User,
    /// Prior model output
    Assistant,
}

/// One `(role, content)` pair sent to a reasoning provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message author
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// System message
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Generation parameters for one completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum completion size in tokens
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4000,
        }
    }
}

/// Cumulative token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Prompt tokens consumed
    pub prompt_tokens: u64,
    /// Completion tokens produced
    pub completion_tokens: u64,
    /// Total tokens as reported by the provider
    pub total_tokens: u64,
    /// Number of completed calls
    pub call_count: u64,
}

impl UsageSnapshot {
    /// Usage accrued between `earlier` and `self`
    pub fn since(&self, earlier: &UsageSnapshot) -> UsageSnapshot {
        UsageSnapshot {
            prompt_tokens: self.prompt_tokens.saturating_sub(earlier.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_sub(earlier.completion_tokens),
            total_tokens: self.total_tokens.saturating_sub(earlier.total_tokens),
            call_count: self.call_count.saturating_sub(earlier.call_count),
        }
    }
}

/// Classifies provider failures
///
/// Every provider failure is a transport failure; timeouts must be
/// distinguishable from the rest.
pub trait TransportFailure {
    /// Whether the failure was a timeout
    fn is_timeout(&self) -> bool;
}

/// Trait for text-completion backends
///
/// Implemented by the infrastructure layer (scheme-llm). Calls are blocking
/// request-response; usage accumulation must tolerate concurrent callers.
pub trait ReasoningProvider {
    /// Error type for provider operations
    type Error: TransportFailure + std::fmt::Display;

    /// Complete an ordered list of messages
    fn complete(&self, messages: &[Message], params: &GenerationParams) -> Result<String, Self::Error>;

    /// Cumulative usage since the provider was created
    fn usage(&self) -> UsageSnapshot;

    /// Model identifier for metadata
    fn model_name(&self) -> &str;
}
