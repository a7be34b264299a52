//! Error types for the Extractor

use thiserror::Error;

/// Errors that can occur during extraction
///
/// `Llm` and `Timeout` are transport failures and end the attempt.
/// `InvalidFormat` and `JsonParse` are recovered locally as empty results.
/// `Validation` drops a single record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Provider call exceeded its timeout
    #[error("Extraction timeout")]
    Timeout,

    /// Completion did not have the expected shape
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Mapped record violated the schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blocking task failed to join
    #[error("Task error: {0}")]
    Task(String),
}

impl ExtractorError {
    /// Whether this error ends the attempt
    pub fn is_transport(&self) -> bool {
        matches!(self, ExtractorError::Llm(_) | ExtractorError::Timeout)
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
