//! Configuration for the Extractor

use crate::error::ExtractorError;
use scheme_domain::GenerationParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How an attempt talks to the reasoning provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Seven ordered reasoning stages
    Staged,
    /// One system prompt, one completion
    SingleShot,
}

impl Default for ExtractionMode {
    fn default() -> Self {
        ExtractionMode::Staged
    }
}

/// Ordering of classification rule groups that match the same content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest group in the rule table wins
    FirstMatch,
    /// Group with the most distinct keyword hits wins; table order breaks ties
    MostKeywords,
}

impl Default for TieBreak {
    fn default() -> Self {
        TieBreak::FirstMatch
    }
}

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Staged pipeline or single-shot prompt
    pub mode: ExtractionMode,

    /// Upper bound of the assembled context (characters)
    pub max_context_chars: usize,

    /// Context window for key-facts extraction (characters from the start)
    pub facts_window: usize,

    /// Context window for classification
    pub classification_window: usize,

    /// Context window for date and financial text
    pub text_window: usize,

    /// Start of the window assumed to hold tabular data
    pub table_window_start: usize,

    /// End of the window assumed to hold tabular data
    pub table_window_end: usize,

    /// Context slice appended after the stage summary in full assembly
    pub assembly_window: usize,

    /// Maximum time for a single provider call (seconds)
    pub stage_timeout_secs: u64,

    /// Sampling temperature passed to the provider
    pub temperature: f32,

    /// Maximum completion size passed to the provider
    pub max_output_tokens: u32,

    /// Keep the stage trace on the result
    pub audit: bool,

    /// Confidence used when neither the record nor stage 7 supplies one
    pub default_confidence: f64,

    /// Classification tie-break between matching rule groups
    pub tie_break: TieBreak,

    /// Accept enum values regardless of casing and separators
    pub case_insensitive_enums: bool,

    /// Concurrent attempts in batch extraction
    pub max_concurrent_attempts: usize,
}

impl ExtractorConfig {
    /// Get the per-call timeout as a Duration
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    /// Generation parameters for every provider call
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_output_tokens,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExtractorError> {
        let fail = |msg: &str| Err(ExtractorError::Config(msg.to_string()));

        if self.max_context_chars == 0 {
            return fail("max_context_chars must be greater than 0");
        }
        if self.facts_window == 0 || self.classification_window == 0 || self.text_window == 0 {
            return fail("stage windows must be greater than 0");
        }
        if self.table_window_start >= self.table_window_end {
            return fail("table_window_start must be less than table_window_end");
        }
        if self.assembly_window == 0 {
            return fail("assembly_window must be greater than 0");
        }
        if self.stage_timeout_secs == 0 {
            return fail("stage_timeout_secs must be greater than 0");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return fail("temperature must be within [0.0, 2.0]");
        }
        if self.max_output_tokens == 0 {
            return fail("max_output_tokens must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return fail("default_confidence must be within [0.0, 1.0]");
        }
        if self.max_concurrent_attempts == 0 {
            return fail("max_concurrent_attempts must be greater than 0");
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Staged,
            max_context_chars: 12_000,
            facts_window: 8_000,
            classification_window: 5_000,
            text_window: 6_000,
            table_window_start: 6_000,
            table_window_end: 12_000,
            assembly_window: 10_000,
            stage_timeout_secs: 120,
            temperature: 0.0,
            max_output_tokens: 4_000,
            audit: false,
            default_confidence: 0.5,
            tie_break: TieBreak::FirstMatch,
            case_insensitive_enums: true,
            max_concurrent_attempts: 4,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: one call per email, tighter windows
    pub fn aggressive() -> Self {
        Self {
            mode: ExtractionMode::SingleShot,
            max_context_chars: 8_000,
            facts_window: 6_000,
            classification_window: 4_000,
            text_window: 4_000,
            table_window_start: 4_000,
            table_window_end: 8_000,
            assembly_window: 8_000,
            stage_timeout_secs: 60,
            max_output_tokens: 2_000,
            ..Self::default()
        }
    }

    /// Lenient preset: staged pipeline, longer timeouts, full audit trace
    pub fn lenient() -> Self {
        Self {
            stage_timeout_secs: 300,
            max_output_tokens: 8_000,
            audit: true,
            tie_break: TieBreak::MostKeywords,
            max_concurrent_attempts: 2,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExtractorError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ExtractorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExtractorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractorConfig::aggressive().validate().is_ok());
        assert!(ExtractorConfig::lenient().validate().is_ok());
        assert_eq!(ExtractorConfig::aggressive().mode, ExtractionMode::SingleShot);
        assert!(ExtractorConfig::lenient().audit);
    }

    #[test]
    fn test_invalid_table_window() {
        let mut config = ExtractorConfig::default();
        config.table_window_start = config.table_window_end;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_default_confidence() {
        let mut config = ExtractorConfig::default();
        config.default_confidence = 1.5;
        assert!(matches!(config.validate(), Err(ExtractorError::Config(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::lenient();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml("mode = \"single_shot\"\naudit = true\n").unwrap();
        assert_eq!(parsed.mode, ExtractionMode::SingleShot);
        assert!(parsed.audit);
        assert_eq!(parsed.max_context_chars, 12_000);
    }

    #[test]
    fn test_generation_params() {
        let params = ExtractorConfig::default().generation_params();
        assert_eq!(params.max_tokens, 4_000);
        assert_eq!(params.temperature, 0.0);
    }
}
