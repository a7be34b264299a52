//! Core Extractor implementation

use crate::config::{ExtractionMode, ExtractorConfig};
use crate::context::{ContextAssembler, ContextInput};
use crate::error::ExtractorError;
use crate::mapper::{SchemeMapper, StageDefaults};
use crate::parser::parse_completion;
use crate::prompt::PromptBuilder;
use crate::rules::ClassificationRules;
use crate::stages::StagePipeline;
use crate::types::{DroppedRecord, ExtractionMetadata, ExtractionRequest, ExtractionResult};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use scheme_domain::{
    aggregate_confidence, any_escalation, AttemptId, Message, Provenance, ReasoningProvider,
    SchemeRecord, StageArtifact, StageKind, TransportFailure,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// The Extractor turns one email into validated scheme records
pub struct Extractor<L>
where
    L: ReasoningProvider,
{
    provider: Arc<L>,
    config: ExtractorConfig,
    rules: ClassificationRules,
}

/// What one attempt produced before it is packaged into a result
struct Attempt {
    schemes: Vec<SchemeRecord>,
    dropped: Vec<DroppedRecord>,
    trace: Vec<StageArtifact>,
    failure: Option<ExtractorError>,
}

impl Attempt {
    fn failed(failure: ExtractorError, trace: Vec<StageArtifact>) -> Self {
        Self {
            schemes: Vec::new(),
            dropped: Vec::new(),
            trace,
            failure: Some(failure),
        }
    }
}

impl<L> Extractor<L>
where
    L: ReasoningProvider + Send + Sync + 'static,
{
    /// Create a new Extractor with the default rule table
    ///
    /// The configuration is used as given; see [`Extractor::try_new`] to
    /// reject an invalid one up front.
    pub fn new(provider: L, config: ExtractorConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("Extractor created with invalid configuration: {}", e);
        }
        Self {
            provider: Arc::new(provider),
            config,
            rules: ClassificationRules::default(),
        }
    }

    /// Create a new Extractor after validating `config`
    pub fn try_new(provider: L, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate()?;
        Ok(Self::new(provider, config))
    }

    /// Replace the classification rule table
    pub fn with_rules(mut self, rules: ClassificationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Active rule table
    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    /// The reasoning provider
    pub fn provider(&self) -> &L {
        &self.provider
    }

    /// Extract schemes, converting any failure into the terminal result
    ///
    /// Never fails. A transport failure yields zero schemes, confidence 0.0,
    /// `needs_escalation = true` and the error in `failure`.
    pub async fn extract(&self, request: ExtractionRequest) -> ExtractionResult {
        let (attempt, metadata) = self.run(&request).await;
        self.package(attempt, metadata)
    }

    /// Extract schemes, surfacing a transport failure as an error
    pub async fn try_extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ExtractionResult, ExtractorError> {
        let (attempt, metadata) = self.run(&request).await;
        if let Some(failure) = attempt.failure {
            return Err(failure);
        }
        Ok(self.package(attempt, metadata))
    }

    /// Run independent attempts concurrently, results in request order
    pub async fn extract_batch(&self, requests: Vec<ExtractionRequest>) -> Vec<ExtractionResult> {
        info!(
            "Starting batch of {} attempts ({} concurrent)",
            requests.len(),
            self.config.max_concurrent_attempts
        );
        stream::iter(requests.into_iter().map(|request| self.extract(request)))
            .buffered(self.config.max_concurrent_attempts.max(1))
            .collect()
            .await
    }

    fn package(&self, attempt: Attempt, metadata: ExtractionMetadata) -> ExtractionResult {
        let trace = self.config.audit.then_some(attempt.trace);
        match attempt.failure {
            Some(failure) => ExtractionResult::terminal(failure, trace, metadata),
            None => ExtractionResult {
                confidence: aggregate_confidence(&attempt.schemes),
                needs_escalation: any_escalation(&attempt.schemes),
                schemes: attempt.schemes,
                trace,
                failure: None,
                dropped: attempt.dropped,
                metadata,
            },
        }
    }

    async fn run(&self, request: &ExtractionRequest) -> (Attempt, ExtractionMetadata) {
        let attempt_id = AttemptId::new();
        let timestamp = Utc::now();
        let started = Instant::now();
        let usage_before = self.provider.usage();

        info!(
            "Attempt {} starting: '{}' ({} body chars, {} tables)",
            attempt_id,
            request.subject.chars().take(80).collect::<String>(),
            request.body.chars().count(),
            request.tables.len()
        );

        let context = ContextAssembler::new(self.config.max_context_chars)
            .assemble(&ContextInput::from(request));
        debug!("Assembled context: {} chars", context.chars().count());

        let mut provenance = Provenance::at(timestamp);
        if let Some(source) = &request.source_file {
            provenance = provenance.with_source_file(source.clone());
        }
        let mapper = SchemeMapper::new(provenance)
            .with_case_insensitive_enums(self.config.case_insensitive_enums)
            .with_fallback_confidence(self.config.default_confidence);

        let attempt = match self.config.mode {
            ExtractionMode::Staged => self.run_staged(&request.subject, &context, &mapper).await,
            ExtractionMode::SingleShot => {
                self.run_single_shot(&request.subject, &context, &mapper).await
            }
        };

        let metadata = ExtractionMetadata {
            attempt_id,
            source_file: request.source_file.clone(),
            timestamp,
            model_name: self.provider.model_name().to_string(),
            mode: self.config.mode,
            usage: self.provider.usage().since(&usage_before),
            processing_time_ms: started.elapsed().as_millis() as u64,
            stage_count: attempt.trace.len(),
        };

        match &attempt.failure {
            Some(e) => error!("Attempt {} failed after {} stages: {}", attempt_id, attempt.trace.len(), e),
            None => info!(
                "Attempt {} complete: {} schemes, {} dropped, {} tokens, {}ms",
                attempt_id,
                attempt.schemes.len(),
                attempt.dropped.len(),
                metadata.usage.total_tokens,
                metadata.processing_time_ms
            ),
        }

        (attempt, metadata)
    }

    async fn run_staged(&self, subject: &str, context: &str, mapper: &SchemeMapper) -> Attempt {
        let pipeline = StagePipeline::new(&self.config, &self.rules);
        let outcome = pipeline
            .run(subject, context, |stage, messages| self.call_llm(stage, messages))
            .await;

        if let Some(failure) = outcome.failure {
            return Attempt::failed(failure, outcome.trace);
        }

        let (schemes, dropped) =
            mapper.map_all(&outcome.state.assembled.schemes, &outcome.state.defaults());
        Attempt {
            schemes,
            dropped,
            trace: outcome.trace,
            failure: None,
        }
    }

    async fn run_single_shot(&self, subject: &str, context: &str, mapper: &SchemeMapper) -> Attempt {
        let prompts = PromptBuilder::new(&self.rules, self.config.tie_break);
        let raw = match self
            .call_llm(StageKind::Assembly, prompts.single_shot(subject, context))
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Attempt::failed(e, Vec::new()),
        };

        let parsed = parse_completion(&raw);
        let artifact = match &parsed.malformed {
            Some(e) => StageArtifact::recovered(StageKind::Assembly, json!({ "schemes": [] }), e.to_string()),
            None => StageArtifact::new(
                StageKind::Assembly,
                json!({ "schemes": parsed.schemes }),
                parsed.reasoning.clone().unwrap_or_default(),
            ),
        };

        let (schemes, dropped) = mapper.map_all(&parsed.schemes, &StageDefaults::default());
        Attempt {
            schemes,
            dropped,
            trace: vec![artifact],
            failure: None,
        }
    }

    /// Call the provider off the async runtime, bounded by the stage timeout
    async fn call_llm(&self, stage: StageKind, messages: Vec<Message>) -> Result<String, ExtractorError> {
        let provider = Arc::clone(&self.provider);
        let params = self.config.generation_params();

        // ReasoningProvider is blocking
        let task = tokio::task::spawn_blocking(move || {
            provider.complete(&messages, &params).map_err(|e| {
                if e.is_timeout() {
                    ExtractorError::Timeout
                } else {
                    ExtractorError::Llm(e.to_string())
                }
            })
        });

        let reply = timeout(self.config.stage_timeout(), task)
            .await
            .map_err(|_| {
                error!(
                    "Stage {} exceeded {}s timeout",
                    stage, self.config.stage_timeout_secs
                );
                ExtractorError::Timeout
            })?
            .map_err(|e| ExtractorError::Task(e.to_string()))??;

        debug!("Stage {} reply: {} chars", stage, reply.len());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheme_llm::MockProvider;

    fn create_test_extractor(response: &str) -> Extractor<MockProvider> {
        Extractor::new(MockProvider::new(response), ExtractorConfig::default())
    }

    #[tokio::test]
    async fn test_extract_empty_response() {
        let extractor = create_test_extractor(r#"{"schemes": []}"#);
        let result = extractor
            .extract(ExtractionRequest::new("Subject", "Some text"))
            .await;

        assert!(result.schemes.is_empty());
        assert!(!result.is_terminal());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.metadata.stage_count, 7);
        assert_eq!(extractor.provider().call_count(), 7);
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let config = ExtractorConfig {
            table_window_start: 12_000,
            table_window_end: 6_000,
            ..ExtractorConfig::default()
        };
        let result = Extractor::try_new(MockProvider::new("{}"), config);
        assert!(matches!(result, Err(ExtractorError::Config(_))));
        assert!(Extractor::try_new(MockProvider::new("{}"), ExtractorConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_inverted_table_window_does_not_panic() {
        let config = ExtractorConfig {
            table_window_start: 12_000,
            table_window_end: 6_000,
            ..ExtractorConfig::default()
        };
        let extractor = Extractor::new(MockProvider::new(r#"{"schemes": []}"#), config);
        let result = extractor
            .extract(ExtractionRequest::new("Subject", "x".repeat(20_000)))
            .await;

        assert!(!result.is_terminal());
        assert_eq!(result.metadata.stage_count, 7);
    }

    #[tokio::test]
    async fn test_metadata_usage_delta() {
        let extractor = create_test_extractor(r#"{"schemes": []}"#);
        let first = extractor.extract(ExtractionRequest::new("a", "b")).await;
        let second = extractor.extract(ExtractionRequest::new("a", "b")).await;

        assert_eq!(first.metadata.usage.call_count, 7);
        assert_eq!(second.metadata.usage.call_count, 7);
        assert_eq!(extractor.provider().usage().call_count, 14);
        assert_eq!(first.metadata.model_name, "mock");
        assert_ne!(first.metadata.attempt_id, second.metadata.attempt_id);
    }
}
