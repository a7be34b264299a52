//! The staged reasoning pipeline
//!
//! The pipeline is a fold over [`StageKind::PIPELINE`]. Each step builds
//! its prompt from the bounded context plus the state folded so far, sends
//! it through the caller's provider function, and absorbs the reply into
//! the state while appending one [`StageArtifact`] to the trace.
//!
//! Only the provider call does I/O. A reply that cannot be parsed yields a
//! recovered artifact with default output and the fold continues. A
//! provider failure stops the fold and is returned with the partial trace.

use crate::config::ExtractorConfig;
use crate::context::{char_window, take_chars};
use crate::error::ExtractorError;
use crate::mapper::StageDefaults;
use crate::parser::{parse_completion, parse_stage_object, take_reasoning, ParsedCompletion};
use crate::prompt::PromptBuilder;
use crate::rules::ClassificationRules;
use scheme_domain::{Message, StageArtifact, StageKind};
use serde_json::{json, Map, Value};
use std::future::Future;
use tracing::{debug, error, warn};

/// Stage 1 output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFacts {
    /// Scheme names, comma separated
    pub scheme_names: String,
    /// Date mentions
    pub key_dates: String,
    /// Amount mentions
    pub key_amounts: String,
    /// Classification keywords
    pub keywords: String,
    /// Vendor or brand mentions
    pub vendor_names: String,
}

/// Stage 2 output, as stated by the model
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Raw scheme type
    pub scheme_type: String,
    /// Raw scheme sub-type
    pub scheme_sub_type: String,
    /// Stage confidence
    pub confidence: Option<f64>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            scheme_type: "OTHER".to_string(),
            scheme_sub_type: "OTHER".to_string(),
            confidence: None,
        }
    }
}

/// Stage 3 output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateFacts {
    /// Duration start as returned
    pub start: Option<String>,
    /// Duration end as returned
    pub end: Option<String>,
}

/// Stage 4 output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Financials {
    /// Discount type label
    pub discount_type: Option<String>,
    /// Discount value as returned
    pub discount_value: Option<String>,
}

/// Stage 7 output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assessment {
    /// Attempt-level confidence
    pub confidence: Option<f64>,
    /// Attempt-level escalation
    pub needs_escalation: Option<bool>,
    /// Fields the assessor found missing
    pub missing_fields: Vec<String>,
    /// Quality issues the assessor raised
    pub quality_issues: Vec<String>,
}

/// State folded across stages
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Key facts
    pub facts: KeyFacts,
    /// Classification
    pub classification: Classification,
    /// Dates
    pub dates: DateFacts,
    /// Financials
    pub financials: Financials,
    /// Vendor array JSON
    pub vendors: Vec<Value>,
    /// Assembled scheme array
    pub assembled: ParsedCompletion,
    /// Confidence assessment
    pub assessment: Assessment,
    rationales: Vec<String>,
}

impl PipelineState {
    /// Fallbacks the mapper uses for schemes without their own values
    pub fn defaults(&self) -> StageDefaults {
        StageDefaults {
            confidence: self.assessment.confidence,
            needs_escalation: self.assessment.needs_escalation,
        }
    }

    /// Rationales of every stage so far, in order
    pub fn rationales(&self) -> &[String] {
        &self.rationales
    }

    /// Stage 6 summary of stages 1-5
    pub fn summary(&self, subject: &str) -> String {
        format!(
            "Subject: {}\n\nClassification: {} - {}\nDates: {} to {}\nDiscount: {} - {}\nVendors: {}\n",
            subject,
            self.classification.scheme_type,
            self.classification.scheme_sub_type,
            self.dates.start.as_deref().unwrap_or("null"),
            self.dates.end.as_deref().unwrap_or("null"),
            self.financials.discount_type.as_deref().unwrap_or("null"),
            self.financials.discount_value.as_deref().unwrap_or("null"),
            Value::Array(self.vendors.clone()),
        )
    }

    /// Absorb one stage reply into the state
    pub fn absorb(&mut self, stage: StageKind, raw: &str) -> StageArtifact {
        let artifact = if stage == StageKind::Assembly {
            self.absorb_assembly(raw)
        } else {
            match parse_stage_object(raw) {
                Ok(mut obj) => {
                    let rationale = take_reasoning(&mut obj).unwrap_or_default();
                    if obj.is_empty() {
                        warn!("Stage {} returned an empty object", stage);
                        let reason = if rationale.is_empty() {
                            "empty stage output".to_string()
                        } else {
                            rationale
                        };
                        StageArtifact::recovered(stage, default_output(stage), reason)
                    } else {
                        self.apply(stage, &obj);
                        StageArtifact::new(stage, Value::Object(obj), rationale)
                    }
                }
                Err(e) => {
                    warn!("Stage {} output unusable: {}", stage, e);
                    StageArtifact::recovered(stage, default_output(stage), e.to_string())
                }
            }
        };

        self.rationales.push(artifact.rationale().to_string());
        artifact
    }

    fn absorb_assembly(&mut self, raw: &str) -> StageArtifact {
        let parsed = parse_completion(raw);
        let artifact = match &parsed.malformed {
            Some(e) => StageArtifact::recovered(
                StageKind::Assembly,
                default_output(StageKind::Assembly),
                e.to_string(),
            ),
            None => StageArtifact::new(
                StageKind::Assembly,
                json!({ "schemes": parsed.schemes }),
                parsed.reasoning.clone().unwrap_or_default(),
            ),
        };
        self.assembled = parsed;
        artifact
    }

    fn apply(&mut self, stage: StageKind, obj: &Map<String, Value>) {
        match stage {
            StageKind::KeyFacts => {
                self.facts = KeyFacts {
                    scheme_names: joined(obj.get("scheme_names")),
                    key_dates: joined(obj.get("key_dates")),
                    key_amounts: joined(obj.get("key_amounts")),
                    keywords: joined(obj.get("keywords")),
                    vendor_names: joined(obj.get("vendor_names")),
                };
            }
            StageKind::Classification => {
                let fallback = Classification::default();
                self.classification = Classification {
                    scheme_type: scalar(obj.get("scheme_type")).unwrap_or(fallback.scheme_type),
                    scheme_sub_type: scalar(obj.get("scheme_sub_type"))
                        .unwrap_or(fallback.scheme_sub_type),
                    confidence: unit_interval(obj.get("confidence")),
                };
            }
            StageKind::Dates => {
                self.dates = DateFacts {
                    start: scalar(obj.get("duration_start_date")).or_else(|| scalar(obj.get("starting_at"))),
                    end: scalar(obj.get("duration_end_date")).or_else(|| scalar(obj.get("ending_at"))),
                };
            }
            StageKind::Financials => {
                self.financials = Financials {
                    discount_type: scalar(obj.get("discount_type")),
                    discount_value: scalar(obj.get("discount_value")),
                };
            }
            StageKind::Vendors => {
                self.vendors = match obj.get("vendors").or_else(|| obj.get("vendors_json")) {
                    Some(Value::Array(v)) => v.clone(),
                    // Some models return the array as an embedded JSON string
                    Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
                        Ok(Value::Array(v)) => v,
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                };
            }
            StageKind::Confidence => {
                self.assessment = Assessment {
                    confidence: unit_interval(obj.get("confidence_score"))
                        .or_else(|| unit_interval(obj.get("confidence"))),
                    needs_escalation: boolean(obj.get("needs_escalation")),
                    missing_fields: list(obj.get("missing_fields")),
                    quality_issues: list(obj.get("quality_issues")),
                };
            }
            StageKind::Assembly => {}
        }
    }
}

/// Output recorded for a stage that fell back to defaults
fn default_output(stage: StageKind) -> Value {
    match stage {
        StageKind::KeyFacts => json!({
            "scheme_names": [], "key_dates": [], "key_amounts": [], "keywords": [], "vendor_names": []
        }),
        StageKind::Classification => {
            json!({ "scheme_type": "OTHER", "scheme_sub_type": "OTHER", "confidence": null })
        }
        StageKind::Dates => json!({
            "duration_start_date": null, "duration_end_date": null,
            "starting_at": null, "ending_at": null, "price_drop_date": null
        }),
        StageKind::Financials => json!({
            "discount_type": null, "discount_value": null, "min_order_value": null,
            "max_discount_cap": null, "gst_rate": null, "brand_support_absolute": null
        }),
        StageKind::Vendors => json!({ "vendors": [] }),
        StageKind::Assembly => json!({ "schemes": [] }),
        StageKind::Confidence => json!({
            "confidence_score": null, "needs_escalation": null,
            "missing_fields": [], "quality_issues": []
        }),
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case("null") => {
            Some(s.trim().to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| scalar(Some(v))).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn joined(value: Option<&Value>) -> String {
    list(value).join(", ")
}

fn unit_interval(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if (0.0..=1.0).contains(&n) {
        Some(n)
    } else {
        warn!("Ignoring confidence {} outside [0, 1]", n);
        None
    }
}

fn boolean(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Result of running the stage fold
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Folded state
    pub state: PipelineState,
    /// Ordered stage artifacts
    pub trace: Vec<StageArtifact>,
    /// Provider failure that stopped the fold
    pub failure: Option<ExtractorError>,
}

/// Runs the seven reasoning stages over one bounded context
pub struct StagePipeline<'a> {
    config: &'a ExtractorConfig,
    rules: &'a ClassificationRules,
    prompts: PromptBuilder<'a>,
}

impl<'a> StagePipeline<'a> {
    /// Create a pipeline over the given configuration and rules
    pub fn new(config: &'a ExtractorConfig, rules: &'a ClassificationRules) -> Self {
        Self {
            config,
            rules,
            prompts: PromptBuilder::new(rules, config.tie_break),
        }
    }

    /// Build the messages for `stage` from the state folded so far
    pub fn messages(&self, stage: StageKind, subject: &str, context: &str, state: &PipelineState) -> Vec<Message> {
        let cfg = self.config;
        match stage {
            StageKind::KeyFacts => self.prompts.key_facts(subject, take_chars(context, cfg.facts_window)),
            StageKind::Classification => self.prompts.classification(
                &state.facts.scheme_names,
                &state.facts.keywords,
                take_chars(context, cfg.classification_window),
            ),
            StageKind::Dates => self.prompts.dates(
                take_chars(context, cfg.text_window),
                &format!(
                    "Keywords: {}, Dates mentioned: {}",
                    state.facts.keywords, state.facts.key_dates
                ),
            ),
            StageKind::Financials => self
                .prompts
                .financials(take_chars(context, cfg.text_window), self.table_window(context)),
            StageKind::Vendors => self
                .prompts
                .vendors(self.table_window(context), &state.facts.vendor_names),
            StageKind::Assembly => {
                let body = format!(
                    "{}\n\n{}",
                    state.summary(subject),
                    take_chars(context, cfg.assembly_window)
                );
                self.prompts.assembly(subject, &body)
            }
            StageKind::Confidence => {
                let extracted = json!({ "schemes": state.assembled.schemes }).to_string();
                self.prompts.confidence(&extracted, &state.rationales().join("\n\n"))
            }
        }
    }

    /// Slice assumed to hold tabular data
    ///
    /// Short contexts never reach the window start; they get their leading
    /// slice of the same width instead.
    fn table_window<'c>(&self, context: &'c str) -> &'c str {
        let window = char_window(context, self.config.table_window_start, self.config.table_window_end);
        if window.is_empty() {
            take_chars(
                context,
                self.config
                    .table_window_end
                    .saturating_sub(self.config.table_window_start),
            )
        } else {
            window
        }
    }

    /// Fold every stage, calling `call` once per stage
    pub async fn run<F, Fut>(&self, subject: &str, context: &str, mut call: F) -> PipelineOutcome
    where
        F: FnMut(StageKind, Vec<Message>) -> Fut,
        Fut: Future<Output = Result<String, ExtractorError>>,
    {
        let mut state = PipelineState::default();
        let mut trace = Vec::with_capacity(StageKind::PIPELINE.len());

        for stage in StageKind::PIPELINE {
            debug!("Stage {} starting", stage);
            let messages = self.messages(stage, subject, context, &state);

            let raw = match call(stage, messages).await {
                Ok(raw) => raw,
                Err(e) => {
                    error!("Stage {} failed: {}", stage, e);
                    return PipelineOutcome {
                        state,
                        trace,
                        failure: Some(e),
                    };
                }
            };

            let artifact = state.absorb(stage, &raw);
            debug!(
                "Stage {} finished{}",
                stage,
                if artifact.is_recovered() { " (recovered)" } else { "" }
            );
            trace.push(artifact);

            if stage == StageKind::Classification {
                self.compare_with_rules(context, &state.classification);
            }
        }

        PipelineOutcome {
            state,
            trace,
            failure: None,
        }
    }

    fn compare_with_rules(&self, context: &str, classification: &Classification) {
        let hint = self.rules.classify_hint(
            take_chars(context, self.config.classification_window),
            self.config.tie_break,
        );
        let agrees = hint.scheme_type.as_str().eq_ignore_ascii_case(&classification.scheme_type)
            && hint
                .scheme_sub_type
                .as_str()
                .eq_ignore_ascii_case(&classification.scheme_sub_type);
        if !agrees {
            debug!(
                "Model classified {}/{}, keyword table suggests {}/{} ({:?})",
                classification.scheme_type,
                classification.scheme_sub_type,
                hint.scheme_type,
                hint.scheme_sub_type,
                hint.keywords
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_absorb_key_facts_accepts_lists_and_strings() {
        let mut state = PipelineState::default();
        let artifact = state.absorb(
            StageKind::KeyFacts,
            r#"{"scheme_names": ["JBP Q1"], "keywords": "jbp, quarter", "reasoning": "r1"}"#,
        );
        assert!(!artifact.is_recovered());
        assert_eq!(artifact.rationale(), "r1");
        assert_eq!(state.facts.scheme_names, "JBP Q1");
        assert_eq!(state.facts.keywords, "jbp, quarter");
        assert_eq!(state.rationales(), ["r1".to_string()]);
    }

    #[test]
    fn test_absorb_malformed_is_recovered() {
        let mut state = PipelineState::default();
        let artifact = state.absorb(StageKind::Classification, "I think it's a JBP");
        assert!(artifact.is_recovered());
        assert_eq!(artifact.output()["scheme_type"], "OTHER");
        assert_eq!(state.classification, Classification::default());
    }

    #[test]
    fn test_absorb_empty_object_is_recovered() {
        let mut state = PipelineState::default();
        let artifact = state.absorb(StageKind::Dates, r#"{"reasoning": "nothing"}"#);
        assert!(artifact.is_recovered());
        assert_eq!(state.dates, DateFacts::default());
    }

    #[test]
    fn test_absorb_vendors_embedded_string() {
        let mut state = PipelineState::default();
        state.absorb(
            StageKind::Vendors,
            r#"{"vendors_json": "[{\"vendor_name\": \"Acme Corp\"}]", "reasoning": "table"}"#,
        );
        assert_eq!(state.vendors.len(), 1);
    }

    #[test]
    fn test_assessment_defaults() {
        let mut state = PipelineState::default();
        state.absorb(
            StageKind::Confidence,
            r#"{"confidence_score": 0.6, "needs_escalation": "yes", "missing_fields": ["gst_rate"]}"#,
        );
        let defaults = state.defaults();
        assert_eq!(defaults.confidence, Some(0.6));
        assert_eq!(defaults.needs_escalation, Some(true));
        assert_eq!(state.assessment.missing_fields, vec!["gst_rate".to_string()]);

        state.absorb(StageKind::Confidence, r#"{"confidence_score": 7}"#);
        assert_eq!(state.defaults().confidence, None);
    }

    #[test]
    fn test_summary_format() {
        let mut state = PipelineState::default();
        state.absorb(
            StageKind::Classification,
            r#"{"scheme_type": "BUY_SIDE", "scheme_sub_type": "PERIODIC_CLAIM", "confidence": 0.9}"#,
        );
        state.absorb(StageKind::Dates, r#"{"duration_start_date": "2024-01-01", "duration_end_date": "2024-03-31"}"#);
        let summary = state.summary("JBP Q1");
        assert!(summary.starts_with("Subject: JBP Q1\n\n"));
        assert!(summary.contains("Classification: BUY_SIDE - PERIODIC_CLAIM"));
        assert!(summary.contains("Dates: 2024-01-01 to 2024-03-31"));
        assert!(summary.contains("Discount: null - null"));
        assert!(summary.contains("Vendors: []"));
    }

    #[test]
    fn test_table_window_fallback_for_short_context() {
        let config = ExtractorConfig::default();
        let rules = ClassificationRules::default();
        let pipeline = StagePipeline::new(&config, &rules);
        assert_eq!(pipeline.table_window("short"), "short");

        let long = format!("{}{}", "a".repeat(6_000), "b".repeat(10));
        assert_eq!(pipeline.table_window(&long), "b".repeat(10));
    }

    #[test]
    fn test_table_window_inverted_is_empty() {
        let config = ExtractorConfig {
            table_window_start: 12_000,
            table_window_end: 6_000,
            ..ExtractorConfig::default()
        };
        let rules = ClassificationRules::default();
        let pipeline = StagePipeline::new(&config, &rules);
        assert_eq!(pipeline.table_window("short"), "");
        assert_eq!(pipeline.table_window(&"x".repeat(20_000)), "");
    }

    #[tokio::test]
    async fn test_run_calls_every_stage_in_order() {
        let config = ExtractorConfig::default();
        let rules = ClassificationRules::default();
        let pipeline = StagePipeline::new(&config, &rules);
        let seen = RefCell::new(Vec::new());

        let outcome = pipeline
            .run("subj", "body", |stage, _msgs| {
                seen.borrow_mut().push(stage);
                async { Ok::<_, ExtractorError>(r#"{"reasoning": "ok", "x": 1}"#.to_string()) }
            })
            .await;

        assert!(outcome.failure.is_none());
        assert_eq!(seen.into_inner(), StageKind::PIPELINE.to_vec());
        assert_eq!(outcome.trace.len(), 7);
        assert_eq!(outcome.state.rationales().len(), 7);
    }

    #[tokio::test]
    async fn test_run_stops_on_provider_failure() {
        let config = ExtractorConfig::default();
        let rules = ClassificationRules::default();
        let pipeline = StagePipeline::new(&config, &rules);
        let mut calls = 0;

        let outcome = pipeline
            .run("subj", "body", |_stage, _msgs| {
                calls += 1;
                let reply = if calls < 3 {
                    Ok(r#"{"reasoning": "fine", "keywords": ["jbp"]}"#.to_string())
                } else {
                    Err(ExtractorError::Timeout)
                };
                async move { reply }
            })
            .await;

        assert_eq!(outcome.failure, Some(ExtractorError::Timeout));
        assert_eq!(outcome.trace.len(), 2);
        assert_eq!(outcome.trace[1].stage(), StageKind::Classification);
    }
}
