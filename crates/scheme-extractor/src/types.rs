//! Request and response types for extraction

use crate::config::ExtractionMode;
use crate::error::ExtractorError;
use chrono::{DateTime, Utc};
use scheme_domain::{AttemptId, SchemeRecord, SchemeRow, StageArtifact, UsageSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One table pasted or extracted from an attachment, as delimited text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableText {
    /// Identifying label (sheet name, attachment name, page)
    pub label: String,

    /// Delimited table content
    pub content: String,
}

impl TableText {
    /// Create a labelled table
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Request to extract schemes from one email
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    /// Mail subject
    pub subject: String,

    /// Mail body text
    pub body: String,

    /// Tables found alongside the body
    pub tables: Vec<TableText>,

    /// Summary of earlier processing, rendered verbatim as JSON
    pub prior_summary: Option<Value>,

    /// Source document name, copied onto every record
    pub source_file: Option<String>,
}

impl ExtractionRequest {
    /// Create a request from a subject and body
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Append a table
    pub fn with_table(mut self, table: TableText) -> Self {
        self.tables.push(table);
        self
    }

    /// Attach a prior summary object
    pub fn with_prior_summary(mut self, summary: Value) -> Self {
        self.prior_summary = Some(summary);
        self
    }

    /// Attach a source file name
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }
}

/// A raw scheme that could not be mapped onto the schema
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRecord {
    /// Position in the model's scheme array
    pub index: usize,

    /// Why the record was dropped
    pub reason: String,
}

/// Result of an extraction attempt
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Mapped records, in the order the model produced them
    pub schemes: Vec<SchemeRecord>,

    /// Ordered stage artifacts, present only in audit mode
    pub trace: Option<Vec<StageArtifact>>,

    /// Mean per-record confidence (0.0 when empty)
    pub confidence: f64,

    /// Whether any record, or the attempt itself, needs escalation
    pub needs_escalation: bool,

    /// Error that ended the attempt early
    pub failure: Option<ExtractorError>,

    /// Raw schemes rejected by mapping or validation
    pub dropped: Vec<DroppedRecord>,

    /// Metadata about the attempt
    pub metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// Terminal result for an attempt that could not complete
    pub fn terminal(
        failure: ExtractorError,
        trace: Option<Vec<StageArtifact>>,
        metadata: ExtractionMetadata,
    ) -> Self {
        Self {
            schemes: Vec::new(),
            trace,
            confidence: 0.0,
            needs_escalation: true,
            failure: Some(failure),
            dropped: Vec::new(),
            metadata,
        }
    }

    /// Whether the attempt ended with a failure
    pub fn is_terminal(&self) -> bool {
        self.failure.is_some()
    }

    /// Flat persisted rows, one per record
    pub fn rows(&self) -> Vec<SchemeRow> {
        self.schemes.iter().map(SchemeRow::from).collect()
    }
}

/// Metadata about an extraction attempt
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    /// Attempt identifier
    #[serde(serialize_with = "serialize_display")]
    pub attempt_id: AttemptId,

    /// Source document name
    pub source_file: Option<String>,

    /// When the attempt started
    pub timestamp: DateTime<Utc>,

    /// Model that served the attempt
    pub model_name: String,

    /// Staged or single-shot
    pub mode: ExtractionMode,

    /// Provider usage consumed during the attempt
    pub usage: UsageSnapshot,

    /// Wall-clock processing time
    pub processing_time_ms: u64,

    /// Number of stage artifacts produced
    pub stage_count: usize,
}

fn serialize_display<S: serde::Serializer>(id: &AttemptId, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(id)
}
