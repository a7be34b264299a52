//! Stage artifacts and attempt identity

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Unique identifier for one extraction attempt, based on UUIDv7
///
/// UUIDv7 sorts chronologically, so attempt ids in logs and audit files
/// order the same way the attempts ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u128);

impl AttemptId {
    /// Generate a new UUIDv7-based AttemptId
    ///
    /// # Examples
    ///
    /// ```
    /// use scheme_domain::AttemptId;
    ///
    /// let id = AttemptId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Parse an AttemptId from a UUID string
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid UUIDv7 string: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// The reasoning stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Scheme names, date/amount mentions, keywords, vendor mentions
    KeyFacts,
    /// Scheme type and sub-type
    Classification,
    /// Normalized calendar dates
    Dates,
    /// Discount, caps, GST, one-off support
    Financials,
    /// Vendor list from tabular data
    Vendors,
    /// Complete scheme array
    Assembly,
    /// Confidence and escalation assessment
    Confidence,
}

impl StageKind {
    /// The staged pipeline order
    pub const PIPELINE: [StageKind; 7] = [
        StageKind::KeyFacts,
        StageKind::Classification,
        StageKind::Dates,
        StageKind::Financials,
        StageKind::Vendors,
        StageKind::Assembly,
        StageKind::Confidence,
    ];

    /// Trace label, numbered by pipeline position
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::KeyFacts => "1_key_facts",
            StageKind::Classification => "2_classification",
            StageKind::Dates => "3_dates",
            StageKind::Financials => "4_financials",
            StageKind::Vendors => "5_vendors",
            StageKind::Assembly => "6_full_extraction",
            StageKind::Confidence => "7_confidence",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured output and rationale of one completed stage
///
/// Artifacts are appended to the attempt's trace and never mutated, so the
/// fields are only readable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageArtifact {
    stage: StageKind,
    output: Value,
    rationale: String,
    recovered: bool,
}

impl StageArtifact {
    /// Artifact from a stage whose output parsed
    pub fn new(stage: StageKind, output: Value, rationale: impl Into<String>) -> Self {
        Self {
            stage,
            output,
            rationale: rationale.into(),
            recovered: false,
        }
    }

    /// Default artifact standing in for a stage whose output was unusable
    pub fn recovered(stage: StageKind, output: Value, reason: impl Into<String>) -> Self {
        Self {
            stage,
            output,
            rationale: reason.into(),
            recovered: true,
        }
    }

    /// Which stage produced this artifact
    pub fn stage(&self) -> StageKind {
        self.stage
    }

    /// Structured stage output
    pub fn output(&self) -> &Value {
        &self.output
    }

    /// Free-text rationale
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Whether the stage fell back to defaults
    pub fn is_recovered(&self) -> bool {
        self.recovered
    }
}
