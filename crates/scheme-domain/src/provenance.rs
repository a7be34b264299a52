//! Provenance tracking for extracted records

use chrono::{DateTime, Utc};

/// Where and when a batch of records was produced
///
/// Passed into the mapper rather than read from the clock there, so that
/// mapping the same input twice yields identical records.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    /// Source document name (e.g., "acme_jbp.pdf")
    pub source_file: Option<String>,

    /// Record creation time, not the time of the underlying event
    pub extracted_at: DateTime<Utc>,
}

impl Provenance {
    /// Create a provenance entry stamped with the current time
    pub fn now() -> Self {
        Self {
            source_file: None,
            extracted_at: Utc::now(),
        }
    }

    /// Create a provenance entry with a fixed timestamp
    pub fn at(extracted_at: DateTime<Utc>) -> Self {
        Self {
            source_file: None,
            extracted_at,
        }
    }

    /// Attach a source file name
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }
}
