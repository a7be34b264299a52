//! Confidence aggregation and escalation pass-through
//!
//! Escalation is not re-derived here. Each record carries the upstream
//! signal; this module only aggregates it across a batch.

use crate::SchemeRecord;

/// Unweighted mean of per-record confidences (0.0 for an empty batch)
pub fn aggregate_confidence(records: &[SchemeRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.confidence).sum::<f64>() / records.len() as f64
}

/// Whether any record in the batch is flagged for escalation
pub fn any_escalation(records: &[SchemeRecord]) -> bool {
    records.iter().any(|r| r.needs_escalation)
}

/// Batch-level view of quality signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationSummary {
    /// Mean confidence across the batch
    pub confidence: f64,

    /// Number of records flagged for escalation
    pub escalated: usize,

    /// Total number of records
    pub total: usize,
}

impl EscalationSummary {
    /// Summarize a batch of records
    pub fn of(records: &[SchemeRecord]) -> Self {
        Self {
            confidence: aggregate_confidence(records),
            escalated: records.iter().filter(|r| r.needs_escalation).count(),
            total: records.len(),
        }
    }

    /// Whether any record needs escalation
    pub fn needs_escalation(&self) -> bool {
        self.escalated > 0
    }
}
