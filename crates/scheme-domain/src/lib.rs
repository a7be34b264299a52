//! Scheme Domain Layer
//!
//! This crate contains the core domain model for scheme extraction. It defines
//! the canonical record produced by the pipeline, the closed enumerations it
//! is built from, and the trait interface every reasoning backend implements.
//!
//! ## Key Concepts
//!
//! - **Scheme**: a vendor promotional or claims arrangement described in a
//!   brand communication
//! - **Fingerprint**: short deterministic digest over name and duration used
//!   to deduplicate records across extraction attempts
//! - **Escalation**: a record flagged for a stronger extraction pass
//! - **Stage artifact**: structured output plus rationale of one reasoning step
//!
//! ## Architecture
//!
//! - Pure data and policy only, no I/O
//! - Provider implementations live in `scheme-llm`
//! - Orchestration lives in `scheme-extractor`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod confidence;
pub mod identity;
pub mod provenance;
pub mod row;
pub mod scheme;
pub mod stage;
pub mod traits;

// Re-exports for convenience
pub use confidence::{aggregate_confidence, any_escalation, EscalationSummary};
pub use identity::{reconcile, Fingerprint};
pub use provenance::Provenance;
pub use row::SchemeRow;
pub use scheme::{
    DiscountType, SchemePeriod, SchemeRecord, SchemeSubType, SchemeType, Vendor,
};
pub use stage::{AttemptId, StageArtifact, StageKind};
pub use traits::{
    GenerationParams, Message, ReasoningProvider, Role, TransportFailure, UsageSnapshot,
};
