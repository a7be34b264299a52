//! Scheme Extractor
//!
//! Turns brand emails (subject, body, pasted tables) into validated
//! [`SchemeRecord`](scheme_domain::SchemeRecord)s.
//!
//! # Architecture
//!
//! ```text
//! ContextAssembler → StagePipeline (7 provider calls) → parse_completion
//!     → SchemeMapper → confidence / escalation → ExtractionResult
//! ```
//!
//! Stages run in order: key facts, classification, dates, financials,
//! vendors, full assembly, confidence. A stage with unusable output
//! contributes a default artifact and the pipeline keeps going. A provider
//! failure ends the attempt.
//!
//! # Example Usage
//!
//! ```no_run
//! use scheme_extractor::{Extractor, ExtractorConfig, ExtractionRequest, TableText};
//! use scheme_llm::OpenRouterProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenRouterProvider::new("sk-or-...", "qwen/qwen3-next-80b-a3b-instruct")?;
//! let extractor = Extractor::new(provider, ExtractorConfig::default());
//!
//! let request = ExtractionRequest::new("JBP Q1 2024", "Please find the Q1 plan attached.")
//!     .with_table(TableText::new("vendors.csv", "Vendor,Location,Amount\nAcme Corp,Mumbai,20000"))
//!     .with_source_file("acme_jbp.pdf");
//!
//! let result = extractor.extract(request).await;
//! for scheme in &result.schemes {
//!     println!("{} {} {}", scheme.fingerprint(), scheme.scheme_type, scheme.scheme_name);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod extractor;
mod mapper;
mod parser;
mod prompt;
mod rules;
mod stages;
mod types;


pub use config::{ExtractionMode, ExtractorConfig, TieBreak};
pub use context::{char_window, subject_from_text, take_chars, ContextAssembler, ContextInput};
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use mapper::{normalize_discount_type, MappingError, SchemeMapper, StageDefaults};
pub use parser::{parse_completion, strip_fences, ParsedCompletion};
pub use prompt::PromptBuilder;
pub use rules::{ClassificationRules, RuleGroup, RuleMatch};
pub use stages::{
    Assessment, Classification, DateFacts, Financials, KeyFacts, PipelineOutcome, PipelineState,
    StagePipeline,
};
pub use types::{DroppedRecord, ExtractionMetadata, ExtractionRequest, ExtractionResult, TableText};
