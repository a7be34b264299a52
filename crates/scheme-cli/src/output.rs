//! Output formatting for the CLI.

use crate::cli::CliFormat;
use crate::error::Result;
use colored::*;
use scheme_domain::SchemeRecord;
use scheme_extractor::{ClassificationRules, ExtractionResult, RuleMatch, TieBreak};
use serde_json::{json, Value};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// One flat row per line
    Rows,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Rows => OutputFormat::Rows,
        }
    }
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format an extraction result.
    pub fn format_result(&self, result: &ExtractionResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&result_json(result))?),
            OutputFormat::Table => Ok(self.format_result_table(result)),
            OutputFormat::Rows => self.format_rows(result),
        }
    }

    fn format_result_table(&self, result: &ExtractionResult) -> String {
        let mut out = Vec::new();

        if let Some(failure) = &result.failure {
            out.push(self.error(&format!("Attempt failed: {}", failure)));
        } else if result.schemes.is_empty() {
            out.push(self.colorize("No schemes found.", "yellow"));
        } else {
            out.push(schemes_table(&result.schemes));
        }

        for dropped in &result.dropped {
            out.push(self.warning(&format!(
                "Dropped scheme #{}: {}",
                dropped.index, dropped.reason
            )));
        }

        if let Some(trace) = &result.trace {
            for artifact in trace.iter().filter(|a| a.is_recovered()) {
                out.push(self.warning(&format!(
                    "Stage {} recovered: {}",
                    artifact.stage(),
                    artifact.rationale()
                )));
            }
        }

        let escalation = if result.needs_escalation { "yes" } else { "no" };
        let summary = format!(
            "{} scheme(s), confidence {:.2}, escalation: {} ({} stages, {} tokens, {}ms)",
            result.schemes.len(),
            result.confidence,
            escalation,
            result.metadata.stage_count,
            result.metadata.usage.total_tokens,
            result.metadata.processing_time_ms
        );
        out.push(if result.needs_escalation {
            self.warning(&summary)
        } else {
            self.info(&summary)
        });

        out.join("\n")
    }

    fn format_rows(&self, result: &ExtractionResult) -> Result<String> {
        let lines = result
            .rows()
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    /// Format the rule table.
    pub fn format_rules(&self, rules: &ClassificationRules, tie_break: TieBreak) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(rules.render(tie_break)),
            OutputFormat::Json | OutputFormat::Rows => {
                Ok(serde_json::to_string_pretty(&rules.groups)?)
            }
        }
    }

    /// Format a local rule scan.
    pub fn format_match(&self, hint: &RuleMatch) -> Result<String> {
        match self.format {
            OutputFormat::Table => {
                let label = format!("{} / {}", hint.scheme_type, hint.scheme_sub_type);
                if hint.is_match() {
                    Ok(self.success(&format!(
                        "{} (keywords: {})",
                        label,
                        hint.keywords.join(", ")
                    )))
                } else {
                    Ok(self.info(&format!("{} (no group matched)", label)))
                }
            }
            OutputFormat::Json | OutputFormat::Rows => Ok(serde_json::to_string_pretty(&json!({
                "scheme_type": hint.scheme_type,
                "scheme_sub_type": hint.scheme_sub_type,
                "keywords": hint.keywords,
            }))?),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Serializable view of a result, failure rendered as its message.
pub fn result_json(result: &ExtractionResult) -> Value {
    json!({
        "schemes": result.schemes,
        "confidence": result.confidence,
        "needs_escalation": result.needs_escalation,
        "failure": result.failure.as_ref().map(|e| e.to_string()),
        "dropped": result.dropped,
        "trace": result.trace,
        "metadata": result.metadata,
    })
}

fn schemes_table(schemes: &[SchemeRecord]) -> String {
    let mut builder = Builder::default();
    builder.push_record([
        "ID", "Type", "Sub-type", "Name", "Start", "End", "Discount", "Vendors", "Confidence",
    ]);

    for scheme in schemes {
        let id = scheme.fingerprint().to_string();
        let discount = match (&scheme.discount_type, scheme.discount_value) {
            (Some(t), Some(v)) => format!("{} {}", t, v),
            (Some(t), None) => t.to_string(),
            (None, Some(v)) => v.to_string(),
            (None, None) => "-".to_string(),
        };
        let confidence = if scheme.needs_escalation {
            format!("{:.2} !", scheme.confidence)
        } else {
            format!("{:.2}", scheme.confidence)
        };
        builder.push_record([
            id.chars().take(12).collect::<String>(),
            scheme.scheme_type.to_string(),
            scheme.scheme_sub_type.to_string(),
            scheme.scheme_name.clone(),
            date_cell(scheme.duration_start_date),
            date_cell(scheme.duration_end_date),
            discount,
            scheme.vendors.len().to_string(),
            confidence,
        ]);
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

fn date_cell(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}
