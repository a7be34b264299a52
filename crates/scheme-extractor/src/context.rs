//! Bounded prompt context assembly
//!
//! Everything here counts characters, not bytes, so windows never split a
//! multi-byte code point.

use crate::types::{ExtractionRequest, TableText};
use serde_json::Value;

/// Borrowed inputs for one assembly
#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    /// Mail subject
    pub subject: &'a str,
    /// Mail body
    pub body: &'a str,
    /// Tables to append after the body
    pub tables: &'a [TableText],
    /// Summary of earlier processing
    pub prior_summary: Option<&'a Value>,
}

impl<'a> From<&'a ExtractionRequest> for ContextInput<'a> {
    fn from(request: &'a ExtractionRequest) -> Self {
        Self {
            subject: &request.subject,
            body: &request.body,
            tables: &request.tables,
            prior_summary: request.prior_summary.as_ref(),
        }
    }
}

/// Merges body, tables and prior summary into one bounded string
///
/// Layout:
///
/// ```text
/// <body, or the subject when the body is blank>
///
/// TABLE FROM <label>
/// <content>
///
/// SUMMARY_JSON:
/// <pretty-printed summary>
/// ```
///
/// When the result would exceed `max_chars`, the body is cut from the tail
/// first so the tables survive. A final cap applies if the tables alone are
/// too large.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    /// Create an assembler with the given character bound
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Maximum output length in characters
    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Assemble the context. Never fails.
    pub fn assemble(&self, input: &ContextInput<'_>) -> String {
        let body = if input.body.trim().is_empty() {
            input.subject.trim()
        } else {
            input.body
        };

        let mut tail = String::new();
        for table in input.tables {
            if table.content.trim().is_empty() {
                continue;
            }
            tail.push_str("\n\nTABLE FROM ");
            tail.push_str(table.label.trim());
            tail.push('\n');
            tail.push_str(table.content.trim_end());
        }
        if let Some(summary) = input.prior_summary {
            let rendered =
                serde_json::to_string_pretty(summary).unwrap_or_else(|_| summary.to_string());
            tail.push_str("\n\nSUMMARY_JSON:\n");
            tail.push_str(&rendered);
        }

        let tail_len = tail.chars().count();
        let body_budget = self.max_chars.saturating_sub(tail_len);

        let mut context = String::with_capacity(body.len() + tail.len());
        context.push_str(take_chars(body, body_budget));
        context.push_str(&tail);

        take_chars(&context, self.max_chars).to_string()
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(12_000)
    }
}

/// First `n` characters of `s`
pub fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Characters `start..end` of `s`, clamped to its length
pub fn char_window(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let mut indices = s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len()));
    let Some(from) = indices.nth(start) else {
        return "";
    };
    let to = indices.nth(end - start - 1).unwrap_or(s.len());
    &s[from..to]
}

/// Recover a mail subject from extracted document text
///
/// Uses the text after `"Mail - "` on the first line containing it, else
/// the third non-empty line, else the first non-empty line.
pub fn subject_from_text(text: &str) -> String {
    if let Some(line) = text.lines().find(|l| l.contains("Mail - ")) {
        if let Some((_, rest)) = line.split_once("Mail - ") {
            return rest.trim().to_string();
        }
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    match lines.as_slice() {
        [_, _, third, ..] => third.to_string(),
        [first, ..] => first.to_string(),
        [] => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input<'a>(subject: &'a str, body: &'a str, tables: &'a [TableText]) -> ContextInput<'a> {
        ContextInput {
            subject,
            body,
            tables,
            prior_summary: None,
        }
    }

    #[test]
    fn test_short_body_is_kept() {
        let ctx = ContextAssembler::default().assemble(&input("Subj", "Hello world", &[]));
        assert_eq!(ctx, "Hello world");
    }

    #[test]
    fn test_empty_body_falls_back_to_subject() {
        let ctx = ContextAssembler::default().assemble(&input("  JBP Q1 2024 ", "   ", &[]));
        assert_eq!(ctx, "JBP Q1 2024");
    }

    #[test]
    fn test_empty_everything_is_empty() {
        let ctx = ContextAssembler::default().assemble(&input("", "", &[]));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_tables_are_labelled_after_body() {
        let tables = [TableText::new("vendors.csv", "Vendor,Location,Amount\nAcme Corp,Mumbai,20000\n")];
        let ctx = ContextAssembler::default().assemble(&input("s", "Body text", &tables));
        assert_eq!(
            ctx,
            "Body text\n\nTABLE FROM vendors.csv\nVendor,Location,Amount\nAcme Corp,Mumbai,20000"
        );
    }

    #[test]
    fn test_body_truncated_before_tables() {
        let body = "b".repeat(200);
        let tables = [TableText::new("t", "x".repeat(20))];
        let assembler = ContextAssembler::new(100);
        let ctx = assembler.assemble(&input("s", &body, &tables));

        assert_eq!(ctx.chars().count(), 100);
        assert!(ctx.starts_with("bbbb"));
        assert!(ctx.ends_with(&"x".repeat(20)));
    }

    #[test]
    fn test_oversized_tables_are_capped() {
        let tables = [TableText::new("t", "x".repeat(500))];
        let ctx = ContextAssembler::new(50).assemble(&input("s", "body", &tables));
        assert_eq!(ctx.chars().count(), 50);
    }

    #[test]
    fn test_prior_summary_rendered() {
        let summary = json!({"brand": "Acme"});
        let ctx = ContextAssembler::default().assemble(&ContextInput {
            subject: "s",
            body: "body",
            tables: &[],
            prior_summary: Some(&summary),
        });
        assert!(ctx.contains("SUMMARY_JSON:\n{\n  \"brand\": \"Acme\"\n}"));
    }

    #[test]
    fn test_multibyte_truncation() {
        let body = "₹".repeat(30);
        let ctx = ContextAssembler::new(10).assemble(&input("s", &body, &[]));
        assert_eq!(ctx.chars().count(), 10);
    }

    #[test]
    fn test_char_window() {
        assert_eq!(char_window("abcdef", 2, 4), "cd");
        assert_eq!(char_window("abcdef", 4, 100), "ef");
        assert_eq!(char_window("abcdef", 10, 20), "");
        assert_eq!(char_window("abcdef", 3, 3), "");
        assert_eq!(char_window("aé₹b", 1, 3), "é₹");
        assert_eq!(char_window("abc", 0, 3), "abc");
    }

    #[test]
    fn test_take_chars() {
        assert_eq!(take_chars("hello", 3), "hel");
        assert_eq!(take_chars("hi", 10), "hi");
        assert_eq!(take_chars("hi", 0), "");
    }

    #[test]
    fn test_subject_from_mail_marker() {
        let text = "Printed page\nGmail - Inbox\nAcme Mail - JBP Q1 2024 \nbody";
        assert_eq!(subject_from_text(text), "JBP Q1 2024");
    }

    #[test]
    fn test_subject_from_third_line() {
        assert_eq!(subject_from_text("a\n\nb\n c \nd"), "c");
        assert_eq!(subject_from_text("\n only \n"), "only");
        assert_eq!(subject_from_text(""), "");
    }
}
