//! Parse untrusted model output

use crate::error::ExtractorError;
use serde_json::{Map, Value};
use tracing::warn;

/// Scheme array recovered from a completion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedCompletion {
    /// Raw scheme objects, unmapped
    pub schemes: Vec<Value>,

    /// Top-level `reasoning` string, when present
    pub reasoning: Option<String>,

    /// Why the completion was rejected; `schemes` is empty when set
    pub malformed: Option<ExtractorError>,
}

impl ParsedCompletion {
    fn rejected(error: ExtractorError) -> Self {
        Self {
            malformed: Some(error),
            ..Self::default()
        }
    }

    /// Whether the completion was rejected
    pub fn is_malformed(&self) -> bool {
        self.malformed.is_some()
    }
}

/// Remove a surrounding fenced-code wrapper and trim
///
/// Handles an optional language tag after the opening fence
/// (```` ```json ````). Text without fences is only trimmed.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        text = &rest[tag_len..];
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Parse a scheme-array completion
///
/// Never fails: malformed content yields zero schemes with the reason in
/// [`ParsedCompletion::malformed`]. An object without a `schemes` key is a
/// valid answer with zero schemes. A bare array is taken as the scheme list.
pub fn parse_completion(raw: &str) -> ParsedCompletion {
    let cleaned = strip_fences(raw);

    let value: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!("Completion is not valid JSON: {}", e);
            return ParsedCompletion::rejected(e.into());
        }
    };

    match value {
        Value::Array(schemes) => ParsedCompletion {
            schemes,
            ..ParsedCompletion::default()
        },
        Value::Object(mut obj) => {
            let reasoning = take_reasoning(&mut obj);
            match obj.remove("schemes") {
                None | Some(Value::Null) => ParsedCompletion {
                    reasoning,
                    ..ParsedCompletion::default()
                },
                Some(Value::Array(schemes)) => ParsedCompletion {
                    schemes,
                    reasoning,
                    malformed: None,
                },
                Some(other) => {
                    warn!("'schemes' is not an array: {}", type_name(&other));
                    ParsedCompletion {
                        reasoning,
                        ..ParsedCompletion::rejected(ExtractorError::InvalidFormat(format!(
                            "'schemes' must be an array, got {}",
                            type_name(&other)
                        )))
                    }
                }
            }
        }
        other => {
            warn!("Completion is a JSON {}, expected an object", type_name(&other));
            ParsedCompletion::rejected(ExtractorError::InvalidFormat(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    }
}

/// Parse a single-object stage completion
pub fn parse_stage_object(raw: &str) -> Result<Map<String, Value>, ExtractorError> {
    match serde_json::from_str::<Value>(strip_fences(raw))? {
        Value::Object(obj) => Ok(obj),
        other => Err(ExtractorError::InvalidFormat(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Remove and return the `reasoning` field as text
pub fn take_reasoning(obj: &mut Map<String, Value>) -> Option<String> {
    match obj.remove("reasoning")? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"schemes": [{"scheme_name": "JBP Q1"}], "reasoning": "found one"}"#;

    #[test]
    fn test_parse_valid_object() {
        let parsed = parse_completion(BODY);
        assert!(!parsed.is_malformed());
        assert_eq!(parsed.schemes.len(), 1);
        assert_eq!(parsed.schemes[0]["scheme_name"], "JBP Q1");
        assert_eq!(parsed.reasoning.as_deref(), Some("found one"));
    }

    #[test]
    fn test_fenced_equals_direct() {
        let fenced = format!("```json\n{}\n```", BODY);
        assert_eq!(parse_completion(&fenced), parse_completion(BODY));

        let bare_fence = format!("  ```\n{}```  ", BODY);
        assert_eq!(parse_completion(&bare_fence), parse_completion(BODY));
    }

    #[test]
    fn test_not_json_is_empty() {
        let parsed = parse_completion("not json at all");
        assert!(parsed.schemes.is_empty());
        assert!(matches!(parsed.malformed, Some(ExtractorError::JsonParse(_))));
    }

    #[test]
    fn test_missing_schemes_key_is_zero_schemes() {
        let parsed = parse_completion(r#"{"note": "nothing here"}"#);
        assert!(parsed.schemes.is_empty());
        assert!(!parsed.is_malformed());

        let parsed = parse_completion(r#"{"schemes": null}"#);
        assert!(parsed.schemes.is_empty());
        assert!(!parsed.is_malformed());
    }

    #[test]
    fn test_non_array_schemes_is_malformed() {
        let parsed = parse_completion(r#"{"schemes": "none"}"#);
        assert!(parsed.schemes.is_empty());
        assert!(matches!(parsed.malformed, Some(ExtractorError::InvalidFormat(_))));
    }

    #[test]
    fn test_bare_array_is_scheme_list() {
        let parsed = parse_completion(r#"[{"scheme_name": "A"}, {"scheme_name": "B"}]"#);
        assert_eq!(parsed.schemes.len(), 2);
    }

    #[test]
    fn test_scalar_is_malformed() {
        assert!(parse_completion("42").is_malformed());
        assert!(parse_completion("").is_malformed());
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_fences("```{}```"), "{}");
        assert_eq!(strip_fences("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_fences("```"), "");
    }

    #[test]
    fn test_parse_stage_object() {
        let obj = parse_stage_object("```json\n{\"scheme_type\": \"BUY_SIDE\"}\n```").unwrap();
        assert_eq!(obj["scheme_type"], "BUY_SIDE");

        assert!(matches!(
            parse_stage_object("[1, 2]"),
            Err(ExtractorError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_stage_object("oops"),
            Err(ExtractorError::JsonParse(_))
        ));
    }

    #[test]
    fn test_take_reasoning() {
        let mut obj = parse_stage_object(r#"{"reasoning": ["a", "b"], "x": 1}"#).unwrap();
        assert_eq!(take_reasoning(&mut obj).as_deref(), Some("[\"a\",\"b\"]"));
        assert!(!obj.contains_key("reasoning"));
        assert_eq!(take_reasoning(&mut obj), None);
    }
}
