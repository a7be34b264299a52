//! Classification rules handed to the model as configuration
//!
//! The rule table is ordered keyword groups, each naming a
//! `(scheme_type, scheme_sub_type)` pair. It is rendered into the
//! classification prompt. [`ClassificationRules::classify_hint`] evaluates
//! the same table locally for diagnostics; the model's answer is what ends
//! up on the record.

use crate::config::TieBreak;
use crate::error::ExtractorError;
use scheme_domain::{SchemeSubType, SchemeType};
use serde::{Deserialize, Serialize};

/// One ordered keyword group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    /// Type assigned when the group matches
    pub scheme_type: SchemeType,
    /// Sub-type assigned when the group matches
    pub scheme_sub_type: SchemeSubType,
    /// Trigger phrases, matched case-insensitively on word boundaries
    pub keywords: Vec<String>,
}

impl RuleGroup {
    fn new(scheme_type: SchemeType, scheme_sub_type: SchemeSubType, keywords: &[&str]) -> Self {
        Self {
            scheme_type,
            scheme_sub_type,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Distinct keywords of this group present in `text`
    pub fn matches(&self, text: &str) -> Vec<&str> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .map(String::as_str)
            .filter(|k| contains_phrase(&haystack, &k.to_lowercase()))
            .collect()
    }
}

/// Outcome of a local keyword scan
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// Matched type, `OTHER` when nothing matched
    pub scheme_type: SchemeType,
    /// Matched sub-type, `OTHER` when nothing matched
    pub scheme_sub_type: SchemeSubType,
    /// Keywords that triggered the winning group
    pub keywords: Vec<String>,
}

impl RuleMatch {
    /// The `OTHER/OTHER` fallback
    pub fn other() -> Self {
        Self {
            scheme_type: SchemeType::Other,
            scheme_sub_type: SchemeSubType::Other,
            keywords: Vec::new(),
        }
    }

    /// Whether any group matched
    pub fn is_match(&self) -> bool {
        !self.keywords.is_empty()
    }
}

/// Ordered classification rule table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRules {
    /// Groups in priority order
    pub groups: Vec<RuleGroup>,
}

impl Default for ClassificationRules {
    fn default() -> Self {
        use SchemeSubType as Sub;
        use SchemeType as Ty;

        Self {
            groups: vec![
                RuleGroup::new(
                    Ty::BuySide,
                    Sub::PeriodicClaim,
                    &[
                        "jbp",
                        "joint business plan",
                        "tot",
                        "sell in",
                        "inwards",
                        "periodic",
                        "quarter",
                        "q1",
                        "q2",
                        "q3",
                        "q4",
                        "annual",
                        "fy",
                        "business plan",
                        "nrv support",
                        "inventory support",
                    ],
                ),
                RuleGroup::new(
                    Ty::BuySide,
                    Sub::Pdc,
                    &[
                        "price drop",
                        "price protection",
                        "pp",
                        "pdc",
                        "nlc change",
                        "cost reduction",
                        "invoice cost correction",
                    ],
                ),
                RuleGroup::new(
                    Ty::SellSide,
                    Sub::PucFdc,
                    &[
                        "sellout",
                        "puc",
                        "cp",
                        "fdc",
                        "pricing support",
                        "channel support",
                        "market support",
                    ],
                ),
                RuleGroup::new(
                    Ty::SellSide,
                    Sub::Coupon,
                    &["coupon", "vpc", "promo code", "offer code"],
                ),
                RuleGroup::new(Ty::SellSide, Sub::SuperCoin, &["super coin", "sc funding"]),
                RuleGroup::new(
                    Ty::SellSide,
                    Sub::Prexo,
                    &["exchange", "prexo", "upgrade", "bump up"],
                ),
                RuleGroup::new(
                    Ty::SellSide,
                    Sub::BankOffer,
                    &["bank offer", "bank cashback", "hdfc", "sbi", "icici", "axis", "kotak"],
                ),
                RuleGroup::new(Ty::SellSide, Sub::Lifestyle, &["lifestyle"]),
                RuleGroup::new(
                    Ty::OneOff,
                    Sub::OneOff,
                    &["one-off", "one off", "one time", "lump sum", "one-off sales support"],
                ),
            ],
        }
    }
}

impl ClassificationRules {
    /// Load a rule table from TOML
    ///
    /// ```toml
    /// [[groups]]
    /// scheme_type = "BUY_SIDE"
    /// scheme_sub_type = "PERIODIC_CLAIM"
    /// keywords = ["jbp", "quarter"]
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ExtractorError> {
        let rules: Self = toml::from_str(toml_str)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Serialize the rule table to TOML
    pub fn to_toml(&self) -> Result<String, ExtractorError> {
        toml::to_string_pretty(self)
            .map_err(|e| ExtractorError::Config(format!("Failed to serialize rules: {}", e)))
    }

    /// Reject empty tables and blank keywords
    pub fn validate(&self) -> Result<(), ExtractorError> {
        if self.groups.is_empty() {
            return Err(ExtractorError::Config("rule table has no groups".to_string()));
        }
        for (idx, group) in self.groups.iter().enumerate() {
            if group.keywords.is_empty() || group.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ExtractorError::Config(format!(
                    "rule group {} ({}/{}) has a blank or missing keyword",
                    idx, group.scheme_type, group.scheme_sub_type
                )));
            }
        }
        Ok(())
    }

    /// Evaluate the table against `text`
    pub fn classify_hint(&self, text: &str, tie_break: TieBreak) -> RuleMatch {
        let mut best: Option<(&RuleGroup, Vec<&str>)> = None;

        for group in &self.groups {
            let hits = group.matches(text);
            if hits.is_empty() {
                continue;
            }
            match tie_break {
                TieBreak::FirstMatch => {
                    best = Some((group, hits));
                    break;
                }
                TieBreak::MostKeywords => {
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, current)| hits.len() > current.len());
                    if better {
                        best = Some((group, hits));
                    }
                }
            }
        }

        match best {
            Some((group, hits)) => RuleMatch {
                scheme_type: group.scheme_type,
                scheme_sub_type: group.scheme_sub_type,
                keywords: hits.into_iter().map(str::to_string).collect(),
            },
            None => RuleMatch::other(),
        }
    }

    /// Render the table as prompt text
    pub fn render(&self, tie_break: TieBreak) -> String {
        let mut out = String::from("Classification rules, in priority order:\n");
        for (idx, group) in self.groups.iter().enumerate() {
            let keywords = group
                .keywords
                .iter()
                .map(|k| format!("\"{}\"", k))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(
                "{}. {} / {}: {}\n",
                idx + 1,
                group.scheme_type,
                group.scheme_sub_type,
                keywords
            ));
        }
        out.push_str("No group matches: OTHER / OTHER\n");
        out.push_str(match tie_break {
            TieBreak::FirstMatch => "Several groups match: the earliest group wins.\n",
            TieBreak::MostKeywords => {
                "Several groups match: the group with the most distinct keyword matches wins; \
                 on a tie the earliest group wins.\n"
            }
        });
        out
    }
}

/// Whether `phrase` occurs in `haystack` on word boundaries (both lowercase)
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(phrase) {
        let start = from + pos;
        let end = start + phrase.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        // Advance past the first character of this occurrence
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}
