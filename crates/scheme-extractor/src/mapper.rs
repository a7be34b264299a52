//! Map raw scheme objects onto the canonical record
//!
//! The model's keys are untrusted. Every field is looked up defensively,
//! enums are normalized, and the finished record is validated against the
//! schema before it is returned. A record that fails is dropped on its own;
//! its siblings are unaffected.

use crate::error::ExtractorError;
use crate::types::DroppedRecord;
use chrono::{Datelike, NaiveDate};
use scheme_domain::{
    DiscountType, Provenance, SchemePeriod, SchemeRecord, SchemeSubType, SchemeType, Vendor,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Why a raw scheme could not become a record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The scheme entry is not a JSON object
    #[error("scheme entry is not a JSON object")]
    NotAnObject,

    /// A date field could not be parsed
    #[error("invalid date in {field}: {value:?}")]
    InvalidDate {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// A numeric field could not be parsed
    #[error("invalid number in {field}: {value:?}")]
    InvalidNumber {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// A field had the wrong JSON shape
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// What was wrong
        reason: String,
    },

    /// The mapped record broke a schema constraint
    #[error("validation failed: {0}")]
    Validation(String),
}

impl From<MappingError> for ExtractorError {
    fn from(e: MappingError) -> Self {
        ExtractorError::Validation(e.to_string())
    }
}

/// Attempt-level fallbacks from the confidence stage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageDefaults {
    /// Confidence when a scheme carries none
    pub confidence: Option<f64>,
    /// Escalation when a scheme carries none
    pub needs_escalation: Option<bool>,
}

/// Which end of a month a partial date resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Discount labels the model is asked to use, and their normalized type
const DISCOUNT_TYPES: [(&str, DiscountType); 7] = [
    ("Percentage of MRP", DiscountType::Percentage),
    ("Percentage of NLC", DiscountType::Percentage),
    ("Absolute", DiscountType::Flat),
    ("PERCENTAGE", DiscountType::Percentage),
    ("FLAT", DiscountType::Flat),
    ("SLAB", DiscountType::Slab),
    ("Other", DiscountType::Other),
];

/// Normalize a model-supplied discount type
///
/// Blank or absent stays absent. Labels in the fixed table map onto the
/// closed enum; every other string is `OTHER`. With `case_insensitive` the
/// table lookup ignores ASCII case.
pub fn normalize_discount_type(raw: Option<&str>, case_insensitive: bool) -> Option<DiscountType> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let normalized = DISCOUNT_TYPES
        .iter()
        .find(|(label, _)| {
            if case_insensitive {
                label.eq_ignore_ascii_case(raw)
            } else {
                *label == raw
            }
        })
        .map(|(_, kind)| *kind)
        .unwrap_or(DiscountType::Other);
    Some(normalized)
}

/// Maps raw scheme JSON onto [`SchemeRecord`]
#[derive(Debug, Clone)]
pub struct SchemeMapper {
    provenance: Provenance,
    case_insensitive_enums: bool,
    fallback_confidence: f64,
}

impl SchemeMapper {
    /// Create a mapper stamping records with `provenance`
    pub fn new(provenance: Provenance) -> Self {
        Self {
            provenance,
            case_insensitive_enums: true,
            fallback_confidence: 0.5,
        }
    }

    /// Accept enum values regardless of casing and separators
    pub fn with_case_insensitive_enums(mut self, enabled: bool) -> Self {
        self.case_insensitive_enums = enabled;
        self
    }

    /// Confidence used when neither the scheme nor the stage supplies one
    pub fn with_fallback_confidence(mut self, confidence: f64) -> Self {
        self.fallback_confidence = confidence;
        self
    }

    /// Map one raw scheme
    pub fn map(&self, raw: &Value, defaults: &StageDefaults) -> Result<SchemeRecord, MappingError> {
        let obj = raw.as_object().ok_or(MappingError::NotAnObject)?;
        let mut record = SchemeRecord::new(self.provenance.extracted_at);
        record.source_file = self.provenance.source_file.clone();

        record.scheme_type = self.scheme_type(obj);
        record.scheme_sub_type = self.scheme_sub_type(obj);
        record.scheme_name = text(obj, &["scheme_name"]).unwrap_or_default();
        record.scheme_description = text(obj, &["scheme_description", "description"]).unwrap_or_default();
        record.remarks = text(obj, &["description", "remarks"]).unwrap_or_default();
        record.scheme_period = text(obj, &["scheme_period"]).and_then(|p| SchemePeriod::parse(&p));

        let start = first_date(obj, &["duration_start_date", "starting_at"], Bound::Start)?;
        let end = first_date(obj, &["duration_end_date", "ending_at"], Bound::End)?;
        record.duration_start_date = start;
        record.starting_at = start;
        record.duration_end_date = end;
        record.ending_at = end;

        let price_drop = first_date(obj, &["price_drop_date"], Bound::Start)?;
        if record.scheme_sub_type == SchemeSubType::Pdc {
            record.price_drop_date = price_drop;
        } else if price_drop.is_some() {
            debug!("Ignoring price_drop_date on {} scheme", record.scheme_sub_type);
        }

        record.discount_type = normalize_discount_type(
            text(obj, &["discount_type"]).as_deref(),
            self.case_insensitive_enums,
        );
        record.discount_value = number(obj, "discount_value", &["discount_value", "global_cap_amount"])?;
        record.min_order_value = number(obj, "min_order_value", &["min_order_value"])?;
        record.max_discount_cap =
            number(obj, "max_discount_cap", &["max_discount_cap", "global_cap_amount"])?;
        record.global_cap_amount = number(obj, "global_cap_amount", &["global_cap_amount"])?;
        record.brand_support_absolute =
            number(obj, "brand_support_absolute", &["brand_support_absolute"])?;
        record.gst_rate = number(obj, "gst_rate", &["gst_rate"])?;
        record.discount_slab_type = text(obj, &["discount_slab_type"]);

        record.min_actual_or_agreed = flag(obj, "min_actual_or_agreed");
        record.remove_gst_from_final_claim = flag(obj, "remove_gst_from_final_claim");
        record.over_and_above = flag(obj, "over_and_above");
        record.best_bet = flag(obj, "best_bet");

        record.category = text(obj, &["category"]);
        record.vendor_name = text(obj, &["vendor_name"]);
        record.vendors = vendors(obj)?;

        record.confidence = number(obj, "confidence", &["confidence"])?
            .or(defaults.confidence)
            .unwrap_or(self.fallback_confidence);
        record.needs_escalation = flag(obj, "needs_escalation")
            .or(defaults.needs_escalation)
            .unwrap_or(false);

        record.validate().map_err(MappingError::Validation)?;
        Ok(record)
    }

    /// Map a scheme array, collecting dropped entries instead of failing
    pub fn map_all(
        &self,
        raw: &[Value],
        defaults: &StageDefaults,
    ) -> (Vec<SchemeRecord>, Vec<DroppedRecord>) {
        let mut records = Vec::with_capacity(raw.len());
        let mut dropped = Vec::new();

        for (index, value) in raw.iter().enumerate() {
            match self.map(value, defaults) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Dropping scheme {}: {}", index, e);
                    dropped.push(DroppedRecord {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (records, dropped)
    }

    fn scheme_type(&self, obj: &Map<String, Value>) -> SchemeType {
        let Some(raw) = text(obj, &["scheme_type"]) else {
            return SchemeType::Other;
        };
        let parsed = if self.case_insensitive_enums {
            SchemeType::parse_lenient(&raw)
        } else {
            raw.parse().ok()
        };
        parsed.unwrap_or_else(|| {
            debug!("Unrecognized scheme_type {:?}, using OTHER", raw);
            SchemeType::Other
        })
    }

    fn scheme_sub_type(&self, obj: &Map<String, Value>) -> SchemeSubType {
        let Some(raw) = text(obj, &["scheme_sub_type"]) else {
            return SchemeSubType::Other;
        };
        let parsed = if self.case_insensitive_enums {
            SchemeSubType::parse_lenient(&raw)
        } else {
            raw.parse().ok()
        };
        parsed.unwrap_or_else(|| {
            debug!("Unrecognized scheme_sub_type {:?}, using OTHER", raw);
            SchemeSubType::Other
        })
    }
}

/// First present, non-null value among `keys`
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Trimmed text of the first non-blank key
fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn number(
    obj: &Map<String, Value>,
    field: &'static str,
    keys: &[&str],
) -> Result<Option<f64>, MappingError> {
    match lookup(obj, keys) {
        None => Ok(None),
        Some(value) => parse_number(value).map_err(|value| MappingError::InvalidNumber { field, value }),
    }
}

/// Parse a JSON number or a numeric string with separators and currency marks
fn parse_number(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| n.to_string()),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches("Rs.")
                .trim_start_matches("INR")
                .chars()
                .filter(|c| !matches!(c, ',' | '₹' | '%' | ' '))
                .collect();
            if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
                return Ok(None);
            }
            cleaned.parse::<f64>().map(Some).map_err(|_| s.clone())
        }
        other => Err(other.to_string()),
    }
}

/// Yes/No style flag; unrecognized values count as absent
fn flag(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    match obj.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" => Some(true),
            "no" | "n" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn first_date(
    obj: &Map<String, Value>,
    keys: &[&'static str],
    bound: Bound,
) -> Result<Option<NaiveDate>, MappingError> {
    for key in keys {
        let Some(value) = obj.get(*key) else {
            continue;
        };
        let parsed = match value {
            Value::Null => None,
            Value::String(s) => parse_date(s, bound).map_err(|_| MappingError::InvalidDate {
                field: *key,
                value: s.clone(),
            })?,
            other => {
                return Err(MappingError::InvalidDate {
                    field: *key,
                    value: other.to_string(),
                })
            }
        };
        if parsed.is_some() {
            return Ok(parsed);
        }
    }
    Ok(None)
}

/// Parse `YYYY-MM-DD`, `YYYY/MM/DD` or a bare `YYYY-MM`
///
/// A bare month resolves to its first or last day depending on `bound`.
fn parse_date(raw: &str, bound: Bound) -> Result<Option<NaiveDate>, ()> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        return Ok(None);
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(Some(date));
        }
    }

    let (year, month) = s.split_once(['-', '/']).ok_or(())?;
    let year: i32 = year.parse().map_err(|_| ())?;
    let month: u32 = month.parse().map_err(|_| ())?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(())?;
    match bound {
        Bound::Start => Ok(Some(first)),
        Bound::End => Ok(Some(last_day_of_month(first))),
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

fn vendors(obj: &Map<String, Value>) -> Result<Vec<Vendor>, MappingError> {
    let entries = match obj.get("vendors") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(MappingError::InvalidField {
                field: "vendors",
                reason: "expected an array".to_string(),
            })
        }
    };

    let mut vendors = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(v) = entry.as_object() else {
            debug!("Skipping non-object vendor entry");
            continue;
        };
        let Some(name) = text(v, &["vendor_name", "name"]) else {
            debug!("Skipping vendor without a name");
            continue;
        };
        let mut vendor = Vendor::new(name);
        if let Some(location) = text(v, &["location"]) {
            vendor = vendor.with_location(location);
        }
        if let Some(amount) = number(v, "vendors.amount", &["amount"])? {
            vendor = vendor.with_amount(amount);
        }
        vendors.push(vendor);
    }
    Ok(vendors)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn discount_normalization_is_total(raw in ".*", case_insensitive in any::<bool>()) {
            let normalized = normalize_discount_type(Some(&raw), case_insensitive);
            let trimmed = raw.trim();
            let known = DISCOUNT_TYPES.iter().find(|(label, _)| {
                if case_insensitive {
                    label.eq_ignore_ascii_case(trimmed)
                } else {
                    *label == trimmed
                }
            });
            match known {
                _ if trimmed.is_empty() => prop_assert_eq!(normalized, None),
                Some((_, kind)) => prop_assert_eq!(normalized, Some(*kind)),
                None => prop_assert_eq!(normalized, Some(DiscountType::Other)),
            }
        }

        #[test]
        fn mapped_sub_type_is_always_known(sub in ".*", ty in ".*") {
            let mapper = SchemeMapper::new(Provenance::now());
            let raw = serde_json::json!({"scheme_type": ty, "scheme_sub_type": sub});
            let record = mapper.map(&raw, &StageDefaults::default()).unwrap();
            prop_assert!(SchemeSubType::ALL.contains(&record.scheme_sub_type));
            prop_assert!(SchemeType::ALL.contains(&record.scheme_type));
        }
    }
}
