//! Scheme module - the canonical record emitted by extraction

use crate::identity::Fingerprint;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary scheme classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemeType {
    /// Brand funds the retailer's purchase side (JBP, price drop)
    BuySide,
    /// Brand funds consumer-facing sales (sellout, coupons, offers)
    SellSide,
    /// One-time lump sum support
    OneOff,
    /// Anything that matches no rule
    Other,
}

impl Default for SchemeType {
    fn default() -> Self {
        SchemeType::Other
    }
}

impl SchemeType {
    /// All variants in declaration order
    pub const ALL: [SchemeType; 4] = [
        SchemeType::BuySide,
        SchemeType::SellSide,
        SchemeType::OneOff,
        SchemeType::Other,
    ];

    /// Get the wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeType::BuySide => "BUY_SIDE",
            SchemeType::SellSide => "SELL_SIDE",
            SchemeType::OneOff => "ONE_OFF",
            SchemeType::Other => "OTHER",
        }
    }

    /// Parse ignoring case, surrounding whitespace and `-`/space separators
    pub fn parse_lenient(s: &str) -> Option<Self> {
        fold_token(s).parse().ok()
    }
}

impl FromStr for SchemeType {
    type Err = String;

    /// Exact wire-name match only
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown scheme type: {}", s))
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detailed scheme sub-classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemeSubType {
    /// JBP, quarterly or annual business plans
    PeriodicClaim,
    /// Price drop / price protection claim
    Pdc,
    /// Sellout and channel pricing support
    PucFdc,
    /// Coupon codes, VPC, promo codes
    Coupon,
    /// Super coin funding
    SuperCoin,
    /// Exchange and upgrade programs
    Prexo,
    /// Bank cashback and card offers
    BankOffer,
    /// Lifestyle category schemes
    Lifestyle,
    /// One-time support
    OneOff,
    /// Anything that matches no rule
    Other,
}

impl Default for SchemeSubType {
    fn default() -> Self {
        SchemeSubType::Other
    }
}

impl SchemeSubType {
    /// All variants in declaration order
    pub const ALL: [SchemeSubType; 10] = [
        SchemeSubType::PeriodicClaim,
        SchemeSubType::Pdc,
        SchemeSubType::PucFdc,
        SchemeSubType::Coupon,
        SchemeSubType::SuperCoin,
        SchemeSubType::Prexo,
        SchemeSubType::BankOffer,
        SchemeSubType::Lifestyle,
        SchemeSubType::OneOff,
        SchemeSubType::Other,
    ];

    /// Get the wire name of the sub-type
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemeSubType::PeriodicClaim => "PERIODIC_CLAIM",
            SchemeSubType::Pdc => "PDC",
            SchemeSubType::PucFdc => "PUC_FDC",
            SchemeSubType::Coupon => "COUPON",
            SchemeSubType::SuperCoin => "SUPER_COIN",
            SchemeSubType::Prexo => "PREXO",
            SchemeSubType::BankOffer => "BANK_OFFER",
            SchemeSubType::Lifestyle => "LIFESTYLE",
            SchemeSubType::OneOff => "ONE_OFF",
            SchemeSubType::Other => "OTHER",
        }
    }

    /// Parse ignoring case, surrounding whitespace and `-`/space separators
    pub fn parse_lenient(s: &str) -> Option<Self> {
        fold_token(s).parse().ok()
    }
}

impl FromStr for SchemeSubType {
    type Err = String;

    /// Exact wire-name match only
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchemeSubType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown scheme sub-type: {}", s))
    }
}

impl fmt::Display for SchemeSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical discount type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Percentage of MRP or NLC
    Percentage,
    /// Absolute amount
    Flat,
    /// Quantity or value slabs
    Slab,
    /// Anything else
    Other,
}

impl DiscountType {
    /// Get the wire name of the discount type
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::Flat => "FLAT",
            DiscountType::Slab => "SLAB",
            DiscountType::Other => "OTHER",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a scheme runs for a duration or is tied to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemePeriod {
    /// Tied to a sale event
    Event,
    /// Runs between two dates
    Duration,
}

impl SchemePeriod {
    /// Get the wire name of the period
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemePeriod::Event => "EVENT",
            SchemePeriod::Duration => "DURATION",
        }
    }

    /// Parse a period, ignoring case
    pub fn parse(s: &str) -> Option<Self> {
        match fold_token(s).as_str() {
            "EVENT" => Some(SchemePeriod::Event),
            "DURATION" => Some(SchemePeriod::Duration),
            _ => None,
        }
    }
}

/// Uppercase, trim, and collapse spaces/hyphens into underscores
fn fold_token(s: &str) -> String {
    s.trim()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// A vendor participating in a scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    /// Vendor or distributor name
    pub vendor_name: String,

    /// Vendor location, when the source lists one
    pub location: Option<String>,

    /// Amount allotted to the vendor
    pub amount: Option<f64>,
}

impl Vendor {
    /// Create a vendor with only a name
    pub fn new(vendor_name: impl Into<String>) -> Self {
        Self {
            vendor_name: vendor_name.into(),
            location: None,
            amount: None,
        }
    }

    /// Set the vendor location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the vendor amount
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// A scheme header - the canonical output of one extraction
///
/// Records are built by the mapper and never mutated afterward. `starting_at`
/// and `ending_at` alias the duration dates; they are kept as separate fields
/// because downstream claim systems expect both columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecord {
    /// Primary classification
    pub scheme_type: SchemeType,

    /// Sub-classification
    pub scheme_sub_type: SchemeSubType,

    /// Human-readable scheme name (empty when absent)
    pub scheme_name: String,

    /// Longer description of the scheme (empty when absent)
    pub scheme_description: String,

    /// Free-text notes (empty when absent)
    pub remarks: String,

    /// Event or duration scheme
    pub scheme_period: Option<SchemePeriod>,

    /// Duration start
    pub duration_start_date: Option<NaiveDate>,

    /// Duration end
    pub duration_end_date: Option<NaiveDate>,

    /// Effective start, equal to `duration_start_date`
    pub starting_at: Option<NaiveDate>,

    /// Effective end, equal to `duration_end_date`
    pub ending_at: Option<NaiveDate>,

    /// Price drop date (PDC only)
    pub price_drop_date: Option<NaiveDate>,

    /// Normalized discount type
    pub discount_type: Option<DiscountType>,

    /// Discount value (percentage or flat amount)
    pub discount_value: Option<f64>,

    /// Minimum order value for eligibility
    pub min_order_value: Option<f64>,

    /// Maximum discount cap
    pub max_discount_cap: Option<f64>,

    /// Explicit global cap as stated by the brand
    pub global_cap_amount: Option<f64>,

    /// Absolute brand support amount
    pub brand_support_absolute: Option<f64>,

    /// GST rate as a percentage
    pub gst_rate: Option<f64>,

    /// Slab structure (Flat, Quantity_Slab, Value_Slab, Other)
    pub discount_slab_type: Option<String>,

    /// Claim the minimum of actual discount or agreed amount
    pub min_actual_or_agreed: Option<bool>,

    /// Remove GST from final claim amount
    pub remove_gst_from_final_claim: Option<bool>,

    /// Scheme is over and above existing support
    pub over_and_above: Option<bool>,

    /// Best-bet flag
    pub best_bet: Option<bool>,

    /// Product category
    pub category: Option<String>,

    /// Primary vendor/brand name
    pub vendor_name: Option<String>,

    /// Participating vendors, in source order
    pub vendors: Vec<Vendor>,

    /// Extraction confidence in [0, 1]
    pub confidence: f64,

    /// Whether a stronger extraction pass is required
    pub needs_escalation: bool,

    /// Source document name
    pub source_file: Option<String>,

    /// When this record was created
    pub extracted_at: DateTime<Utc>,
}

impl SchemeRecord {
    /// Create an empty `OTHER/OTHER` record
    pub fn new(extracted_at: DateTime<Utc>) -> Self {
        Self {
            scheme_type: SchemeType::Other,
            scheme_sub_type: SchemeSubType::Other,
            scheme_name: String::new(),
            scheme_description: String::new(),
            remarks: String::new(),
            scheme_period: None,
            duration_start_date: None,
            duration_end_date: None,
            starting_at: None,
            ending_at: None,
            price_drop_date: None,
            discount_type: None,
            discount_value: None,
            min_order_value: None,
            max_discount_cap: None,
            global_cap_amount: None,
            brand_support_absolute: None,
            gst_rate: None,
            discount_slab_type: None,
            min_actual_or_agreed: None,
            remove_gst_from_final_claim: None,
            over_and_above: None,
            best_bet: None,
            category: None,
            vendor_name: None,
            vendors: Vec::new(),
            confidence: 0.5,
            needs_escalation: false,
            source_file: None,
            extracted_at,
        }
    }

    /// Deduplication key over name and duration
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(
            &self.scheme_name,
            self.duration_start_date,
            self.duration_end_date,
        )
    }

    /// Check the record against the canonical schema constraints
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} out of range [0.0, 1.0]", self.confidence));
        }

        let amounts = [
            ("discount_value", self.discount_value),
            ("min_order_value", self.min_order_value),
            ("max_discount_cap", self.max_discount_cap),
            ("global_cap_amount", self.global_cap_amount),
            ("brand_support_absolute", self.brand_support_absolute),
            ("gst_rate", self.gst_rate),
        ];
        for (field, value) in amounts {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{} must be a non-negative number, got {}", field, v));
                }
            }
        }

        for vendor in &self.vendors {
            if vendor.vendor_name.trim().is_empty() {
                return Err("vendor_name is empty".to_string());
            }
            if let Some(amount) = vendor.amount {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(format!(
                        "vendor '{}' amount must be non-negative, got {}",
                        vendor.vendor_name, amount
                    ));
                }
            }
        }

        if self.starting_at.is_some()
            && self.duration_start_date.is_some()
            && self.starting_at != self.duration_start_date
        {
            return Err("starting_at differs from duration_start_date".to_string());
        }
        if self.ending_at.is_some()
            && self.duration_end_date.is_some()
            && self.ending_at != self.duration_end_date
        {
            return Err("ending_at differs from duration_end_date".to_string());
        }
        if let (Some(start), Some(end)) = (self.duration_start_date, self.duration_end_date) {
            if start > end {
                return Err(format!("duration_start_date {} is after duration_end_date {}", start, end));
            }
        }

        if self.price_drop_date.is_some() && self.scheme_sub_type != SchemeSubType::Pdc {
            return Err("price_drop_date is only valid for PDC schemes".to_string());
        }

        Ok(())
    }
}
