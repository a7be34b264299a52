//! Flat persisted row shape
//!
//! One row per record. Enumerations become their wire names, dates become
//! `YYYY-MM-DD`, yes/no flags become `Yes`/`No`, and the vendor list is
//! joined into a single cell. Writers (CSV, spreadsheets) live downstream.

use crate::SchemeRecord;
use chrono::NaiveDate;
use serde::Serialize;

/// Flattened view of a [`SchemeRecord`]
///
/// Columns mirror the record's field names, with `scheme_id` first.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemeRow {
    pub scheme_id: String,
    pub scheme_type: String,
    pub scheme_sub_type: String,
    pub scheme_name: String,
    pub scheme_description: String,
    pub remarks: String,
    pub scheme_period: Option<String>,
    pub duration_start_date: Option<String>,
    pub duration_end_date: Option<String>,
    pub starting_at: Option<String>,
    pub ending_at: Option<String>,
    pub price_drop_date: Option<String>,
    pub discount_type: Option<String>,
    pub discount_value: Option<f64>,
    pub min_order_value: Option<f64>,
    pub max_discount_cap: Option<f64>,
    pub global_cap_amount: Option<f64>,
    pub brand_support_absolute: Option<f64>,
    pub gst_rate: Option<f64>,
    pub discount_slab_type: Option<String>,
    pub min_actual_or_agreed: Option<String>,
    pub remove_gst_from_final_claim: Option<String>,
    pub over_and_above: Option<String>,
    pub best_bet: Option<String>,
    pub category: Option<String>,
    pub vendor_name: Option<String>,
    pub vendors: String,
    pub confidence: f64,
    pub needs_escalation: bool,
    pub source_file: Option<String>,
    pub extracted_at: String,
}

fn date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

fn yes_no(flag: Option<bool>) -> Option<String> {
    flag.map(|f| if f { "Yes" } else { "No" }.to_string())
}

impl From<&SchemeRecord> for SchemeRow {
    fn from(r: &SchemeRecord) -> Self {
        let vendors = r
            .vendors
            .iter()
            .map(|v| {
                let mut cell = v.vendor_name.clone();
                if let Some(location) = &v.location {
                    cell.push_str(&format!(" ({})", location));
                }
                if let Some(amount) = v.amount {
                    cell.push_str(&format!(": {}", amount));
                }
                cell
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            scheme_id: r.fingerprint().to_string(),
            scheme_type: r.scheme_type.as_str().to_string(),
            scheme_sub_type: r.scheme_sub_type.as_str().to_string(),
            scheme_name: r.scheme_name.clone(),
            scheme_description: r.scheme_description.clone(),
            remarks: r.remarks.clone(),
            scheme_period: r.scheme_period.map(|p| p.as_str().to_string()),
            duration_start_date: date(r.duration_start_date),
            duration_end_date: date(r.duration_end_date),
            starting_at: date(r.starting_at),
            ending_at: date(r.ending_at),
            price_drop_date: date(r.price_drop_date),
            discount_type: r.discount_type.map(|d| d.as_str().to_string()),
            discount_value: r.discount_value,
            min_order_value: r.min_order_value,
            max_discount_cap: r.max_discount_cap,
            global_cap_amount: r.global_cap_amount,
            brand_support_absolute: r.brand_support_absolute,
            gst_rate: r.gst_rate,
            discount_slab_type: r.discount_slab_type.clone(),
            min_actual_or_agreed: yes_no(r.min_actual_or_agreed),
            remove_gst_from_final_claim: yes_no(r.remove_gst_from_final_claim),
            over_and_above: yes_no(r.over_and_above),
            best_bet: yes_no(r.best_bet),
            category: r.category.clone(),
            vendor_name: r.vendor_name.clone(),
            vendors,
            confidence: r.confidence,
            needs_escalation: r.needs_escalation,
            source_file: r.source_file.clone(),
            extracted_at: r.extracted_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiscountType, SchemeSubType, SchemeType, Vendor};
    use chrono::{DateTime, Utc};

    #[test]
    fn test_flatten() {
        let mut r = SchemeRecord::new(DateTime::<Utc>::from_timestamp(0, 0).unwrap());
        r.scheme_type = SchemeType::BuySide;
        r.scheme_sub_type = SchemeSubType::PeriodicClaim;
        r.scheme_name = "JBP Q1".to_string();
        r.duration_start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        r.discount_type = Some(DiscountType::Flat);
        r.remove_gst_from_final_claim = Some(false);
        r.vendors = vec![
            Vendor::new("Acme Corp").with_location("Mumbai").with_amount(20000.0),
            Vendor::new("Beta"),
        ];

        let row = SchemeRow::from(&r);
        assert_eq!(row.scheme_id, r.fingerprint().to_string());
        assert_eq!(row.scheme_type, "BUY_SIDE");
        assert_eq!(row.scheme_sub_type, "PERIODIC_CLAIM");
        assert_eq!(row.duration_start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(row.duration_end_date, None);
        assert_eq!(row.discount_type.as_deref(), Some("FLAT"));
        assert_eq!(row.remove_gst_from_final_claim.as_deref(), Some("No"));
        assert_eq!(row.vendors, "Acme Corp (Mumbai): 20000; Beta");
    }
}
