//! Record identity and reconciliation
//!
//! A scheme's identity is its name plus duration window. Two extraction
//! attempts that agree on that triple describe the same scheme even when
//! their confidence, vendors or financial fields differ.

use crate::SchemeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Number of hex characters kept from the digest
pub const FINGERPRINT_LEN: usize = 10;

/// Short deterministic digest of `(scheme_name, start, end)`
///
/// Collision-tolerant: the shortened width is meant for human-scale
/// deduplication, not global uniqueness.
///
/// # Examples
///
/// ```
/// use scheme_domain::Fingerprint;
///
/// let a = Fingerprint::of("JBP Q1", None, None);
/// let b = Fingerprint::of("JBP Q1", None, None);
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of an identity triple
    pub fn of(scheme_name: &str, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let material = format!(
            "{}|{}|{}",
            scheme_name,
            start.map(|d| d.to_string()).unwrap_or_default(),
            end.map(|d| d.to_string()).unwrap_or_default(),
        );
        let digest = Sha256::digest(material.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex[..FINGERPRINT_LEN].to_string())
    }

    /// The digest as a hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collapse records sharing a fingerprint
///
/// The highest-confidence record wins each identity; on equal confidence the
/// earlier record is kept. Output order follows first appearance.
pub fn reconcile(records: Vec<SchemeRecord>) -> Vec<SchemeRecord> {
    let mut slots: Vec<SchemeRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<Fingerprint, usize> = HashMap::new();

    for record in records {
        let key = record.fingerprint();
        match index.get(&key) {
            Some(&slot) => {
                if record.confidence > slots[slot].confidence {
                    slots[slot] = record;
                }
            }
            None => {
                index.insert(key, slots.len());
                slots.push(record);
            }
        }
    }

    slots
}
