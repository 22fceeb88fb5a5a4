use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Separator between identity field values in a signature.
pub const SIGNATURE_SEPARATOR: &str = "|||";

/// How two identity signatures are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupeAlgorithm {
    /// Signatures must be identical. Threshold is ignored.
    Exact,

    /// Jaccard similarity over whitespace-separated tokens.
    Fuzzy,
}

impl Default for DedupeAlgorithm {
    fn default() -> Self {
        Self::Exact
    }
}

impl DedupeAlgorithm {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// Builds a record's identity signature.
///
/// Each identity field contributes its primary cell value (or flat attribute
/// when the cell is absent or blank), lower-cased and trimmed; missing fields
/// contribute an empty segment. Returns `None` when every segment is empty.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use kyro_reconcile::{identity_signature, ContextSchema, Observation, Record};
///
/// let record = Record::builder("r1")
///     .observe("name", Observation::new("  Acme Corp ", ContextSchema::new(), Utc::now()))
///     .attribute("country", "DE")
///     .build()
///     .unwrap();
///
/// let identity = vec!["name".to_string(), "country".to_string()];
/// assert_eq!(identity_signature(&record, &identity).as_deref(), Some("acme corp|||de"));
/// assert_eq!(identity_signature(&record, &["phone".to_string()]), None);
/// ```
#[must_use]
pub fn identity_signature(record: &Record, identity: &[String]) -> Option<String> {
    let parts: Vec<String> = identity
        .iter()
        .map(|field| {
            record
                .field_value(field)
                .map(|v| v.signature_text().trim().to_lowercase())
                .unwrap_or_default()
        })
        .collect();

    if parts.iter().all(String::is_empty) {
        return None;
    }
    Some(parts.join(SIGNATURE_SEPARATOR))
}

fn tokens(signature: &str) -> HashSet<&str> {
    signature
        .split(SIGNATURE_SEPARATOR)
        .flat_map(str::split_whitespace)
        .collect()
}

/// Similarity of two signatures in `[0, 1]`.
#[must_use]
pub fn signature_similarity(a: &str, b: &str, algorithm: DedupeAlgorithm) -> f64 {
    match algorithm {
        DedupeAlgorithm::Exact => {
            if a == b {
                1.0
            } else {
                0.0
            }
        }
        DedupeAlgorithm::Fuzzy => {
            let ta = tokens(a);
            let tb = tokens(b);
            let union = ta.union(&tb).count();
            if union == 0 {
                return if a == b { 1.0 } else { 0.0 };
            }
            let shared = ta.intersection(&tb).count();
            shared as f64 / union as f64
        }
    }
}
