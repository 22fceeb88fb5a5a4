//! Normalization of record collections.
//!
//! Callers hand the engine records in whatever shape they hold them: a
//! list, an id-keyed map, or raw JSON from the UI layer. Everything is
//! normalized to a `Vec<Record>` first. Shapes that are not recognized
//! produce an empty collection rather than an error.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::record::Record;

/// Converts a collection of records into the engine's canonical list.
pub trait IntoRecords {
    fn into_records(self) -> Vec<Record>;
}

impl IntoRecords for Vec<Record> {
    fn into_records(self) -> Vec<Record> {
        self
    }
}

impl IntoRecords for &[Record] {
    fn into_records(self) -> Vec<Record> {
        self.to_vec()
    }
}

impl<K> IntoRecords for HashMap<K, Record> {
    fn into_records(self) -> Vec<Record> {
        let mut records: Vec<Record> = self.into_values().collect();
        // HashMap iteration order is unspecified; keep results reproducible.
        records.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        records
    }
}

impl<K: Ord> IntoRecords for BTreeMap<K, Record> {
    fn into_records(self) -> Vec<Record> {
        self.into_values().collect()
    }
}

impl IntoRecords for &serde_json::Value {
    fn into_records(self) -> Vec<Record> {
        normalize_json(self)
    }
}

impl IntoRecords for serde_json::Value {
    fn into_records(self) -> Vec<Record> {
        normalize_json(&self)
    }
}

/// Normalizes any supported collection into a list of records.
pub fn normalize_records(input: impl IntoRecords) -> Vec<Record> {
    input.into_records()
}

/// JSON arrays yield their record-shaped elements; objects are read as
/// `{ id: record }` maps, where the key stands in for a missing
/// `record_id`. Elements that are not records are skipped.
fn normalize_json(value: &serde_json::Value) -> Vec<Record> {
    let elements: Vec<(Option<&str>, &serde_json::Value)> = match value {
        serde_json::Value::Array(items) => items.iter().map(|item| (None, item)).collect(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(key, item)| (Some(key.as_str()), item))
            .collect(),
        other => {
            debug!(kind = json_kind(other), "unrecognized record collection shape");
            return Vec::new();
        }
    };

    elements
        .into_iter()
        .enumerate()
        .filter_map(|(index, (key, element))| {
            match serde_json::from_value::<Record>(with_key_as_id(element, key)) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!(index, key, error = %err, "skipping non-record element");
                    None
                }
            }
        })
        .collect()
}

fn with_key_as_id(element: &serde_json::Value, key: Option<&str>) -> serde_json::Value {
    let mut element = element.clone();
    if let (Some(key), serde_json::Value::Object(fields)) = (key, &mut element) {
        if !fields.contains_key("record_id") && !fields.contains_key("id") {
            fields.insert("record_id".to_string(), serde_json::Value::from(key));
        }
    }
    element
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
