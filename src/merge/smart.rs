use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::merge::strategy::{resolve_cell_conflict, ConflictStrategy};
use crate::query::EquivalencePolicy;
use crate::record::{Record, RecordId};

/// Options for [`smart_merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub conflict_strategy: ConflictStrategy,

    /// Keep the first operand's id instead of minting a new one.
    pub preserve_ids: bool,

    pub equivalence: EquivalencePolicy,
}

impl MergeOptions {
    #[must_use]
    pub fn with_strategy(strategy: ConflictStrategy) -> Self {
        Self {
            conflict_strategy: strategy,
            ..Self::default()
        }
    }
}

/// Merges two records field by field.
///
/// Fields present on one side only are copied; fields present on both are
/// reconciled with `options.conflict_strategy`. Neither input is modified.
/// The result gets a fresh id unless `options.preserve_ids` is set, and its
/// `merged_from` lists the lineage of both operands.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use kyro_reconcile::{smart_merge, ContextSchema, MergeOptions, Observation, Record, SourceRef};
///
/// let t = Utc::now();
/// let crm = ContextSchema::new().with_source(SourceRef::system("crm"));
/// let a = Record::builder("a")
///     .observe("name", Observation::new("Acme", crm.clone(), t))
///     .build()
///     .unwrap();
/// let b = Record::builder("b")
///     .observe("name", Observation::new("Acme Corp", crm, t + Duration::hours(1)))
///     .observe("city", Observation::new("Berlin", ContextSchema::new(), t))
///     .build()
///     .unwrap();
///
/// let merged = smart_merge(&a, &b, &MergeOptions::default());
/// assert_eq!(merged.primary_value("name").and_then(|v| v.as_string()), Some("Acme Corp"));
/// assert!(merged.cell("city").is_some());
/// assert_eq!(merged.merged_from.len(), 2);
/// ```
#[must_use]
pub fn smart_merge(a: &Record, b: &Record, options: &MergeOptions) -> Record {
    let fields: BTreeSet<&String> = a.cells.keys().chain(b.cells.keys()).collect();

    let mut cells = BTreeMap::new();
    for field in fields {
        let cell = match (a.cells.get(field), b.cells.get(field)) {
            (Some(ca), Some(cb)) => resolve_cell_conflict(
                ca,
                cb,
                &options.conflict_strategy,
                &options.equivalence,
            ),
            (Some(only), None) | (None, Some(only)) => only.clone(),
            (None, None) => continue,
        };
        if !cell.is_empty() {
            cells.insert(field.clone(), cell);
        }
    }

    let mut attributes = a.attributes.clone();
    for (field, value) in &b.attributes {
        attributes
            .entry(field.clone())
            .or_insert_with(|| value.clone());
    }

    let mut lineage: Vec<RecordId> = Vec::new();
    for id in a.lineage().into_iter().chain(b.lineage()) {
        if !lineage.contains(&id) {
            lineage.push(id);
        }
    }

    let record_id = if options.preserve_ids {
        a.record_id.clone()
    } else {
        RecordId::generate()
    };
    let merged = Record {
        record_id,
        cells,
        attributes,
        created_at: a.created_at.min(b.created_at),
        updated_at: a.updated_at.max(b.updated_at),
        merged_from: lineage,
        joined_from: Vec::new(),
        join_status: None,
    };

    debug!(
        left = %a.record_id,
        right = %b.record_id,
        result = %merged.record_id,
        strategy = %options.conflict_strategy,
        superposed = merged.superposition_count(),
        "merged record pair"
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSchema;
    use crate::observation::Observation;
    use crate::source::SourceRef;
    use chrono::{DateTime, Duration, Utc};

    fn obs(value: &str, system: &str, at: DateTime<Utc>) -> Observation {
        Observation::new(value, ContextSchema::new().with_source(SourceRef::system(system)), at)
    }

    #[test]
    fn test_unique_fields_copy_through() {
        let t = Utc::now();
        let a = Record::builder("a").observe("name", obs("Acme", "crm", t)).build().unwrap();
        let b = Record::builder("b").observe("phone", obs("555", "erp", t)).build().unwrap();
        let merged = smart_merge(&a, &b, &MergeOptions::default());
        assert_eq!(merged.cells.len(), 2);
        assert_eq!(merged.cell("name"), a.cell("name"));
        assert_eq!(merged.cell("phone"), b.cell("phone"));
    }

    #[test]
    fn test_shared_field_superposes_different_sources() {
        let t = Utc::now();
        let a = Record::builder("a").observe("name", obs("Acme", "crm", t)).build().unwrap();
        let b = Record::builder("b").observe("name", obs("ACME", "erp", t)).build().unwrap();
        let merged = smart_merge(&a, &b, &MergeOptions::default());
        assert_eq!(merged.cell("name").unwrap().len(), 2);
        assert_eq!(merged.superposition_count(), 1);
    }

    #[test]
    fn test_self_merge_is_idempotent() {
        let t = Utc::now();
        let a = Record::builder("a")
            .observe("name", obs("Acme", "crm", t))
            .observe("name", Observation::new("Acme GmbH", ContextSchema::new().with_method("declared"), t))
            .build()
            .unwrap();
        let merged = smart_merge(&a, &a.clone(), &MergeOptions::default());
        assert_eq!(merged.cell("name").unwrap().len(), 2);
        assert_eq!(merged.cell("name").unwrap().values(), a.cell("name").unwrap().values());
    }

    #[test]
    fn test_ids_and_lineage() {
        let t = Utc::now();
        let a = Record::builder("a").observe("x", obs("1", "crm", t)).build().unwrap();
        let b = Record::builder("b").observe("x", obs("2", "crm", t)).build().unwrap();

        let fresh = smart_merge(&a, &b, &MergeOptions::default());
        assert_ne!(fresh.record_id, a.record_id);
        assert_eq!(fresh.merged_from, vec![RecordId::from("a"), RecordId::from("b")]);

        let kept = smart_merge(
            &a,
            &b,
            &MergeOptions {
                preserve_ids: true,
                ..MergeOptions::default()
            },
        );
        assert_eq!(kept.record_id, a.record_id);

        let c = Record::builder("c").build().unwrap();
        let chained = smart_merge(&fresh, &c, &MergeOptions::default());
        assert_eq!(chained.merged_from.len(), 3);
    }

    #[test]
    fn test_timestamps_and_attributes() {
        let t = Utc::now();
        let a = Record::builder("a")
            .attribute("tier", "gold")
            .created_at(t - Duration::days(3))
            .updated_at(t - Duration::days(1))
            .build()
            .unwrap();
        let b = Record::builder("b")
            .attribute("tier", "silver")
            .attribute("region", "emea")
            .created_at(t - Duration::days(5))
            .updated_at(t)
            .build()
            .unwrap();
        let merged = smart_merge(&a, &b, &MergeOptions::default());
        assert_eq!(merged.created_at, t - Duration::days(5));
        assert_eq!(merged.updated_at, t);
        assert_eq!(merged.attributes["tier"].as_string(), Some("gold"));
        assert_eq!(merged.attributes["region"].as_string(), Some("emea"));
    }

    #[test]
    fn test_inputs_untouched() {
        let t = Utc::now();
        let a = Record::builder("a").observe("x", obs("1", "crm", t)).build().unwrap();
        let b = Record::builder("b").observe("x", obs("2", "crm", t + Duration::seconds(1))).build().unwrap();
        let (a0, b0) = (a.clone(), b.clone());
        let _ = smart_merge(&a, &b, &MergeOptions::with_strategy(ConflictStrategy::LatestWins));
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }
}
