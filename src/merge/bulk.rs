use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::merge::smart::{smart_merge, MergeOptions};
use crate::merge::strategy::ConflictStrategy;
use crate::query::{get_primary_source, EquivalencePolicy};
use crate::record::{Record, RecordId};

/// Options for [`bulk_merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkMergeOptions {
    pub conflict_strategy: ConflictStrategy,

    /// Ranked source systems, most trusted first. Records whose primary
    /// source is not listed sort after all ranked ones.
    pub source_preference: Vec<String>,

    /// Keep the base record's id on the result.
    pub preserve_ids: bool,

    pub equivalence: EquivalencePolicy,
}

impl BulkMergeOptions {
    #[must_use]
    pub fn with_strategy(strategy: ConflictStrategy) -> Self {
        Self {
            conflict_strategy: strategy,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn source_preference<I, S>(mut self, preference: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_preference = preference.into_iter().map(Into::into).collect();
        self
    }

    fn rank(&self, record: &Record) -> usize {
        get_primary_source(record)
            .and_then(|source| {
                self.source_preference
                    .iter()
                    .position(|p| p.eq_ignore_ascii_case(&source))
            })
            .unwrap_or(usize::MAX)
    }
}

/// What a bulk-merge step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// The record was chosen as the base the others fold into.
    Base,

    /// The record was folded into the accumulated result.
    Merged,
}

impl fmt::Display for MergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base => write!(f, "base"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Audit entry explaining one step of a bulk merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeDecision {
    pub action: MergeAction,

    /// The input record this step consumed.
    pub record_id: RecordId,

    /// Source systems contributed by this step.
    pub sources: Vec<String>,

    /// Strategy name used for the fold.
    pub strategy: String,

    /// Change in superposed alternatives caused by this step. Negative when
    /// the fold collapsed alternatives that the accumulated record held.
    pub sup_created: i64,

    pub reason: String,
}

/// Result of [`bulk_merge`]. `record` is `None` only for empty input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkMergeResult {
    pub record: Option<Record>,
    pub decisions: Vec<MergeDecision>,
}

/// Merges N candidate records into one.
///
/// Candidates are ordered by `source_preference` (stable, so equally ranked
/// records keep their input order), the first becomes the base, and the
/// rest are folded in left to right with [`smart_merge`]. Each step is
/// logged as a [`MergeDecision`].
#[must_use]
pub fn bulk_merge(records: &[Record], options: &BulkMergeOptions) -> BulkMergeResult {
    let mut ranked: Vec<(usize, &Record)> = records.iter().map(|r| (options.rank(r), r)).collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    let mut iter = ranked.into_iter();
    let Some((base_rank, base)) = iter.next() else {
        return BulkMergeResult {
            record: None,
            decisions: Vec::new(),
        };
    };

    let merge_options = MergeOptions {
        conflict_strategy: options.conflict_strategy.clone(),
        preserve_ids: options.preserve_ids,
        equivalence: options.equivalence,
    };
    let strategy = options.conflict_strategy.to_string();

    let base_source = get_primary_source(base);
    let reason = match (&base_source, base_rank) {
        (Some(source), rank) if rank != usize::MAX => {
            format!("highest-ranked source '{source}' (rank {rank})")
        }
        _ => "first candidate; no ranked source".to_string(),
    };
    let mut decisions = vec![MergeDecision {
        action: MergeAction::Base,
        record_id: base.record_id.clone(),
        sources: base_source.into_iter().collect(),
        strategy: strategy.clone(),
        sup_created: 0,
        reason,
    }];

    let mut acc = base.clone();
    for (_, candidate) in iter {
        let before = acc.superposition_count();
        let merged = smart_merge(&acc, candidate, &merge_options);
        let sup_created = superposition_delta(before, merged.superposition_count());
        let source = get_primary_source(candidate);

        debug!(
            candidate = %candidate.record_id,
            sup_created,
            "folded candidate into bulk merge"
        );
        decisions.push(MergeDecision {
            action: MergeAction::Merged,
            record_id: candidate.record_id.clone(),
            reason: format!(
                "merged from {} with {strategy}; {}",
                source.as_deref().unwrap_or("unknown source"),
                describe_delta(sup_created),
            ),
            sources: source.into_iter().collect(),
            strategy: strategy.clone(),
            sup_created,
        });
        acc = merged;
    }

    info!(
        candidates = records.len(),
        result = %acc.record_id,
        strategy = %strategy,
        "bulk merge complete"
    );

    BulkMergeResult {
        record: Some(acc),
        decisions,
    }
}

fn superposition_delta(before: usize, after: usize) -> i64 {
    let before = i64::try_from(before).unwrap_or(i64::MAX);
    let after = i64::try_from(after).unwrap_or(i64::MAX);
    after - before
}

fn describe_delta(delta: i64) -> String {
    if delta < 0 {
        format!("{} superposition(s) collapsed", delta.unsigned_abs())
    } else {
        format!("{delta} superposition(s) created")
    }
}
