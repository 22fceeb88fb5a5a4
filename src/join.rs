//! Context-aware joins between two record sets.
//!
//! A join pairs every record of one set with every record of the other and
//! keeps the pairs whose aggregate contexts satisfy a [`MatchContext`]. It is
//! a cross product, not a key join: one record may match several on the
//! other side and appear in several output rows.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::ContextSchema;
use crate::merge::{resolve_cell_conflict, ConflictStrategy};
use crate::query::{dimension_compatible, get_record_context, timeframe_compatible, EquivalencePolicy};
use crate::record::{Cell, JoinStatus, Record, RecordId};

/// Requirement on a string context dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionMatch {
    Any,
    Same,
}

impl Default for DimensionMatch {
    fn default() -> Self {
        Self::Any
    }
}

/// Requirement on the timeframe dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeMatch {
    Any,
    Overlapping,
}

impl Default for TimeframeMatch {
    fn default() -> Self {
        Self::Any
    }
}

/// Caller-supplied test on a candidate `(a, b)` pair.
#[derive(Clone)]
pub struct RecordPredicate(Arc<dyn Fn(&Record, &Record) -> bool + Send + Sync>);

impl RecordPredicate {
    pub fn new(f: impl Fn(&Record, &Record) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn test(&self, a: &Record, b: &Record) -> bool {
        (self.0)(a, b)
    }
}

impl fmt::Debug for RecordPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordPredicate(..)")
    }
}

/// Which pairs of records join.
///
/// Dimensions are compared on each record's aggregate context (see
/// [`get_record_context`]) under the join's equivalence policy. Every
/// specified dimension must hold, then the predicate, if any. An empty
/// `MatchContext` matches every pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchContext {
    pub timeframe: TimeframeMatch,
    pub scale: DimensionMatch,
    pub source: DimensionMatch,
    pub method: DimensionMatch,

    #[serde(skip)]
    pub predicate: Option<RecordPredicate>,
}

impl MatchContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn overlapping_timeframe(mut self) -> Self {
        self.timeframe = TimeframeMatch::Overlapping;
        self
    }

    #[must_use]
    pub fn same_scale(mut self) -> Self {
        self.scale = DimensionMatch::Same;
        self
    }

    #[must_use]
    pub fn same_source(mut self) -> Self {
        self.source = DimensionMatch::Same;
        self
    }

    #[must_use]
    pub fn same_method(mut self) -> Self {
        self.method = DimensionMatch::Same;
        self
    }

    #[must_use]
    pub fn predicate(
        mut self,
        f: impl Fn(&Record, &Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(RecordPredicate::new(f));
        self
    }

    fn contexts_match(
        &self,
        a: &ContextSchema,
        b: &ContextSchema,
        policy: &EquivalencePolicy,
    ) -> bool {
        let same = |wanted: DimensionMatch, x: Option<&str>, y: Option<&str>, p| {
            wanted == DimensionMatch::Any || dimension_compatible(x, y, p)
        };

        (self.timeframe == TimeframeMatch::Any
            || timeframe_compatible(a.timeframe.as_ref(), b.timeframe.as_ref(), policy.timeframe))
            && same(self.scale, a.scale.as_deref(), b.scale.as_deref(), policy.scale)
            && same(self.source, a.source_system(), b.source_system(), policy.source)
            && same(self.method, a.method.as_deref(), b.method.as_deref(), policy.method)
    }
}

/// How cells present on both sides of a matched pair are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueStrategy {
    /// Concatenate both cells (always superposes).
    Sup,

    /// Context-aware resolution.
    Merge,

    /// Take the left cell.
    AWins,

    /// Take the right cell.
    BWins,
}

impl Default for ValueStrategy {
    fn default() -> Self {
        Self::Sup
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl Default for JoinType {
    fn default() -> Self {
        Self::Inner
    }
}

impl JoinType {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
            Self::Full => "full",
        }
    }

    const fn keeps_left(self) -> bool {
        matches!(self, Self::Left | Self::Full)
    }

    const fn keeps_right(self) -> bool {
        matches!(self, Self::Right | Self::Full)
    }
}

/// Options for [`context_join`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub match_context: MatchContext,
    pub value_strategy: ValueStrategy,
    pub join_type: JoinType,
    pub equivalence: EquivalencePolicy,
}

impl JoinOptions {
    #[must_use]
    pub fn new(join_type: JoinType) -> Self {
        Self {
            join_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn match_context(mut self, match_context: MatchContext) -> Self {
        self.match_context = match_context;
        self
    }

    #[must_use]
    pub fn value_strategy(mut self, value_strategy: ValueStrategy) -> Self {
        self.value_strategy = value_strategy;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    pub matched_pairs: usize,
    pub left_only: usize,
    pub right_only: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResult {
    pub records: Vec<Record>,
    pub stats: JoinStats,
}

fn combine_cells(a: &Cell, b: &Cell, strategy: ValueStrategy, policy: &EquivalencePolicy) -> Cell {
    match strategy {
        ValueStrategy::Sup => resolve_cell_conflict(a, b, &ConflictStrategy::KeepAll, policy),
        ValueStrategy::Merge => resolve_cell_conflict(a, b, &ConflictStrategy::ContextAware, policy),
        ValueStrategy::AWins => a.clone(),
        ValueStrategy::BWins => b.clone(),
    }
}

/// Joins one matched pair into a new record.
///
/// Fields unique to either side are copied; shared fields are combined per
/// `strategy`. The result gets a fresh id, `joined_from = [a, b]` and the
/// `matched` status. Flat attributes are unioned with `a` winning.
#[must_use]
pub fn join_records(
    a: &Record,
    b: &Record,
    strategy: ValueStrategy,
    policy: &EquivalencePolicy,
) -> Record {
    let fields: BTreeSet<&String> = a.cells.keys().chain(b.cells.keys()).collect();
    let mut cells = BTreeMap::new();
    for field in fields {
        let cell = match (a.cells.get(field), b.cells.get(field)) {
            (Some(ca), Some(cb)) => combine_cells(ca, cb, strategy, policy),
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

    Record {
        record_id: RecordId::generate(),
        cells,
        attributes,
        created_at: a.created_at.min(b.created_at),
        updated_at: a.updated_at.max(b.updated_at),
        merged_from: Vec::new(),
        joined_from: vec![a.record_id.clone(), b.record_id.clone()],
        join_status: Some(JoinStatus::Matched),
    }
}

/// Joins two record sets on context.
///
/// Every `(a, b)` pair is tested (O(|A|·|B|)). Matched rows come first, in
/// `a`-major order, followed by unmatched left records (`left`, `full`) and
/// then unmatched right records (`right`, `full`), each tagged with its
/// [`JoinStatus`]. Inputs are not modified.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::{context_join, JoinOptions, JoinStatus, JoinType, MatchContext, Record};
///
/// let left = vec![Record::builder("1").build().unwrap()];
/// let right = vec![Record::builder("2").build().unwrap(), Record::builder("3").build().unwrap()];
///
/// let options = JoinOptions::new(JoinType::Inner).match_context(MatchContext::new().predicate(|_, _| true));
/// let result = context_join(&left, &right, &options);
///
/// assert_eq!(result.records.len(), 2);
/// assert!(result.records.iter().all(|r| r.join_status == Some(JoinStatus::Matched)));
/// ```
#[must_use]
pub fn context_join(set_a: &[Record], set_b: &[Record], options: &JoinOptions) -> JoinResult {
    let contexts_a: Vec<ContextSchema> = set_a.iter().map(get_record_context).collect();
    let contexts_b: Vec<ContextSchema> = set_b.iter().map(get_record_context).collect();
    let match_context = &options.match_context;

    let mut records = Vec::new();
    let mut matched_a = vec![false; set_a.len()];
    let mut matched_b = vec![false; set_b.len()];

    for (i, a) in set_a.iter().enumerate() {
        for (j, b) in set_b.iter().enumerate() {
            let matches = match_context.contexts_match(&contexts_a[i], &contexts_b[j], &options.equivalence)
                && match_context.predicate.as_ref().map_or(true, |p| p.test(a, b));
            if !matches {
                continue;
            }
            matched_a[i] = true;
            matched_b[j] = true;
            let joined = join_records(a, b, options.value_strategy, &options.equivalence);
            debug!(
                left = %a.record_id,
                right = %b.record_id,
                result = %joined.record_id,
                "joined record pair"
            );
            records.push(joined);
        }
    }

    let mut stats = JoinStats {
        matched_pairs: records.len(),
        ..JoinStats::default()
    };

    if options.join_type.keeps_left() {
        for (a, _) in set_a.iter().zip(&matched_a).filter(|(_, m)| !**m) {
            records.push(a.tagged(JoinStatus::LeftOnly));
            stats.left_only += 1;
        }
    }
    if options.join_type.keeps_right() {
        for (b, _) in set_b.iter().zip(&matched_b).filter(|(_, m)| !**m) {
            records.push(b.tagged(JoinStatus::RightOnly));
            stats.right_only += 1;
        }
    }

    info!(
        left = set_a.len(),
        right = set_b.len(),
        join_type = options.join_type.name(),
        matched_pairs = stats.matched_pairs,
        left_only = stats.left_only,
        right_only = stats.right_only,
        "context join complete"
    );

    JoinResult { records, stats }
}
