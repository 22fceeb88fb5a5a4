use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dedupe::cluster::{cluster_records, DuplicateCluster};
use crate::dedupe::signature::DedupeAlgorithm;
use crate::error::ValidationError;
use crate::merge::{bulk_merge, BulkMergeOptions, ConflictStrategy, MergeDecision};
use crate::query::{get_primary_source, EquivalencePolicy};
use crate::record::{Record, RecordId};

/// How a cluster of duplicates is collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextStrategy {
    /// Keep the latest member when all members share a source; otherwise
    /// merge context-aware so differing sources survive as superpositions.
    Preserve,

    /// Always merge with latest-wins.
    Merge,

    /// Keep only the most recently updated member.
    Latest,
}

impl Default for ContextStrategy {
    fn default() -> Self {
        Self::Preserve
    }
}

impl ContextStrategy {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Merge => "merge",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for ContextStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_threshold() -> f64 {
    0.85
}

/// Options for [`smart_dedupe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeOptions {
    /// Fields whose values form the identity signature.
    pub identity: Vec<String>,

    pub context_strategy: ContextStrategy,

    pub algorithm: DedupeAlgorithm,

    /// Minimum fuzzy similarity to join a cluster. Ignored by `exact`.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Ranked source systems used when a cluster is merged.
    pub source_preference: Vec<String>,

    pub equivalence: EquivalencePolicy,
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            identity: Vec::new(),
            context_strategy: ContextStrategy::default(),
            algorithm: DedupeAlgorithm::default(),
            threshold: default_threshold(),
            source_preference: Vec::new(),
            equivalence: EquivalencePolicy::default(),
        }
    }
}

impl DedupeOptions {
    /// Options keyed on the given identity fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyIdentity` if no field is given.
    pub fn for_identity<I, S>(fields: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identity: Vec<String> = fields.into_iter().map(Into::into).collect();
        if identity.is_empty() {
            return Err(ValidationError::EmptyIdentity);
        }
        Ok(Self {
            identity,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn context_strategy(mut self, strategy: ContextStrategy) -> Self {
        self.context_strategy = strategy;
        self
    }

    #[must_use]
    pub fn algorithm(mut self, algorithm: DedupeAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
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

    /// Checks the threshold lies in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ThresholdOutOfRange` otherwise.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ValidationError::ThresholdOutOfRange {
                value: self.threshold,
            });
        }
        Ok(())
    }
}

/// What happened to a cluster of duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeAction {
    /// One member was kept and the others discarded.
    KeptLatest,

    /// The members were merged into a new record.
    Merged,
}

/// Audit entry for one duplicate cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupeDecision {
    pub action: DedupeAction,

    pub strategy: ContextStrategy,

    /// The seed's identity signature.
    pub signature: Option<String>,

    /// Cluster members in input order.
    pub members: Vec<RecordId>,

    /// Id of the record that represents the cluster in the output.
    pub result: RecordId,

    /// Members dropped without being merged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discarded: Vec<RecordId>,

    /// Per-step log when the cluster was merged.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge_decisions: Vec<MergeDecision>,

    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeStats {
    /// Clusters with more than one member.
    pub clusters_found: usize,

    /// Input length minus output length.
    pub records_merged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupeResult {
    pub records: Vec<Record>,
    pub decisions: Vec<DedupeDecision>,
    pub stats: DedupeStats,
}

/// Most recently updated member; ties go to the earliest in input order.
fn latest_member<'a>(members: &[&'a Record]) -> Option<&'a Record> {
    let mut best: Option<&'a Record> = None;
    for &member in members {
        if best.map_or(true, |b| member.updated_at > b.updated_at) {
            best = Some(member);
        }
    }
    best
}

/// True when every member's primary source is the same system. Members
/// without a source count as one more distinct "unknown" source.
fn share_one_source(members: &[&Record]) -> bool {
    let mut sources = members
        .iter()
        .map(|r| get_primary_source(r).map(|s| s.to_ascii_lowercase()));
    match sources.next() {
        Some(first) => sources.all(|s| s == first),
        None => true,
    }
}

fn keep_latest(
    members: &[&Record],
    cluster: &DuplicateCluster,
    strategy: ContextStrategy,
    reason: &str,
) -> Option<(Record, DedupeDecision)> {
    let keep = latest_member(members)?;
    let discarded = members
        .iter()
        .filter(|m| !std::ptr::eq(**m, keep))
        .map(|m| m.record_id.clone())
        .collect();
    let decision = DedupeDecision {
        action: DedupeAction::KeptLatest,
        strategy,
        signature: cluster.signature.clone(),
        members: members.iter().map(|m| m.record_id.clone()).collect(),
        result: keep.record_id.clone(),
        discarded,
        merge_decisions: Vec::new(),
        reason: reason.to_string(),
    };
    Some((keep.clone(), decision))
}

fn merge_members(
    members: &[&Record],
    cluster: &DuplicateCluster,
    options: &DedupeOptions,
    conflict_strategy: ConflictStrategy,
    reason: String,
) -> Option<(Record, DedupeDecision)> {
    let owned: Vec<Record> = members.iter().map(|m| (*m).clone()).collect();
    let bulk = bulk_merge(
        &owned,
        &BulkMergeOptions {
            conflict_strategy,
            source_preference: options.source_preference.clone(),
            preserve_ids: false,
            equivalence: options.equivalence,
        },
    );
    let record = bulk.record?;
    let decision = DedupeDecision {
        action: DedupeAction::Merged,
        strategy: options.context_strategy,
        signature: cluster.signature.clone(),
        members: members.iter().map(|m| m.record_id.clone()).collect(),
        result: record.record_id.clone(),
        discarded: Vec::new(),
        merge_decisions: bulk.decisions,
        reason,
    };
    Some((record, decision))
}

fn resolve_cluster(
    members: &[&Record],
    cluster: &DuplicateCluster,
    options: &DedupeOptions,
) -> Option<(Record, DedupeDecision)> {
    match options.context_strategy {
        ContextStrategy::Preserve if share_one_source(members) => keep_latest(
            members,
            cluster,
            options.context_strategy,
            "all members share one source; kept the most recently updated",
        ),
        ContextStrategy::Preserve => merge_members(
            members,
            cluster,
            options,
            ConflictStrategy::ContextAware,
            "members come from different sources; merged context-aware".to_string(),
        ),
        ContextStrategy::Merge => merge_members(
            members,
            cluster,
            options,
            ConflictStrategy::LatestWins,
            "merged with latest-wins".to_string(),
        ),
        ContextStrategy::Latest => keep_latest(
            members,
            cluster,
            options.context_strategy,
            "kept the most recently updated member",
        ),
    }
}

/// Finds and collapses duplicate records.
///
/// Records are clustered by identity signature (see [`cluster_records`]),
/// then every cluster with more than one member is resolved per
/// `options.context_strategy`. Singletons pass through unchanged. Output
/// follows cluster order, which is the input order of each cluster's seed.
///
/// An empty `identity` is a no-op: the input is returned as is with no
/// decisions.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use kyro_reconcile::{smart_dedupe, ContextSchema, DedupeOptions, Observation, Record, SourceRef};
///
/// let t = Utc::now();
/// let obs = |system: &str, at| {
///     Observation::new("Acme Corp", ContextSchema::new().with_source(SourceRef::system(system)), at)
/// };
/// let records = vec![
///     Record::builder("a").observe("name", obs("salesforce", t)).build().unwrap(),
///     Record::builder("b").observe("name", obs("hubspot", t + Duration::hours(1))).build().unwrap(),
/// ];
///
/// let result = smart_dedupe(&records, &DedupeOptions::for_identity(["name"]).unwrap());
/// assert_eq!(result.records.len(), 1);
/// assert_eq!(result.stats.records_merged, 1);
/// ```
#[must_use]
pub fn smart_dedupe(records: &[Record], options: &DedupeOptions) -> DedupeResult {
    if options.identity.is_empty() {
        debug!("dedupe called without identity fields; returning input unchanged");
        return DedupeResult {
            records: records.to_vec(),
            decisions: Vec::new(),
            stats: DedupeStats::default(),
        };
    }

    let clusters = cluster_records(records, &options.identity, options.algorithm, options.threshold);

    let mut output = Vec::with_capacity(clusters.len());
    let mut decisions = Vec::new();
    let mut clusters_found = 0;

    for cluster in &clusters {
        let members: Vec<&Record> = cluster.members.iter().map(|&i| &records[i]).collect();
        if !cluster.is_duplicate() {
            output.extend(members.into_iter().cloned());
            continue;
        }
        clusters_found += 1;

        match resolve_cluster(&members, cluster, options) {
            Some((record, decision)) => {
                debug!(
                    size = cluster.len(),
                    action = ?decision.action,
                    result = %decision.result,
                    "resolved duplicate cluster"
                );
                output.push(record);
                decisions.push(decision);
            }
            None => output.extend(members.into_iter().cloned()),
        }
    }

    let stats = DedupeStats {
        clusters_found,
        records_merged: records.len() - output.len(),
    };
    info!(
        input = records.len(),
        output = output.len(),
        clusters_found = stats.clusters_found,
        records_merged = stats.records_merged,
        algorithm = options.algorithm.name(),
        strategy = options.context_strategy.name(),
        "dedupe complete"
    );

    DedupeResult {
        records: output,
        decisions,
        stats,
    }
}
