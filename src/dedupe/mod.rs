//! Duplicate detection and resolution.
//!
//! Records are grouped by an identity signature built from chosen fields,
//! clustered greedily around seeds, and each cluster of duplicates is
//! collapsed by keeping one member or merging them through the merge engine.
//!
//! Clustering is not transitive: members join a cluster by similarity to its
//! seed, never to other members.

mod cluster;
mod engine;
mod signature;

pub use cluster::{cluster_records, DuplicateCluster};
pub use engine::{
    smart_dedupe, ContextStrategy, DedupeAction, DedupeDecision, DedupeOptions, DedupeResult,
    DedupeStats,
};
pub use signature::{identity_signature, signature_similarity, DedupeAlgorithm, SIGNATURE_SEPARATOR};
