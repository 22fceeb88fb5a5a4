//! Merge engine.
//!
//! Pairwise ([`smart_merge`]) and N-way ([`bulk_merge`]) reconciliation of
//! records with a pluggable [`ConflictStrategy`].

mod bulk;
mod smart;
mod strategy;

pub use bulk::{bulk_merge, BulkMergeOptions, BulkMergeResult, MergeAction, MergeDecision};
pub use smart::{smart_merge, MergeOptions};
pub use strategy::{resolve_cell_conflict, ConflictStrategy};
