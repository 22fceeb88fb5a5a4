//! # kyro-reconcile - Context-Aware Record Reconciliation
//!
//! kyro-reconcile merges, deduplicates, and joins records whose fields hold
//! more than one fact at a time. Every value carries the context it was
//! observed in (source, agent, method, timeframe, scale, subject), and
//! disagreeing values from different contexts are kept side by side as a
//! superposition instead of being overwritten.
//!
//! ## Core Concepts
//!
//! - **Observation**: An immutable value plus its context and timestamp
//! - **Cell**: The ordered observations held for one field; index 0 is primary
//! - **Superposition**: A cell with more than one observation
//! - **Equivalence**: When two contexts describe the same fact (see [`EquivalencePolicy`])
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use kyro_reconcile::{
//!     smart_dedupe, ContextSchema, DedupeOptions, Observation, Record, SourceRef,
//! };
//!
//! let t = Utc::now();
//! let from = |system: &str| ContextSchema::new().with_source(SourceRef::system(system));
//!
//! let records = vec![
//!     Record::builder("sf-1")
//!         .observe("name", Observation::new("Acme Corp", from("salesforce"), t))
//!         .build()?,
//!     Record::builder("hs-7")
//!         .observe("name", Observation::new("Acme Corp", from("hubspot"), t + Duration::hours(1)))
//!         .build()?,
//! ];
//!
//! let result = smart_dedupe(&records, &DedupeOptions::for_identity(["name"])?);
//! assert_eq!(result.records.len(), 1);
//! assert_eq!(result.records[0].merged_from.len(), 2);
//! # Ok::<(), kyro_reconcile::ValidationError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod context;
pub mod error;
pub mod observation;
pub mod record;
pub mod source;
pub mod time;
pub mod value;

// Queries and engines
pub mod collection;
pub mod config;
pub mod dedupe;
pub mod join;
pub mod merge;
pub mod query;
pub mod slice;

// Re-export primary types at crate root for convenience
pub use collection::{normalize_records, IntoRecords};
pub use config::ReconcileConfig;
pub use context::ContextSchema;
pub use error::{ConfigError, ValidationError};
pub use observation::{Observation, ObservationBuilder};
pub use record::{Cell, JoinStatus, Record, RecordBuilder, RecordId};
pub use source::{AgentRef, SourceRef};
pub use time::{
    parse_timeframe, parse_timeframe_at, timeframes_overlap, Granularity, Timeframe, TimeframeSpec,
};
pub use value::Value;

pub use dedupe::{
    cluster_records, identity_signature, signature_similarity, smart_dedupe, ContextStrategy,
    DedupeAction, DedupeAlgorithm, DedupeDecision, DedupeOptions, DedupeResult, DedupeStats,
    DuplicateCluster,
};
pub use join::{
    context_join, join_records, DimensionMatch, JoinOptions, JoinResult, JoinStats, JoinType,
    MatchContext, RecordPredicate, TimeframeMatch, ValueStrategy,
};
pub use merge::{
    bulk_merge, resolve_cell_conflict, smart_merge, BulkMergeOptions, BulkMergeResult,
    ConflictStrategy, MergeAction, MergeDecision, MergeOptions,
};
pub use query::{
    contexts_equivalent, get_best_value, get_matching_values, get_primary_source,
    get_record_context, record_matches_filter, score_value_for_context, ContextFilter,
    DimensionPolicy, EquivalencePolicy, ObservationPredicate, Stability,
};
pub use slice::{by_agent, by_method, by_stability, from_source, slice, slice_values};
