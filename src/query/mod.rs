//! Context queries.
//!
//! Pure functions over contexts, cells, and records: equivalence, filter
//! matching, record-level summaries, and value scoring. Nothing here
//! mutates its inputs.

mod equivalence;
mod filter;
mod scoring;
mod summary;

pub use equivalence::{contexts_equivalent, DimensionPolicy, EquivalencePolicy};
pub use filter::{
    get_matching_values, record_matches_filter, ContextFilter, ObservationPredicate, Stability,
};
pub use scoring::{get_best_value, score_value_for_context};
pub use summary::{get_primary_source, get_record_context};

pub(crate) use equivalence::{dimension_compatible, timeframe_compatible};
