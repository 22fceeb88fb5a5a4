//! Slicing record sets by context.
//!
//! [`slice`] keeps whole records that contain at least one matching
//! observation. [`slice_values`] goes further and trims every cell down to
//! its matching observations, dropping records left with nothing.

use std::collections::BTreeMap;

use crate::query::{get_matching_values, record_matches_filter, ContextFilter, Stability};
use crate::record::{Cell, Record};

/// Records for which `record_matches_filter` holds, returned whole.
#[must_use]
pub fn slice(records: &[Record], filter: &ContextFilter) -> Vec<Record> {
    records
        .iter()
        .filter(|r| record_matches_filter(r, filter))
        .cloned()
        .collect()
}

/// Records with every cell replaced by only its matching observations.
///
/// Cells with no matches are removed; records with no matches in any cell
/// are omitted from the result. Stability is judged on the original cell.
#[must_use]
pub fn slice_values(records: &[Record], filter: &ContextFilter) -> Vec<Record> {
    records
        .iter()
        .filter_map(|record| {
            let cells: BTreeMap<String, Cell> = record
                .cells
                .iter()
                .filter_map(|(field, cell)| {
                    let matching: Vec<_> = get_matching_values(cell, filter)
                        .into_iter()
                        .cloned()
                        .collect();
                    if matching.is_empty() {
                        None
                    } else {
                        Some((field.clone(), Cell::assemble(matching, cell.updated_at)))
                    }
                })
                .collect();

            if cells.is_empty() {
                return None;
            }
            let mut trimmed = record.clone();
            trimmed.cells = cells;
            Some(trimmed)
        })
        .collect()
}

/// Records with an observation from the given source system.
#[must_use]
pub fn from_source(records: &[Record], system: &str) -> Vec<Record> {
    slice(records, &ContextFilter::new().source(system))
}

/// Records with an observation produced by the given agent (type or name).
#[must_use]
pub fn by_agent(records: &[Record], agent: &str) -> Vec<Record> {
    slice(records, &ContextFilter::new().agent(agent))
}

/// Records with an observation obtained by the given method.
#[must_use]
pub fn by_method(records: &[Record], method: &str) -> Vec<Record> {
    slice(records, &ContextFilter::new().method(method))
}

/// Records with a cell of the given stability.
#[must_use]
pub fn by_stability(records: &[Record], stability: Stability) -> Vec<Record> {
    slice(records, &ContextFilter::new().stability(stability))
}
