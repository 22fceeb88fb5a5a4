use std::fmt;

use serde::{Deserialize, Serialize};

use crate::observation::Observation;
use crate::query::{contexts_equivalent, EquivalencePolicy};
use crate::record::Cell;

/// How two cells for the same field are reconciled.
///
/// Strategies are pure: the same pair of cells always yields the same
/// result, and inputs are never modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Pair up observations with equivalent contexts and keep the later of
    /// each pair; everything unpaired is preserved as a superposition.
    ContextAware,

    /// Keep only the single latest observation.
    LatestWins,

    /// Keep the latest observation obtained by `method`, falling back to
    /// [`ConflictStrategy::LatestWins`] when no observation used it.
    PreferMethod {
        /// Method to prefer (exact match).
        method: String,
    },

    /// Concatenate both cells unconditionally.
    KeepAll,
}

impl Default for ConflictStrategy {
    fn default() -> Self {
        Self::ContextAware
    }
}

impl ConflictStrategy {
    /// Creates a `PreferMethod` strategy.
    #[must_use]
    pub fn prefer_method(method: impl Into<String>) -> Self {
        Self::PreferMethod {
            method: method.into(),
        }
    }

    /// Returns a short stable identifier suitable for logging/debugging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ContextAware => "context-aware",
            Self::LatestWins => "latest-wins",
            Self::PreferMethod { .. } => "prefer-method",
            Self::KeepAll => "keep-all",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreferMethod { method } => write!(f, "prefer-method({method})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Latest observation; ties keep the earliest in iteration order.
fn latest<'a>(observations: impl Iterator<Item = &'a Observation>) -> Option<&'a Observation> {
    let mut best: Option<&Observation> = None;
    for obs in observations {
        if best.map_or(true, |b| b.is_older_than(obs)) {
            best = Some(obs);
        }
    }
    best
}

/// Reconciles two cells for the same field.
///
/// For [`ConflictStrategy::ContextAware`] the result preserves every fact:
/// `max(|a|, |b|) <= |result| <= |a| + |b|`, and the result holds exactly
/// one more observation than `a` for every `b` observation left unpaired.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use kyro_reconcile::{
///     resolve_cell_conflict, Cell, ConflictStrategy, ContextSchema, EquivalencePolicy,
///     Observation,
/// };
///
/// let t = Utc::now();
/// let a = Cell::single(Observation::new(100, ContextSchema::new().with_method("declared"), t));
/// let b = Cell::single(Observation::new(120, ContextSchema::new().with_method("measured"), t));
///
/// let merged = resolve_cell_conflict(&a, &b, &ConflictStrategy::ContextAware, &EquivalencePolicy::default());
/// assert_eq!(merged.len(), 2);
///
/// let latest = resolve_cell_conflict(&a, &b, &ConflictStrategy::LatestWins, &EquivalencePolicy::default());
/// assert_eq!(latest.len(), 1);
/// ```
#[must_use]
pub fn resolve_cell_conflict(
    a: &Cell,
    b: &Cell,
    strategy: &ConflictStrategy,
    policy: &EquivalencePolicy,
) -> Cell {
    let updated_at = a.updated_at.max(b.updated_at);
    let both = || a.values().iter().chain(b.values());

    let values = match strategy {
        ConflictStrategy::ContextAware => align_by_context(a.values(), b.values(), policy),
        ConflictStrategy::LatestWins => latest(both()).cloned().into_iter().collect(),
        ConflictStrategy::PreferMethod { method } => {
            let preferred = latest(
                both().filter(|o| o.context().method.as_deref() == Some(method.as_str())),
            );
            preferred
                .or_else(|| latest(both()))
                .cloned()
                .into_iter()
                .collect()
        }
        ConflictStrategy::KeepAll => both().cloned().collect(),
    };

    Cell::assemble(values, updated_at)
}

/// Walks `a` in order, pairing each observation with the first unclaimed
/// equivalent one in `b`. Unclaimed `b` observations are appended in order.
fn align_by_context(
    a: &[Observation],
    b: &[Observation],
    policy: &EquivalencePolicy,
) -> Vec<Observation> {
    let mut claimed = vec![false; b.len()];
    let mut out = Vec::with_capacity(a.len() + b.len());

    for oa in a {
        let partner = b
            .iter()
            .enumerate()
            .find(|(i, ob)| !claimed[*i] && contexts_equivalent(oa.context(), ob.context(), policy));

        match partner {
            Some((i, ob)) => {
                claimed[i] = true;
                // Ties favor `a`.
                out.push(if oa.is_older_than(ob) { ob.clone() } else { oa.clone() });
            }
            None => out.push(oa.clone()),
        }
    }

    out.extend(
        b.iter()
            .zip(&claimed)
            .filter(|(_, taken)| !**taken)
            .map(|(ob, _)| ob.clone()),
    );
    out
}
