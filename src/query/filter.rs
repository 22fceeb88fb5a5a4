use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::observation::Observation;
use crate::record::{Cell, Record};

/// Whether the cell holding an observation is settled or superposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    /// The cell holds exactly one observation.
    Stable,

    /// The cell holds competing observations.
    Superposed,
}

impl Stability {
    #[must_use]
    pub fn of(cell: &Cell) -> Self {
        if cell.is_superposition() {
            Self::Superposed
        } else {
            Self::Stable
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Superposed => write!(f, "superposed"),
        }
    }
}

/// Caller-supplied observation test, ANDed with the declarative dimensions.
#[derive(Clone)]
pub struct ObservationPredicate(Arc<dyn Fn(&Observation) -> bool + Send + Sync>);

impl ObservationPredicate {
    pub fn new(f: impl Fn(&Observation) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn test(&self, observation: &Observation) -> bool {
        (self.0)(observation)
    }
}

impl fmt::Debug for ObservationPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObservationPredicate(..)")
    }
}

/// A conjunction of context constraints on observations.
///
/// Unset dimensions impose no constraint. String dimensions compare
/// case-insensitively; `agent` matches either the agent type or its name.
/// Timestamp bounds are inclusive.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::ContextFilter;
///
/// let filter = ContextFilter::new().source("salesforce").method("declared");
/// assert!(!filter.is_empty());
/// assert!(ContextFilter::new().is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability: Option<Stability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub predicate: Option<ObservationPredicate>,
}

impl ContextFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, system: impl Into<String>) -> Self {
        self.source = Some(system.into());
        self
    }

    #[must_use]
    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn stability(mut self, stability: Stability) -> Self {
        self.stability = Some(stability);
        self
    }

    #[must_use]
    pub fn after(mut self, at: DateTime<Utc>) -> Self {
        self.after = Some(at);
        self
    }

    #[must_use]
    pub fn before(mut self, at: DateTime<Utc>) -> Self {
        self.before = Some(at);
        self
    }

    #[must_use]
    pub fn predicate(
        mut self,
        f: impl Fn(&Observation) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(ObservationPredicate::new(f));
        self
    }

    /// True if the filter constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.agent.is_none()
            && self.method.is_none()
            && self.stability.is_none()
            && self.after.is_none()
            && self.before.is_none()
            && self.predicate.is_none()
    }

    /// Tests one observation, given the cell that holds it.
    #[must_use]
    pub fn matches(&self, cell: &Cell, observation: &Observation) -> bool {
        let ctx = observation.context();

        if let Some(source) = &self.source {
            if !ctx
                .source_system()
                .is_some_and(|s| s.eq_ignore_ascii_case(source))
            {
                return false;
            }
        }
        if let Some(agent) = &self.agent {
            if !ctx.agent.as_ref().is_some_and(|a| a.matches(agent)) {
                return false;
            }
        }
        if let Some(method) = &self.method {
            if !ctx
                .method
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case(method))
            {
                return false;
            }
        }
        if let Some(stability) = self.stability {
            if Stability::of(cell) != stability {
                return false;
            }
        }
        if self.after.is_some_and(|after| observation.timestamp() < after) {
            return false;
        }
        if self.before.is_some_and(|before| observation.timestamp() > before) {
            return false;
        }
        self.predicate
            .as_ref()
            .map_or(true, |p| p.test(observation))
    }
}

/// True if any cell of `record` holds an observation matching `filter`.
#[must_use]
pub fn record_matches_filter(record: &Record, filter: &ContextFilter) -> bool {
    record
        .cells
        .values()
        .any(|cell| cell.values().iter().any(|obs| filter.matches(cell, obs)))
}

/// The observations of `cell` matching `filter`, in cell order.
#[must_use]
pub fn get_matching_values<'a>(cell: &'a Cell, filter: &ContextFilter) -> Vec<&'a Observation> {
    cell.values()
        .iter()
        .filter(|obs| filter.matches(cell, obs))
        .collect()
}
