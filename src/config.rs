//! Reconciliation settings loaded from host-provided text.
//!
//! ```toml
//! [equivalence]
//! source = "strict"
//!
//! [merge]
//! conflict_strategy = { type = "prefer-method", method = "measured" }
//! source_preference = ["salesforce", "hubspot"]
//!
//! [dedupe]
//! identity = ["name", "domain"]
//! algorithm = "fuzzy"
//! threshold = 0.8
//!
//! [join]
//! join_type = "left"
//! value_strategy = "merge"
//! match_context = { timeframe = "overlapping" }
//! ```
//!
//! Every table and key is optional. The top-level `[equivalence]` policy is
//! the single policy for the whole config: it replaces whatever policy the
//! individual sections carry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dedupe::DedupeOptions;
use crate::error::ConfigError;
use crate::join::JoinOptions;
use crate::merge::{BulkMergeOptions, MergeOptions};
use crate::query::EquivalencePolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub equivalence: EquivalencePolicy,
    pub merge: BulkMergeOptions,
    pub dedupe: DedupeOptions,
    pub join: JoinOptions,
}

impl ReconcileConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Toml` for malformed input and
    /// `ConfigError::Validation` for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.finish()
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` for malformed input and
    /// `ConfigError::Validation` for out-of-range values.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.finish()
    }

    fn finish(mut self) -> Result<Self, ConfigError> {
        self.dedupe.validate()?;
        self.merge.equivalence = self.equivalence;
        self.dedupe.equivalence = self.equivalence;
        self.join.equivalence = self.equivalence;
        debug!(
            strategy = %self.merge.conflict_strategy,
            dedupe_algorithm = self.dedupe.algorithm.name(),
            join_type = self.join.join_type.name(),
            "loaded reconcile config"
        );
        Ok(self)
    }

    /// Pairwise merge options derived from the `[merge]` section.
    #[must_use]
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            conflict_strategy: self.merge.conflict_strategy.clone(),
            preserve_ids: self.merge.preserve_ids,
            equivalence: self.equivalence,
        }
    }
}
