//! Error types for kyro-reconcile.
//!
//! Reconciliation itself never fails: malformed or missing data degrades to
//! "absent" or "not applicable". Errors only surface from constructors,
//! timeframe parsing, and configuration loading, and are strongly typed
//! using thiserror so callers can match on the specific condition.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Record id cannot be empty")]
    EmptyRecordId,

    #[error("Cell for field '{field}' must hold at least one observation")]
    EmptyCell {
        field: String,
    },

    #[error("Unparseable timeframe '{input}': {reason}")]
    InvalidTimeframe {
        input: String,
        reason: String,
    },

    #[error("Invalid timeframe: start ({start}) is after end ({end})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Similarity threshold {value} is out of range [0.0, 1.0]")]
    ThresholdOutOfRange {
        value: f64,
    },

    #[error("Dedupe identity must name at least one field")]
    EmptyIdentity,

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },
}

impl ValidationError {
    /// Creates an `InvalidTimeframe` error.
    #[must_use]
    pub fn timeframe(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimeframe {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading a [`ReconcileConfig`](crate::config::ReconcileConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Validation(#[from] ValidationError),
}

impl ConfigError {
    /// Returns true if the document parsed but a value failed validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_timeframe() {
        let err = ValidationError::timeframe("Q5_2025", "quarter must be 1-4");
        let msg = format!("{err}");
        assert!(msg.contains("Q5_2025"));
        assert!(msg.contains("quarter must be 1-4"));
    }

    #[test]
    fn test_validation_error_time_range() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::hours(1);
        let err = ValidationError::InvalidTimeRange { start: now, end: earlier };
        assert!(format!("{err}").contains("is after end"));
    }

    #[test]
    fn test_validation_error_threshold() {
        let err = ValidationError::ThresholdOutOfRange { value: 1.5 };
        let msg = format!("{err}");
        assert!(msg.contains("1.5"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_config_error_from_validation() {
        let err: ConfigError = ValidationError::EmptyIdentity.into();
        assert!(err.is_validation());
        assert!(format!("{err}").contains("at least one field"));
    }

    #[test]
    fn test_config_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(!err.is_validation());
        assert!(format!("{err}").contains("JSON"));
    }
}
