//! Observations: one value for one field, under one context.
//!
//! An observation is an immutable value object. Its fields are private and
//! exposed only through accessors, so an observation held by two cells can
//! never be changed through either of them. Reconciliation copies
//! observations; it never edits one in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::ContextSchema;
use crate::error::ValidationError;
use crate::value::Value;

/// A single observed value with its epistemic context.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::{ContextSchema, Observation, SourceRef};
///
/// let obs = Observation::builder()
///     .value("Acme Corp")
///     .context(ContextSchema::new().with_source(SourceRef::system("salesforce")))
///     .build()
///     .unwrap();
///
/// assert_eq!(obs.value().as_string(), Some("Acme Corp"));
/// assert_eq!(obs.context().source_system(), Some("salesforce"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    value: Value,

    #[serde(default, alias = "context")]
    context_schema: ContextSchema,

    #[serde(default)]
    timestamp: DateTime<Utc>,
}

impl Observation {
    /// Creates an observation directly from its parts.
    #[must_use]
    pub fn new(value: impl Into<Value>, context: ContextSchema, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            context_schema: context,
            timestamp,
        }
    }

    pub fn builder() -> ObservationBuilder {
        ObservationBuilder::new()
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub const fn context(&self) -> &ContextSchema {
        &self.context_schema
    }

    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// True if `other` was observed strictly later than `self`.
    #[must_use]
    pub fn is_older_than(&self, other: &Self) -> bool {
        other.timestamp > self.timestamp
    }

    /// Returns a copy of this observation carrying a different context.
    #[must_use]
    pub fn with_context(&self, context: ContextSchema) -> Self {
        Self {
            value: self.value.clone(),
            context_schema: context,
            timestamp: self.timestamp,
        }
    }
}

/// Builder for creating Observation instances.
#[derive(Debug, Default)]
pub struct ObservationBuilder {
    value: Option<Value>,
    context: Option<ContextSchema>,
    timestamp: Option<DateTime<Utc>>,
}

impl ObservationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn context(mut self, context: ContextSchema) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the observation time (defaults to now).
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Builds the observation.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingField` if no value was set.
    pub fn build(self) -> Result<Observation, ValidationError> {
        let value = self.value.ok_or_else(|| ValidationError::MissingField {
            field: "value".to_string(),
        })?;
        Ok(Observation {
            value,
            context_schema: self.context.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}
