//! Records and cells.
//!
//! A [`Record`] maps field identifiers to [`Cell`]s. A cell is an ordered
//! list of observations: index 0 is the primary (displayed) value and later
//! entries are superposed alternatives. A cell with more than one
//! observation *is* a superposition; there is no separate flag.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::observation::Observation;
use crate::value::Value;

/// Opaque, stable record identifier.
///
/// Ids arriving from ingestion are kept verbatim. Ids minted by this crate
/// are `rec_<unix-millis>_<8 hex chars>`: unique enough for a single
/// process, not a cryptographic guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an existing id.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyRecordId` if `id` is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyRecordId);
        }
        Ok(Self(id))
    }

    /// Mints a fresh id.
    #[must_use]
    pub fn generate() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "rec_{}_{}",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Upstream exports sometimes carry numeric ids.
impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Ok(Self(s)),
            RawId::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Outcome tag placed on records produced by a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    Matched,
    LeftOnly,
    RightOnly,
}

impl fmt::Display for JoinStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "matched"),
            Self::LeftOnly => write!(f, "left_only"),
            Self::RightOnly => write!(f, "right_only"),
        }
    }
}

/// The observations held for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    values: Vec<Observation>,

    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Cell {
    /// Creates a cell holding a single observation.
    #[must_use]
    pub fn single(observation: Observation) -> Self {
        let updated_at = observation.timestamp();
        Self {
            values: vec![observation],
            updated_at,
        }
    }

    /// Creates a cell from an ordered list of observations.
    ///
    /// `updated_at` is the latest observation timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyCell` if `values` is empty.
    pub fn from_values(
        field: &str,
        values: Vec<Observation>,
    ) -> Result<Self, ValidationError> {
        let updated_at = values
            .iter()
            .map(Observation::timestamp)
            .max()
            .ok_or_else(|| ValidationError::EmptyCell {
                field: field.to_string(),
            })?;
        Ok(Self { values, updated_at })
    }

    /// Assembles a cell without validation. Used by the engine where the
    /// observations are already known to be non-empty or where an empty cell
    /// is dropped by the caller.
    pub(crate) fn assemble(values: Vec<Observation>, updated_at: DateTime<Utc>) -> Self {
        Self { values, updated_at }
    }

    #[must_use]
    pub fn values(&self) -> &[Observation] {
        &self.values
    }

    /// The primary (index 0) observation.
    #[must_use]
    pub fn primary(&self) -> Option<&Observation> {
        self.values.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True if the cell holds more than one observation.
    #[must_use]
    pub fn is_superposition(&self) -> bool {
        self.values.len() > 1
    }

    /// Number of superposed alternatives beyond the primary.
    #[must_use]
    pub fn superposed_count(&self) -> usize {
        self.values.len().saturating_sub(1)
    }
}

/// A record: an identity plus a set of multi-valued fields.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::{ContextSchema, Observation, Record, SourceRef};
///
/// let name = Observation::builder()
///     .value("Acme Corp")
///     .context(ContextSchema::new().with_source(SourceRef::system("salesforce")))
///     .build()
///     .unwrap();
///
/// let record = Record::builder("acct-1").observe("name", name).build().unwrap();
///
/// assert_eq!(record.primary_value("name").and_then(|v| v.as_string()), Some("Acme Corp"));
/// assert_eq!(record.superposition_count(), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "id")]
    pub record_id: RecordId,

    #[serde(default)]
    pub cells: BTreeMap<String, Cell>,

    /// Flat, context-free field values (legacy/plain attributes).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,

    #[serde(default)]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<RecordId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joined_from: Vec<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_status: Option<JoinStatus>,
}

impl Record {
    /// Creates an empty record (no cells) with the given id, stamped now.
    #[must_use]
    pub fn empty(record_id: RecordId) -> Self {
        let now = Utc::now();
        Self {
            record_id,
            cells: BTreeMap::new(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            merged_from: Vec::new(),
            joined_from: Vec::new(),
            join_status: None,
        }
    }

    pub fn builder(record_id: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(record_id)
    }

    #[must_use]
    pub fn cell(&self, field: &str) -> Option<&Cell> {
        self.cells.get(field)
    }

    /// The primary value of a field's cell, if the cell exists and is non-empty.
    #[must_use]
    pub fn primary_value(&self, field: &str) -> Option<&Value> {
        self.cells
            .get(field)
            .and_then(Cell::primary)
            .map(Observation::value)
    }

    /// Primary cell value, falling back to a flat attribute.
    #[must_use]
    pub fn field_value(&self, field: &str) -> Option<&Value> {
        self.primary_value(field)
            .filter(|v| !v.is_blank())
            .or_else(|| self.attributes.get(field))
    }

    /// Total superposed alternatives across all cells.
    #[must_use]
    pub fn superposition_count(&self) -> usize {
        self.cells.values().map(Cell::superposed_count).sum()
    }

    /// Total observations across all cells.
    #[must_use]
    pub fn observation_count(&self) -> usize {
        self.cells.values().map(Cell::len).sum()
    }

    /// Ids of the records this one stands for: its merge lineage, or itself.
    #[must_use]
    pub fn lineage(&self) -> Vec<RecordId> {
        if self.merged_from.is_empty() {
            vec![self.record_id.clone()]
        } else {
            self.merged_from.clone()
        }
    }

    /// Returns a copy tagged with a join outcome.
    #[must_use]
    pub fn tagged(&self, status: JoinStatus) -> Self {
        let mut copy = self.clone();
        copy.join_status = Some(status);
        copy
    }
}

/// Builder for creating Record instances.
#[derive(Debug)]
pub struct RecordBuilder {
    record_id: String,
    cells: BTreeMap<String, Vec<Observation>>,
    attributes: BTreeMap<String, Value>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl RecordBuilder {
    #[must_use]
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            cells: BTreeMap::new(),
            attributes: BTreeMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Appends an observation to a field (the first becomes primary).
    #[must_use]
    pub fn observe(mut self, field: impl Into<String>, observation: Observation) -> Self {
        self.cells.entry(field.into()).or_default().push(observation);
        self
    }

    /// Sets a flat attribute.
    #[must_use]
    pub fn attribute(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    #[must_use]
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Builds the record.
    ///
    /// When timestamps are not set, `updated_at` defaults to the latest cell
    /// update (or now for a record without cells) and `created_at` to
    /// `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyRecordId` for a blank id.
    pub fn build(self) -> Result<Record, ValidationError> {
        let record_id = RecordId::new(self.record_id)?;
        let mut cells = BTreeMap::new();
        for (field, values) in self.cells {
            let cell = Cell::from_values(&field, values)?;
            cells.insert(field, cell);
        }
        let updated_at = self.updated_at.unwrap_or_else(|| {
            cells
                .values()
                .map(|c: &Cell| c.updated_at)
                .max()
                .unwrap_or_else(Utc::now)
        });
        Ok(Record {
            record_id,
            cells,
            attributes: self.attributes,
            created_at: self.created_at.unwrap_or(updated_at),
            updated_at,
            merged_from: Vec::new(),
            joined_from: Vec::new(),
            join_status: None,
        })
    }
}
