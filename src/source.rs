//! Source and agent provenance types.
//!
//! Every observation may say where it came from (a source system, optionally
//! a specific file) and who produced it (an agent). Both are the
//! "who observed it" half of a [`ContextSchema`](crate::ContextSchema).

use std::fmt;

use serde::{Deserialize, Serialize};

/// The system (and optionally file) an observation was ingested from.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::SourceRef;
///
/// let crm = SourceRef::system("salesforce");
/// let export = SourceRef::file("hubspot", "contacts-2025-11.csv");
///
/// assert!(crm.same_system(&SourceRef::system("SalesForce")));
/// assert_eq!(export.to_string(), "hubspot:contacts-2025-11.csv");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub system: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl SourceRef {
    /// Creates a source naming only the system.
    #[must_use]
    pub fn system(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            file: None,
        }
    }

    /// Creates a source naming a system and a file within it.
    #[must_use]
    pub fn file(system: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            file: Some(file.into()),
        }
    }

    /// Case-insensitive comparison of the source systems.
    #[must_use]
    pub fn same_system(&self, other: &Self) -> bool {
        self.system.eq_ignore_ascii_case(&other.system)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{file}", self.system),
            None => write!(f, "{}", self.system),
        }
    }
}

/// The agent that produced an observation.
///
/// `agent_type` is free-form (`"human"`, `"system"`, `"ai"`, ...) and is
/// serialized as `type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentRef {
    #[serde(rename = "type")]
    pub agent_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AgentRef {
    /// Creates an agent of the given type with no name.
    #[must_use]
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            name: None,
        }
    }

    /// Creates a named human agent.
    #[must_use]
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            agent_type: "human".to_string(),
            name: Some(name.into()),
        }
    }

    /// Creates a named automated system agent.
    #[must_use]
    pub fn system(name: impl Into<String>) -> Self {
        Self {
            agent_type: "system".to_string(),
            name: Some(name.into()),
        }
    }

    /// True if `query` names this agent's type or its name (case-insensitive).
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        self.agent_type.eq_ignore_ascii_case(query)
            || self
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(query))
    }
}

impl fmt::Display for AgentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{name}", self.agent_type),
            None => write!(f, "{}", self.agent_type),
        }
    }
}
