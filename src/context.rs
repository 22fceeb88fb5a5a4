//! Context schemas: the epistemic metadata attached to every observation.
//!
//! A context answers who observed a value (source, agent), how (method),
//! when it applies (timeframe), and at what scale, about which subject, and
//! under which definition. Every dimension is optional; an absent dimension
//! means "unspecified".

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::source::{AgentRef, SourceRef};
use crate::time::{parse_timeframe, Timeframe, TimeframeSpec};

/// Epistemic context of an observation.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::{ContextSchema, SourceRef};
///
/// let ctx = ContextSchema::new()
///     .with_source(SourceRef::system("salesforce"))
///     .with_method("declared")
///     .with_scale("company");
///
/// assert_eq!(ctx.source_system(), Some("salesforce"));
/// assert!(ctx.agent.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentRef>,

    /// How the value was obtained (`measured`, `declared`, `derived`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Accepts a resolved interval, a code such as `Q4_2025`, or a range of
    /// codes. Input that cannot be parsed reads as unspecified.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timeframe"
    )]
    pub timeframe: Option<Timeframe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

impl ContextSchema {
    /// Creates a context with every dimension unspecified.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_agent(mut self, agent: AgentRef) -> Self {
        self.agent = Some(agent);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    #[must_use]
    pub fn with_scale(mut self, scale: impl Into<String>) -> Self {
        self.scale = Some(scale.into());
        self
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// The source system, if any.
    #[must_use]
    pub fn source_system(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.system.as_str())
    }

    /// True if no dimension is specified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Timeframe as it may appear in stored or hand-written documents.
#[derive(Deserialize)]
#[serde(untagged)]
enum TimeframeInput {
    Resolved(Timeframe),
    Spec(TimeframeSpec),
    Unknown(IgnoredAny),
}

fn lenient_timeframe<'de, D>(deserializer: D) -> Result<Option<Timeframe>, D::Error>
where
    D: Deserializer<'de>,
{
    let timeframe = match Option::<TimeframeInput>::deserialize(deserializer)? {
        None => None,
        Some(TimeframeInput::Resolved(timeframe)) => Some(timeframe),
        Some(TimeframeInput::Spec(spec)) => match parse_timeframe(&spec) {
            Ok(timeframe) => Some(timeframe),
            Err(err) => {
                debug!(?spec, error = %err, "unparseable timeframe; treating as unspecified");
                None
            }
        },
        Some(TimeframeInput::Unknown(_)) => {
            debug!("timeframe has an unrecognized shape; treating as unspecified");
            None
        }
    };
    Ok(timeframe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builders() {
        let ctx = ContextSchema::new()
            .with_source(SourceRef::file("crm", "a.csv"))
            .with_agent(AgentRef::human("alice"))
            .with_method("measured")
            .with_subject("acme")
            .with_definition("annual revenue, USD");
        assert_eq!(ctx.source_system(), Some("crm"));
        assert_eq!(ctx.method.as_deref(), Some("measured"));
        assert!(!ctx.is_empty());
        assert!(ContextSchema::new().is_empty());
    }

    #[test]
    fn test_context_omits_unspecified_dimensions() {
        let ctx = ContextSchema::new().with_method("declared");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({ "method": "declared" }));
    }

    #[test]
    fn test_context_deserializes_partial_document() {
        let ctx: ContextSchema = serde_json::from_str(
            r#"{ "source": { "system": "hubspot" }, "agent": { "type": "system" } }"#,
        )
        .unwrap();
        assert_eq!(ctx.source_system(), Some("hubspot"));
        assert_eq!(ctx.agent.unwrap().agent_type, "system");
        assert!(ctx.timeframe.is_none());
    }

    #[test]
    fn test_context_reads_timeframe_codes_and_ranges() {
        let coded: ContextSchema = serde_json::from_str(r#"{ "timeframe": "Q4_2025" }"#).unwrap();
        let q4 = parse_timeframe(&TimeframeSpec::code("Q4_2025")).unwrap();
        assert_eq!(coded.timeframe, Some(q4));

        let ranged: ContextSchema =
            serde_json::from_str(r#"{ "timeframe": { "start": "2025-10-01" } }"#).unwrap();
        let timeframe = ranged.timeframe.unwrap();
        assert!(timeframe.start.is_some());
        assert!(timeframe.end.is_none());

        let resolved = ContextSchema::new().with_timeframe(timeframe.clone());
        let json = serde_json::to_string(&resolved).unwrap();
        let back: ContextSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeframe, Some(timeframe));
    }

    #[test]
    fn test_context_unparseable_timeframe_is_unspecified() {
        for raw in [
            r#"{ "method": "declared", "timeframe": "Q9_2025" }"#,
            r#"{ "method": "declared", "timeframe": { "start": "2025-12-01", "end": "2025-01-01" } }"#,
            r#"{ "method": "declared", "timeframe": 2025 }"#,
            r#"{ "method": "declared", "timeframe": null }"#,
        ] {
            let ctx: ContextSchema = serde_json::from_str(raw).unwrap();
            assert!(ctx.timeframe.is_none(), "{raw}");
            assert_eq!(ctx.method.as_deref(), Some("declared"));
        }
    }
}
