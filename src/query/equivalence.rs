use serde::{Deserialize, Serialize};

use crate::context::ContextSchema;
use crate::time::Timeframe;

/// How a dimension specified on only one side is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionPolicy {
    /// One-sided dimensions act as wildcards.
    Permissive,

    /// A dimension present on one side and absent on the other blocks equivalence.
    Strict,
}

impl Default for DimensionPolicy {
    fn default() -> Self {
        Self::Permissive
    }
}

/// Per-dimension policy for [`contexts_equivalent`].
///
/// The default is fully permissive: an unspecified dimension is compatible
/// with anything. This can let unrelated facts merge when contexts are
/// sparse; use [`EquivalencePolicy::strict`] (or tighten single dimensions)
/// to keep them apart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquivalencePolicy {
    pub method: DimensionPolicy,
    pub source: DimensionPolicy,
    pub scale: DimensionPolicy,
    pub subject: DimensionPolicy,
    pub timeframe: DimensionPolicy,
}

impl EquivalencePolicy {
    /// Every dimension permissive.
    #[must_use]
    pub const fn permissive() -> Self {
        Self {
            method: DimensionPolicy::Permissive,
            source: DimensionPolicy::Permissive,
            scale: DimensionPolicy::Permissive,
            subject: DimensionPolicy::Permissive,
            timeframe: DimensionPolicy::Permissive,
        }
    }

    /// Every dimension strict.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            method: DimensionPolicy::Strict,
            source: DimensionPolicy::Strict,
            scale: DimensionPolicy::Strict,
            subject: DimensionPolicy::Strict,
            timeframe: DimensionPolicy::Strict,
        }
    }
}

/// Decides whether two contexts describe the same fact.
///
/// For each of method, source system, scale, and subject: values present on
/// both sides must match case-insensitively; a value present on one side
/// only is accepted or rejected per `policy`. Timeframes must overlap
/// (inclusive); an unspecified timeframe on one side is likewise governed
/// by `policy.timeframe`.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::{contexts_equivalent, ContextSchema, EquivalencePolicy, SourceRef};
///
/// let a = ContextSchema::new().with_source(SourceRef::system("CRM")).with_method("declared");
/// let b = ContextSchema::new().with_source(SourceRef::system("crm"));
///
/// assert!(contexts_equivalent(&a, &b, &EquivalencePolicy::permissive()));
/// assert!(!contexts_equivalent(&a, &b, &EquivalencePolicy::strict()));
/// ```
#[must_use]
pub fn contexts_equivalent(
    a: &ContextSchema,
    b: &ContextSchema,
    policy: &EquivalencePolicy,
) -> bool {
    dimension_compatible(a.method.as_deref(), b.method.as_deref(), policy.method)
        && dimension_compatible(a.source_system(), b.source_system(), policy.source)
        && dimension_compatible(a.scale.as_deref(), b.scale.as_deref(), policy.scale)
        && dimension_compatible(a.subject.as_deref(), b.subject.as_deref(), policy.subject)
        && timeframe_compatible(a.timeframe.as_ref(), b.timeframe.as_ref(), policy.timeframe)
}

pub(crate) fn dimension_compatible(
    a: Option<&str>,
    b: Option<&str>,
    policy: DimensionPolicy,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (None, None) => true,
        _ => policy == DimensionPolicy::Permissive,
    }
}

pub(crate) fn timeframe_compatible(
    a: Option<&Timeframe>,
    b: Option<&Timeframe>,
    policy: DimensionPolicy,
) -> bool {
    let a = a.filter(|tf| !tf.is_unspecified());
    let b = b.filter(|tf| !tf.is_unspecified());
    match (a, b) {
        (Some(a), Some(b)) => a.overlaps(b),
        (None, None) => true,
        _ => policy == DimensionPolicy::Permissive,
    }
}
