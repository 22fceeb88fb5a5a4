use crate::context::ContextSchema;
use crate::observation::Observation;
use crate::record::Cell;

const SOURCE_WEIGHT: u32 = 3;
const METHOD_WEIGHT: u32 = 2;
const AGENT_WEIGHT: u32 = 2;
const SCALE_WEIGHT: u32 = 1;
const SUBJECT_WEIGHT: u32 = 1;
const TIMEFRAME_WEIGHT: u32 = 1;

fn same(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.eq_ignore_ascii_case(b))
}

/// Scores how closely an observation's context fits a viewing context.
///
/// Only dimensions specified on both sides and matching contribute; there
/// is no penalty for mismatches. A timeframe counts when both are specified
/// and overlap.
#[must_use]
pub fn score_value_for_context(observation: &Observation, view: &ContextSchema) -> u32 {
    let ctx = observation.context();
    let mut score = 0;

    if same(ctx.source_system(), view.source_system()) {
        score += SOURCE_WEIGHT;
    }
    if same(ctx.method.as_deref(), view.method.as_deref()) {
        score += METHOD_WEIGHT;
    }
    if let (Some(a), Some(b)) = (&ctx.agent, &view.agent) {
        if a.agent_type.eq_ignore_ascii_case(&b.agent_type)
            && (b.name.is_none() || same(a.name.as_deref(), b.name.as_deref()))
        {
            score += AGENT_WEIGHT;
        }
    }
    if same(ctx.scale.as_deref(), view.scale.as_deref()) {
        score += SCALE_WEIGHT;
    }
    if same(ctx.subject.as_deref(), view.subject.as_deref()) {
        score += SUBJECT_WEIGHT;
    }
    if let (Some(a), Some(b)) = (&ctx.timeframe, &view.timeframe) {
        if !a.is_unspecified() && !b.is_unspecified() && a.overlaps(b) {
            score += TIMEFRAME_WEIGHT;
        }
    }

    score
}

/// The observation of `cell` best suited to `view`; ties keep the earlier
/// observation, so an unspecific view yields the primary value.
#[must_use]
pub fn get_best_value<'a>(cell: &'a Cell, view: &ContextSchema) -> Option<&'a Observation> {
    let mut best: Option<(&Observation, u32)> = None;
    for obs in cell.values() {
        let score = score_value_for_context(obs, view);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((obs, score));
        }
    }
    best.map(|(obs, _)| obs)
}
