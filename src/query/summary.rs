use crate::context::ContextSchema;
use crate::observation::Observation;
use crate::record::{Cell, Record};
use crate::time::Timeframe;

/// Most frequent item by key; ties go to the first key seen.
fn dominant<T: Clone>(items: impl Iterator<Item = (String, T)>) -> Option<T> {
    let mut tally: Vec<(String, usize, T)> = Vec::new();
    for (key, item) in items {
        match tally.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.1 += 1,
            None => tally.push((key, 1, item)),
        }
    }

    let mut best: Option<&(String, usize, T)> = None;
    for entry in &tally {
        if best.map_or(true, |b| entry.1 > b.1) {
            best = Some(entry);
        }
    }
    best.map(|(_, _, item)| item.clone())
}

fn primaries(record: &Record) -> impl Iterator<Item = &Observation> {
    record.cells.values().filter_map(Cell::primary)
}

/// The record's dominant source system: the system named most often by
/// the primary observations of its cells.
#[must_use]
pub fn get_primary_source(record: &Record) -> Option<String> {
    dominant(primaries(record).filter_map(|obs| {
        obs.context()
            .source_system()
            .map(|s| (s.to_ascii_lowercase(), s.to_string()))
    }))
}

/// Aggregate context of a record.
///
/// Each string dimension takes its most common value among the primary
/// observations; the timeframe is the hull of every specified primary
/// timeframe.
#[must_use]
pub fn get_record_context(record: &Record) -> ContextSchema {
    let source = dominant(primaries(record).filter_map(|obs| {
        obs.context()
            .source
            .as_ref()
            .map(|s| (s.system.to_ascii_lowercase(), s.clone()))
    }));
    let agent = dominant(primaries(record).filter_map(|obs| {
        obs.context()
            .agent
            .as_ref()
            .map(|a| (a.to_string().to_ascii_lowercase(), a.clone()))
    }));
    let text_dimension = |pick: fn(&ContextSchema) -> Option<&String>| {
        dominant(
            primaries(record)
                .filter_map(|obs| pick(obs.context()).map(|v| (v.to_ascii_lowercase(), v.clone()))),
        )
    };
    let method = text_dimension(|c| c.method.as_ref());
    let scale = text_dimension(|c| c.scale.as_ref());
    let subject = text_dimension(|c| c.subject.as_ref());
    let definition = text_dimension(|c| c.definition.as_ref());

    let timeframe = primaries(record)
        .filter_map(|obs| obs.context().timeframe.as_ref())
        .filter(|tf| !tf.is_unspecified())
        .fold(None::<Timeframe>, |acc, tf| match acc {
            Some(acc) => Some(acc.hull(tf)),
            None => Some(tf.clone()),
        });

    ContextSchema {
        source,
        agent,
        method,
        timeframe,
        scale,
        subject,
        definition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceRef;
    use crate::time::{parse_timeframe, TimeframeSpec};
    use chrono::Utc;

    fn obs(system: &str) -> Observation {
        Observation::new("v", ContextSchema::new().with_source(SourceRef::system(system)), Utc::now())
    }

    #[test]
    fn test_primary_source_majority() {
        let record = Record::builder("r")
            .observe("a", obs("hubspot"))
            .observe("b", obs("crm"))
            .observe("c", obs("HubSpot"))
            .build()
            .unwrap();
        assert_eq!(get_primary_source(&record).as_deref(), Some("hubspot"));
    }

    #[test]
    fn test_primary_source_ignores_alternatives() {
        let record = Record::builder("r")
            .observe("a", obs("crm"))
            .observe("a", obs("erp"))
            .observe("a", obs("erp"))
            .build()
            .unwrap();
        assert_eq!(get_primary_source(&record).as_deref(), Some("crm"));
    }

    #[test]
    fn test_primary_source_tie_is_first_field() {
        let record = Record::builder("r")
            .observe("a", obs("crm"))
            .observe("b", obs("erp"))
            .build()
            .unwrap();
        assert_eq!(get_primary_source(&record).as_deref(), Some("crm"));
        assert!(get_primary_source(&Record::builder("e").build().unwrap()).is_none());
    }

    #[test]
    fn test_record_context_aggregates() {
        let q1 = parse_timeframe(&TimeframeSpec::code("Q1_2025")).unwrap();
        let q2 = parse_timeframe(&TimeframeSpec::code("Q2_2025")).unwrap();
        let record = Record::builder("r")
            .observe(
                "a",
                Observation::new(
                    1,
                    ContextSchema::new().with_method("measured").with_timeframe(q1.clone()),
                    Utc::now(),
                ),
            )
            .observe(
                "b",
                Observation::new(
                    2,
                    ContextSchema::new()
                        .with_method("measured")
                        .with_scale("region")
                        .with_timeframe(q2.clone()),
                    Utc::now(),
                ),
            )
            .build()
            .unwrap();

        let ctx = get_record_context(&record);
        assert_eq!(ctx.method.as_deref(), Some("measured"));
        assert_eq!(ctx.scale.as_deref(), Some("region"));
        let tf = ctx.timeframe.unwrap();
        assert_eq!(tf.start, q1.start);
        assert_eq!(tf.end, q2.end);
        assert!(ctx.source.is_none());
    }
}
