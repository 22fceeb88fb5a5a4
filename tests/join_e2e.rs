use chrono::Utc;
use kyro_reconcile::{
    context_join, normalize_records, parse_timeframe, ContextSchema, EquivalencePolicy,
    JoinOptions, JoinStatus, JoinType, MatchContext, Observation, Record, RecordId, SourceRef,
    TimeframeSpec, ValueStrategy,
};

fn bare(id: &str) -> Record {
    Record::builder(id).build().unwrap()
}

fn metric(id: &str, field: &str, value: i64, system: &str, period: &str) -> Record {
    let ctx = ContextSchema::new()
        .with_source(SourceRef::system(system))
        .with_scale("company")
        .with_timeframe(parse_timeframe(&TimeframeSpec::code(period)).unwrap());
    Record::builder(id)
        .observe(field, Observation::new(value, ctx, Utc::now()))
        .build()
        .unwrap()
}

#[test]
fn one_left_record_matches_every_right_record() {
    let left = vec![bare("1")];
    let right = vec![bare("2"), bare("3")];
    let options = JoinOptions::new(JoinType::Inner)
        .match_context(MatchContext::new().predicate(|_, _| true));

    let result = context_join(&left, &right, &options);
    assert_eq!(result.records.len(), 2);
    assert!(result
        .records
        .iter()
        .all(|r| r.join_status == Some(JoinStatus::Matched)));
    assert_eq!(result.records[0].joined_from, vec![RecordId::from("1"), RecordId::from("2")]);
    assert_eq!(result.records[1].joined_from, vec![RecordId::from("1"), RecordId::from("3")]);
    assert_ne!(result.records[0].record_id, result.records[1].record_id);
}

#[test]
fn inner_join_row_count_equals_matching_pairs() {
    let left = vec![
        metric("rev-q1", "revenue", 10, "erp", "Q1_2025"),
        metric("rev-q2", "revenue", 12, "erp", "Q2_2025"),
        metric("rev-q3", "revenue", 15, "crm", "Q3_2025"),
    ];
    let right = vec![
        metric("hc-jan", "headcount", 50, "hr", "2025-01"),
        metric("hc-feb", "headcount", 52, "hr", "2025-02"),
        metric("hc-may", "headcount", 55, "hr", "2025-05"),
        metric("hc-2024", "headcount", 40, "hr", "2024"),
    ];
    let match_context = MatchContext::new().overlapping_timeframe().same_scale();

    let expected = 3; // Q1 with Jan and Feb, Q2 with May.
    let result = context_join(&left, &right, &JoinOptions::new(JoinType::Inner).match_context(match_context.clone()));
    assert_eq!(result.records.len(), expected);
    assert_eq!(result.stats.matched_pairs, expected);

    let left_join = context_join(&left, &right, &JoinOptions::new(JoinType::Left).match_context(match_context));
    for record in &left {
        let appears = left_join.records.iter().any(|r| {
            r.record_id == record.record_id || r.joined_from.first() == Some(&record.record_id)
        });
        assert!(appears, "{} missing from left join", record.record_id);
    }
    assert_eq!(left_join.stats.left_only, 1);
    assert_eq!(left_join.records.last().unwrap().join_status, Some(JoinStatus::LeftOnly));
}

#[test]
fn full_join_with_same_source() {
    let left = vec![
        metric("a", "revenue", 10, "erp", "2025"),
        metric("b", "revenue", 11, "crm", "2025"),
    ];
    let right = vec![
        metric("c", "cost", 4, "ERP", "2025"),
        metric("d", "cost", 5, "web", "2025"),
    ];
    let options = JoinOptions::new(JoinType::Full)
        .match_context(MatchContext::new().same_source())
        .value_strategy(ValueStrategy::Merge);
    let result = context_join(&left, &right, &options);

    let statuses: Vec<(Option<JoinStatus>, Vec<String>)> = result
        .records
        .iter()
        .map(|r| {
            let ids = if r.joined_from.is_empty() {
                vec![r.record_id.to_string()]
            } else {
                r.joined_from.iter().map(ToString::to_string).collect()
            };
            (r.join_status, ids)
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            (Some(JoinStatus::Matched), vec!["a".to_string(), "c".to_string()]),
            (Some(JoinStatus::LeftOnly), vec!["b".to_string()]),
            (Some(JoinStatus::RightOnly), vec!["d".to_string()]),
        ]
    );

    let joined = &result.records[0];
    assert!(joined.cell("revenue").is_some());
    assert!(joined.cell("cost").is_some());
}

#[test]
fn strict_policy_rejects_missing_dimensions() {
    let left = vec![metric("a", "revenue", 10, "erp", "2025")];
    let right = vec![Record::builder("b")
        .observe("cost", Observation::new(3, ContextSchema::new(), Utc::now()))
        .build()
        .unwrap()];
    let match_context = MatchContext::new().overlapping_timeframe();

    let permissive = context_join(&left, &right, &JoinOptions::default().match_context(match_context.clone()));
    assert_eq!(permissive.stats.matched_pairs, 1);

    let strict = JoinOptions {
        equivalence: EquivalencePolicy::strict(),
        ..JoinOptions::new(JoinType::Right).match_context(match_context)
    };
    let result = context_join(&left, &right, &strict);
    assert_eq!(result.stats.matched_pairs, 0);
    assert_eq!(result.stats.right_only, 1);
}

#[test]
fn join_accepts_normalized_json_and_serializes_output() {
    let left = normalize_records(serde_json::json!([{ "id": 1 }]));
    let right = normalize_records(serde_json::json!({ "x": { "id": 2 }, "y": { "id": 3 } }));
    let result = context_join(&left, &right, &JoinOptions::new(JoinType::Full));
    assert_eq!(result.records.len(), 2);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["records"][0]["join_status"], "matched");
    assert_eq!(json["records"][1]["joined_from"], serde_json::json!(["1", "3"]));
    assert_eq!(json["stats"]["matched_pairs"], 2);
}
