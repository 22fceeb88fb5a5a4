use chrono::{Duration, TimeZone, Utc};
use kyro_reconcile::{
    by_stability, from_source, get_best_value, get_primary_source, get_record_context,
    parse_timeframe, parse_timeframe_at, slice, slice_values, timeframes_overlap, AgentRef,
    ContextFilter, ContextSchema, Observation, Record, SourceRef, Stability, TimeframeSpec,
};

fn portfolio() -> Vec<Record> {
    let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let ctx = |system: &str, method: &str| {
        ContextSchema::new()
            .with_source(SourceRef::system(system))
            .with_method(method)
            .with_agent(AgentRef::system(format!("{system}-connector")))
    };

    vec![
        Record::builder("acme")
            .observe("name", Observation::new("Acme Corp", ctx("salesforce", "declared"), t))
            .observe("employees", Observation::new(120, ctx("salesforce", "declared"), t))
            .observe("employees", Observation::new(134, ctx("linkedin", "scraped"), t + Duration::days(3)))
            .build()
            .unwrap(),
        Record::builder("globex")
            .observe("name", Observation::new("Globex", ctx("hubspot", "declared"), t - Duration::days(30)))
            .observe("employees", Observation::new(40, ctx("hubspot", "declared"), t - Duration::days(30)))
            .build()
            .unwrap(),
        Record::builder("initech")
            .observe("name", Observation::new("Initech", ctx("linkedin", "scraped"), t + Duration::days(10)))
            .build()
            .unwrap(),
    ]
}

fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.record_id.as_str()).collect()
}

#[test]
fn slicing_by_source_keeps_or_trims() {
    let records = portfolio();

    let whole = from_source(&records, "LinkedIn");
    assert_eq!(ids(&whole), vec!["acme", "initech"]);
    assert_eq!(whole[0].cell("employees").unwrap().len(), 2);

    let trimmed = slice_values(&records, &ContextFilter::new().source("linkedin"));
    assert_eq!(ids(&trimmed), vec!["acme", "initech"]);
    assert!(trimmed[0].cell("name").is_none());
    assert_eq!(trimmed[0].primary_value("employees").unwrap().as_int(), Some(134));

    // Source data is untouched.
    assert_eq!(records[0].cell("employees").unwrap().len(), 2);
}

#[test]
fn combined_filters_must_all_hold() {
    let records = portfolio();
    let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    let filter = ContextFilter::new()
        .method("declared")
        .agent("hubspot-connector")
        .before(t);
    assert_eq!(ids(&slice(&records, &filter)), vec!["globex"]);

    let inclusive = ContextFilter::new().after(t).before(t);
    assert_eq!(ids(&slice(&records, &inclusive)), vec!["acme"]);

    let custom = ContextFilter::new().predicate(|o| o.value().as_int().is_some_and(|n| n > 100));
    assert_eq!(ids(&slice_values(&records, &custom)), vec!["acme"]);
}

#[test]
fn stability_slices() {
    let records = portfolio();
    assert_eq!(ids(&by_stability(&records, Stability::Superposed)), vec!["acme"]);
    assert_eq!(ids(&by_stability(&records, Stability::Stable)), vec!["acme", "globex", "initech"]);

    let superposed_only = slice_values(&records, &ContextFilter::new().stability(Stability::Superposed));
    assert_eq!(superposed_only.len(), 1);
    assert_eq!(superposed_only[0].cells.len(), 1);
    assert!(superposed_only[0].cell("employees").unwrap().is_superposition());
}

#[test]
fn record_summaries_and_best_values() {
    let records = portfolio();
    let acme = &records[0];

    assert_eq!(get_primary_source(acme).as_deref(), Some("salesforce"));
    let context = get_record_context(acme);
    assert_eq!(context.method.as_deref(), Some("declared"));

    let employees = acme.cell("employees").unwrap();
    let scraped_view = ContextSchema::new().with_method("scraped");
    assert_eq!(get_best_value(employees, &scraped_view).unwrap().value().as_int(), Some(134));
    assert_eq!(
        get_best_value(employees, &ContextSchema::new()).unwrap().value().as_int(),
        Some(120)
    );
}

#[test]
fn timeframe_codes_and_ranges() {
    let q4 = parse_timeframe(&TimeframeSpec::code("Q4_2025")).unwrap();
    let nov = parse_timeframe(&TimeframeSpec::code("2025-11")).unwrap();
    let y24 = parse_timeframe(&TimeframeSpec::code("2024")).unwrap();
    assert!(timeframes_overlap(Some(&q4), Some(&nov)));
    assert!(!timeframes_overlap(Some(&q4), Some(&y24)));
    assert!(timeframes_overlap(Some(&q4), None));

    let now = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();
    let recent = parse_timeframe_at(&TimeframeSpec::code("last_7_days"), now).unwrap();
    assert!(recent.contains(now - Duration::days(3)));
    assert!(!recent.contains(now - Duration::days(8)));

    assert!(parse_timeframe(&TimeframeSpec::code("Q5_2025")).is_err());
    assert!(parse_timeframe(&TimeframeSpec::range(Some("2025-12-01"), Some("2025-01-01"))).is_err());

    let open = parse_timeframe(&TimeframeSpec::range(Some("2025-10-15"), None)).unwrap();
    assert!(open.overlaps(&q4));
    assert!(!open.overlaps(&y24));
}
