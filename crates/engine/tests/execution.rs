//! End-to-end engine tests over the in-memory storage fixture.

use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use geolens_catalog::{Catalog, EventFamily, EventFileDef, SourceDef};
use geolens_engine::{
    validate_and_expand, AggregateExecutor, EventExecutor, MemoryStorage,
};
use geolens_protocol::{
    DerivedShorthand, DerivedSpec, EventRecord, ExecutionMode, Granularity, MetricRef, RawOrder,
    RawOrderItem, TableRow, TimeSpec,
};

fn catalog() -> Catalog {
    let mut worldbank_events = BTreeMap::new();
    worldbank_events.insert(
        "events".to_string(),
        EventFileDef {
            description: "unused".into(),
            family: EventFamily::Generic,
        },
    );
    let mut usgs_events = BTreeMap::new();
    usgs_events.insert(
        "events".to_string(),
        EventFileDef {
            description: "Earthquake epicenters".into(),
            family: EventFamily::Earthquake,
        },
    );
    let mut firms_events = BTreeMap::new();
    firms_events.insert(
        "fires".to_string(),
        EventFileDef {
            description: "Fire perimeters".into(),
            family: EventFamily::Fire,
        },
    );

    Catalog::builder()
        .source(
            "worldbank",
            SourceDef {
                name: "World Bank Indicators".into(),
                metrics: vec!["gdp".into(), "population".into(), "area".into()],
                events: worldbank_events,
            },
        )
        .source(
            "usgs",
            SourceDef {
                name: "USGS Earthquake Catalog".into(),
                metrics: vec!["magnitude".into()],
                events: usgs_events,
            },
        )
        .source(
            "firms",
            SourceDef {
                name: "FIRMS Active Fire".into(),
                metrics: vec!["burned_area".into()],
                events: firms_events,
            },
        )
        .region("eu", vec!["DE".into(), "FR".into(), "IT".into()])
        .region("north america", vec!["US".into(), "CA".into()])
        .denominator("population", "worldbank", "population")
        .denominator("area", "worldbank", "area")
        .build()
        .unwrap()
}

fn worldbank_rows() -> Vec<TableRow> {
    vec![
        TableRow::new("DE", Some(2020))
            .value("gdp", 3_800_000.0)
            .value("population", 83.0),
        TableRow::new("FR", Some(2020))
            .value("gdp", 2_600_000.0)
            .value("population", 65.0),
        // Italy has GDP but no population row value.
        TableRow::new("IT", Some(2020)).value("gdp", 1_900_000.0),
        TableRow::new("US", Some(2020)).value("gdp", 21_000_000.0),
    ]
}

#[tokio::test]
async fn per_capita_skips_locations_without_denominator() {
    let catalog = catalog();
    let storage = MemoryStorage::new().table("worldbank", worldbank_rows());

    let mut item = RawOrderItem::new("worldbank", "gdp");
    item.region = Some("eu".into());
    item.derived = Some(DerivedShorthand::PerCapita);
    let order = validate_and_expand(
        &RawOrder {
            items: vec![item],
            derived: vec![],
        },
        &catalog,
    );

    let executor = AggregateExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items, &order.derived).await.unwrap();

    let computed = "GDP Per Capita (computed)";
    let de = outcome.boxes.get("DE", computed).unwrap();
    assert!((de - 3_800_000.0 / 83.0).abs() < 1e-6);
    assert!(outcome.boxes.get("FR", computed).is_some());

    // Italy gets exactly one warning and no derived key, never inf or NaN.
    assert!(outcome.boxes.get("IT", computed).is_none());
    let it_warnings: Vec<&String> = outcome
        .warnings
        .iter()
        .filter(|w| w.contains("IT"))
        .collect();
    assert_eq!(it_warnings.len(), 1);
    assert!(it_warnings[0].contains("population"));
    for code in outcome.boxes.codes() {
        for value in outcome.boxes.values(code).unwrap().values() {
            assert!(value.is_finite());
        }
    }
}

#[tokio::test]
async fn zero_denominator_takes_the_warning_path() {
    let catalog = catalog();
    let rows = vec![TableRow::new("DE", Some(2020))
        .value("gdp", 1000.0)
        .value("population", 0.0)];
    let storage = MemoryStorage::new().table("worldbank", rows);

    let mut item = RawOrderItem::new("worldbank", "gdp");
    item.location_codes = vec!["DE".into()];
    item.derived = Some(DerivedShorthand::PerCapita);
    let order = validate_and_expand(
        &RawOrder {
            items: vec![item],
            derived: vec![],
        },
        &catalog,
    );

    let executor = AggregateExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items, &order.derived).await.unwrap();

    assert!(outcome.boxes.get("DE", "GDP Per Capita (computed)").is_none());
    assert_eq!(
        outcome.warnings,
        vec!["DE: population unavailable".to_string()]
    );
}

#[tokio::test]
async fn union_domain_keeps_untargeted_boxes_sparse() {
    let catalog = catalog();
    let storage = MemoryStorage::new().table("worldbank", worldbank_rows());

    let mut eu = RawOrderItem::new("worldbank", "gdp");
    eu.region = Some("eu".into());
    let mut na = RawOrderItem::new("worldbank", "population");
    na.region = Some("north america".into());

    let order = validate_and_expand(
        &RawOrder {
            items: vec![eu, na],
            derived: vec![],
        },
        &catalog,
    );
    let executor = AggregateExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items, &order.derived).await.unwrap();

    // Domain is the union of both items' expansions.
    assert_eq!(outcome.boxes.len(), 5);
    // The EU item fills gdp only into EU boxes; US has a gdp row in the
    // table but was not targeted by that item.
    assert!(outcome.boxes.get("DE", "gdp").is_some());
    assert!(outcome.boxes.get("US", "gdp").is_none());
    // Sparse fill: CA has no table row at all.
    assert!(outcome.boxes.values("CA").unwrap().is_empty());
}

#[tokio::test]
async fn explicit_cross_source_spec_with_multiplier() {
    let catalog = catalog();
    let storage = MemoryStorage::new().table("worldbank", worldbank_rows());

    let mut item = RawOrderItem::new("worldbank", "gdp");
    item.location_codes = vec!["DE".into()];
    let order = validate_and_expand(
        &RawOrder {
            items: vec![item],
            derived: vec![DerivedSpec {
                numerator: MetricRef::qualified("worldbank", "gdp"),
                denominator: MetricRef::qualified("worldbank", "population"),
                multiplier: Some(1000.0),
                label: "GDP Per Thousand".into(),
            }],
        },
        &catalog,
    );

    let executor = AggregateExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items, &order.derived).await.unwrap();
    let value = outcome
        .boxes
        .get("DE", "GDP Per Thousand (computed)")
        .unwrap();
    assert!((value - 3_800_000.0 / 83.0 * 1000.0).abs() < 1e-6);
}

#[tokio::test]
async fn geojson_carries_box_values() {
    let catalog = catalog();
    let storage = MemoryStorage::new().table("worldbank", worldbank_rows());

    let mut item = RawOrderItem::new("worldbank", "gdp");
    item.region = Some("eu".into());
    let order = validate_and_expand(
        &RawOrder {
            items: vec![item],
            derived: vec![],
        },
        &catalog,
    );
    let executor = AggregateExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items, &order.derived).await.unwrap();

    assert_eq!(outcome.geojson.features.len(), 3);
    let de = outcome
        .geojson
        .features
        .iter()
        .find(|f| f.id == "DE")
        .unwrap();
    assert_eq!(de.properties["location_code"], "DE");
    assert!((de.properties["gdp"].as_f64().unwrap() - 3_800_000.0).abs() < 1e-6);
}

fn quake(id: usize, magnitude: f64, days_offset: i64) -> EventRecord {
    let base = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).single().unwrap();
    EventRecord::new(
        format!("eq-{id:04}"),
        "US-CA",
        base + Duration::hours(days_offset * 24 + (id % 24) as i64),
        36.0,
        -120.0,
    )
    .property("magnitude", magnitude)
    .property("depth", 10.0)
}

#[tokio::test]
async fn event_limit_keeps_highest_magnitude_subset() {
    let catalog = catalog();
    // 1500 matching events, magnitudes 4.0..=5.5 cycling.
    let records: Vec<EventRecord> = (0..1500)
        .map(|i| quake(i, 4.0 + (i % 16) as f64 * 0.1, (i % 60) as i64))
        .collect();
    let storage = MemoryStorage::new().event_file("usgs", "events", records);

    let mut raw = RawOrderItem::new("usgs", "magnitude");
    raw.mode = Some(ExecutionMode::Events);
    raw.filters.insert("magnitude_min".into(), 4.0);
    let order = validate_and_expand(
        &RawOrder {
            items: vec![raw],
            derived: vec![],
        },
        &catalog,
    );

    let executor = EventExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items[0]).await.unwrap();

    // min(default 500, earthquake ceiling 1000) = 500 events.
    assert_eq!(outcome.features.len(), 500);
    // The kept subset is the strongest one: nothing below the 5.0 tier
    // survives when 500 of 1500 are kept.
    let min_kept = outcome
        .features
        .iter()
        .map(|f| f.properties["magnitude"].as_f64().unwrap())
        .fold(f64::INFINITY, f64::min);
    assert!(min_kept >= 4.99);
    assert!(outcome.summary.contains("1500"));
    assert!(outcome.summary.contains("magnitude"));
}

#[tokio::test]
async fn requested_limit_cannot_exceed_family_ceiling() {
    let catalog = catalog();
    let records: Vec<EventRecord> = (0..1200).map(|i| quake(i, 5.0, (i % 30) as i64)).collect();
    let storage = MemoryStorage::new().event_file("usgs", "events", records);

    let mut raw = RawOrderItem::new("usgs", "magnitude");
    raw.mode = Some(ExecutionMode::Events);
    raw.limit = Some(5000);
    let order = validate_and_expand(
        &RawOrder {
            items: vec![raw],
            derived: vec![],
        },
        &catalog,
    );

    let executor = EventExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items[0]).await.unwrap();
    assert_eq!(outcome.features.len(), 1000);
}

#[tokio::test]
async fn filters_apply_bounds_and_ignore_unknown_columns() {
    let catalog = catalog();
    let records = vec![
        quake(1, 3.0, 0),
        quake(2, 4.5, 1),
        quake(3, 6.2, 2),
    ];
    let storage = MemoryStorage::new().event_file("usgs", "events", records);

    let mut raw = RawOrderItem::new("usgs", "magnitude");
    raw.mode = Some(ExecutionMode::Events);
    raw.filters.insert("magnitude_min".into(), 4.0);
    raw.filters.insert("magnitude_max".into(), 6.0);
    raw.filters.insert("wind_min".into(), 100.0);
    let order = validate_and_expand(
        &RawOrder {
            items: vec![raw],
            derived: vec![],
        },
        &catalog,
    );

    let executor = EventExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items[0]).await.unwrap();

    assert_eq!(outcome.features.len(), 1);
    assert_eq!(outcome.features[0].id, "eq-0002");
    assert!(outcome
        .warnings
        .iter()
        .any(|w| w.contains("wind") && w.contains("ignored")));
}

#[tokio::test]
async fn region_filter_uses_code_prefixes_and_time_uses_years() {
    let catalog = catalog();
    let base = Utc.with_ymd_and_hms(2019, 6, 1, 0, 0, 0).single().unwrap();
    let records = vec![
        EventRecord::new("a", "US-CA", base, 36.0, -120.0).property("magnitude", 5.0),
        EventRecord::new("b", "DE-BY", base, 48.0, 11.0).property("magnitude", 5.0),
        EventRecord::new(
            "c",
            "US-NV",
            Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).single().unwrap(),
            39.0,
            -116.0,
        )
        .property("magnitude", 5.0),
    ];
    let storage = MemoryStorage::new().event_file("usgs", "events", records);

    let mut raw = RawOrderItem::new("usgs", "magnitude");
    raw.mode = Some(ExecutionMode::Events);
    raw.region = Some("north america".into());
    raw.time = Some(TimeSpec::Range {
        start: 2018,
        end: 2020,
    });
    let order = validate_and_expand(
        &RawOrder {
            items: vec![raw],
            derived: vec![],
        },
        &catalog,
    );

    let executor = EventExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items[0]).await.unwrap();

    // "b" fails the US/CA prefix filter, "c" fails the year range.
    assert_eq!(outcome.features.len(), 1);
    assert_eq!(outcome.features[0].id, "a");
}

#[tokio::test]
async fn long_spans_widen_granularity_instead_of_failing() {
    let catalog = catalog();
    let base = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).single().unwrap();

    // Two days: stays six-hourly.
    let short = vec![
        quake(1, 5.0, 0),
        quake(2, 5.0, 1),
    ];
    // ~6 months: beyond the 92-day six-hourly cap.
    let medium = vec![
        EventRecord::new("m1", "US", base, 36.0, -120.0).property("magnitude", 5.0),
        EventRecord::new("m2", "US", base + Duration::days(180), 36.0, -120.0)
            .property("magnitude", 5.0),
    ];
    // ~4 years: beyond the 2-year daily cap.
    let long = vec![
        EventRecord::new("l1", "US", base, 36.0, -120.0).property("magnitude", 5.0),
        EventRecord::new("l2", "US", base + Duration::days(1500), 36.0, -120.0)
            .property("magnitude", 5.0),
    ];

    for (records, expected) in [
        (short, Granularity::SixHourly),
        (medium, Granularity::Daily),
        (long, Granularity::Weekly),
    ] {
        let storage = MemoryStorage::new().event_file("usgs", "events", records);
        let mut raw = RawOrderItem::new("usgs", "magnitude");
        raw.mode = Some(ExecutionMode::Events);
        let order = validate_and_expand(
            &RawOrder {
                items: vec![raw],
                derived: vec![],
            },
            &catalog,
        );
        let executor = EventExecutor::new(&catalog, &storage);
        let outcome = executor.execute(&order.items[0]).await.unwrap();
        assert_eq!(outcome.granularity, expected);
    }
}

#[tokio::test]
async fn polygon_perimeters_pass_through() {
    let catalog = catalog();
    let base = Utc.with_ymd_and_hms(2022, 8, 1, 0, 0, 0).single().unwrap();
    let ring = vec![vec![
        [-120.0, 36.0],
        [-119.5, 36.0],
        [-119.5, 36.5],
        [-120.0, 36.0],
    ]];
    let mut fire = EventRecord::new("fire-1", "US-CA", base, 36.2, -119.8)
        .property("burned_area", 4200.0);
    fire.perimeter = Some(ring.clone());
    let storage = MemoryStorage::new().event_file("firms", "fires", vec![fire]);

    let mut raw = RawOrderItem::new("firms", "burned_area");
    raw.mode = Some(ExecutionMode::Events);
    raw.event_file = Some("fires".into());
    let order = validate_and_expand(
        &RawOrder {
            items: vec![raw],
            derived: vec![],
        },
        &catalog,
    );

    let executor = EventExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items[0]).await.unwrap();

    match &outcome.features[0].geometry {
        geolens_protocol::Geometry::Polygon { coordinates } => assert_eq!(*coordinates, ring),
        other => panic!("expected polygon, got {other:?}"),
    }
}

#[tokio::test]
async fn track_buckets_record_only_changed_fields() {
    let catalog = catalog();
    let base = Utc.with_ymd_and_hms(2021, 9, 1, 0, 0, 0).single().unwrap();
    let records = vec![
        EventRecord::new("storm-1", "US", base, 25.0, -80.0).property("wind", 85.0),
        // Six hours later: moved, same wind.
        EventRecord::new("storm-1", "US", base + Duration::hours(6), 26.0, -81.0)
            .property("wind", 85.0),
    ];
    let storage = MemoryStorage::new().event_file("worldbank", "events", records);

    let mut raw = RawOrderItem::new("worldbank", "gdp");
    raw.mode = Some(ExecutionMode::Events);
    let order = validate_and_expand(
        &RawOrder {
            items: vec![raw],
            derived: vec![],
        },
        &catalog,
    );

    let executor = EventExecutor::new(&catalog, &storage);
    let outcome = executor.execute(&order.items[0]).await.unwrap();

    assert_eq!(outcome.time_data.len(), 2);
    let later = outcome
        .time_data
        .values()
        .nth(1)
        .and_then(|bucket| bucket.get("storm-1"))
        .unwrap();
    assert!(later.contains_key("latitude"));
    assert!(later.contains_key("longitude"));
    // Wind did not change between the two fixes.
    assert!(!later.contains_key("wind"));
}
