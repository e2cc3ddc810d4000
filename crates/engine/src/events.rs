//! Event-mode execution: individual timestamped records filtered, limited
//! by a per-family ceiling, and grouped into time buckets for animation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use geolens_catalog::{Catalog, EventFamily};
use geolens_protocol::{
    EventRecord, Feature, Geometry, Granularity, OrderItem, TimeData, TimeRange,
};

use crate::error::{EngineError, Result};
use crate::storage::Storage;
use crate::validate::{resolve_item_codes, DEFAULT_EVENT_FILE};

/// Limit applied when the order names none.
pub const DEFAULT_EVENT_LIMIT: usize = 500;

/// Significance columns, most preferred first. The first one present in
/// the filtered schema decides which events survive the limit.
const SIGNIFICANCE_PREFERENCE: &[&str] = &["magnitude", "wind", "burned_area", "severity", "depth"];

/// Hard per-family result ceilings; a requested limit can only lower them.
pub fn family_max_limit(family: EventFamily) -> usize {
    match family {
        EventFamily::Earthquake => 1000,
        EventFamily::Storm => 500,
        EventFamily::Fire => 800,
        EventFamily::Generic => 500,
    }
}

/// Longest span each granularity supports before widening one step.
fn span_cap(granularity: Granularity) -> Option<Duration> {
    match granularity {
        Granularity::SixHourly => Some(Duration::days(92)),
        Granularity::Daily => Some(Duration::days(730)),
        Granularity::Weekly => None,
    }
}

#[derive(Debug)]
pub struct EventOutcome {
    pub features: Vec<Feature>,
    pub time_data: TimeData,
    pub time_range: Option<TimeRange>,
    pub granularity: Granularity,
    pub summary: String,
    pub warnings: Vec<String>,
}

pub struct EventExecutor<'a> {
    catalog: &'a Catalog,
    storage: &'a dyn Storage,
}

impl<'a> EventExecutor<'a> {
    pub fn new(catalog: &'a Catalog, storage: &'a dyn Storage) -> Self {
        Self { catalog, storage }
    }

    pub async fn execute(&self, item: &OrderItem) -> Result<EventOutcome> {
        let file_key = item.event_file.as_deref().unwrap_or(DEFAULT_EVENT_FILE);
        let file_def = self.catalog.event_file(&item.source_id, file_key).ok_or(
            EngineError::UnknownEventFile {
                source_id: item.source_id.clone(),
                file_key: file_key.to_string(),
            },
        )?;

        let mut records = self.storage.read_events(&item.source_id, file_key).await?;
        let mut warnings = Vec::new();

        // Region filter: location-code prefix match against the expansion.
        let codes = resolve_item_codes(self.catalog, item);
        if !codes.is_empty() {
            records.retain(|r| codes.iter().any(|c| r.location_code.starts_with(c.as_str())));
        }

        // Inclusive year-range filter.
        records.retain(|r| item.time.contains_year(r.year()));

        // Column filters are permissive: a bound on a column absent from
        // this event family is ignored, not an error.
        let schema: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.properties.keys().cloned())
            .collect();
        for (field, range) in &item.filters {
            if !schema.contains(field) {
                warnings.push(format!("filter on '{field}' ignored: column not present"));
                continue;
            }
            records.retain(|r| match r.properties.get(field) {
                Some(value) => {
                    range.min.map_or(true, |min| *value >= min)
                        && range.max.map_or(true, |max| *value <= max)
                }
                None => false,
            });
        }

        let total_matched = records.len();
        let type_max = family_max_limit(file_def.family);
        let effective_limit = item.limit.unwrap_or(DEFAULT_EVENT_LIMIT).min(type_max);
        let significance = SIGNIFICANCE_PREFERENCE
            .iter()
            .find(|&&column| schema.contains(column))
            .copied();
        if total_matched > effective_limit {
            match significance {
                Some(column) => records.sort_by(|a, b| {
                    let sa = a.properties.get(column).copied().unwrap_or(f64::NEG_INFINITY);
                    let sb = b.properties.get(column).copied().unwrap_or(f64::NEG_INFINITY);
                    sb.partial_cmp(&sa)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.id.cmp(&b.id))
                }),
                // No significance column in this schema: keep the newest.
                None => records.sort_by(|a, b| {
                    b.timestamp
                        .cmp(&a.timestamp)
                        .then_with(|| a.id.cmp(&b.id))
                }),
            }
            records.truncate(effective_limit);
            log::debug!(
                "event limit clamp: {total_matched} matched, kept {effective_limit} (family cap {type_max})"
            );
        }

        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let time_range = match (records.first(), records.last()) {
            (Some(first), Some(last)) => Some(TimeRange {
                start: first.timestamp,
                end: last.timestamp,
            }),
            _ => None,
        };

        // Start fine and widen one step at a time while the span exceeds
        // the cap; never reject the query over its span.
        let mut granularity = Granularity::SixHourly;
        if let Some(range) = &time_range {
            let span = range.end - range.start;
            while let Some(cap) = span_cap(granularity) {
                if span <= cap {
                    break;
                }
                match granularity.widen() {
                    Some(wider) => granularity = wider,
                    None => break,
                }
            }
        }

        let time_data = bucket_records(&records, granularity);
        let features = build_features(&records);

        let summary = match significance {
            Some(column) if total_matched > effective_limit => format!(
                "{total_matched} events matched; returning the top {effective_limit} by {column}"
            ),
            _ if total_matched > effective_limit => {
                format!("{total_matched} events matched; returning the {effective_limit} most recent")
            }
            _ => format!("{total_matched} events matched"),
        };

        Ok(EventOutcome {
            features,
            time_data,
            time_range,
            granularity,
            summary,
            warnings,
        })
    }
}

/// Group records into rounded buckets, recording only the fields that
/// changed since the record's previous appearance (tracks re-report the
/// same id across buckets).
fn bucket_records(records: &[EventRecord], granularity: Granularity) -> TimeData {
    let mut time_data = TimeData::new();
    let mut last_state: HashMap<&str, serde_json::Map<String, serde_json::Value>> = HashMap::new();

    for record in records {
        let mut state = serde_json::Map::new();
        insert_number(&mut state, "latitude", record.latitude);
        insert_number(&mut state, "longitude", record.longitude);
        for (key, value) in &record.properties {
            insert_number(&mut state, key, *value);
        }

        let changed: serde_json::Map<String, serde_json::Value> = match last_state.get(record.id.as_str()) {
            Some(previous) => state
                .iter()
                .filter(|(k, v)| previous.get(*k) != Some(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => state.clone(),
        };

        if !changed.is_empty() {
            let bucket = bucket_timestamp(record.timestamp, granularity).to_rfc3339();
            time_data
                .entry(bucket)
                .or_default()
                .insert(record.id.clone(), changed);
        }
        last_state.insert(record.id.as_str(), state);
    }
    time_data
}

fn insert_number(map: &mut serde_json::Map<String, serde_json::Value>, key: &str, value: f64) {
    if let Some(number) = serde_json::Number::from_f64(value) {
        map.insert(key.to_string(), serde_json::Value::Number(number));
    }
}

/// One feature per distinct event id. Polygon perimeters pass through
/// unchanged; point and track types carry only the coordinate pair.
fn build_features(records: &[EventRecord]) -> Vec<Feature> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut features = Vec::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            continue;
        }
        let geometry = match &record.perimeter {
            Some(rings) => Geometry::Polygon {
                coordinates: rings.clone(),
            },
            None => Geometry::point(record.longitude, record.latitude),
        };
        let mut feature = Feature::new(record.id.clone(), geometry);
        feature.properties.insert(
            "location_code".to_string(),
            serde_json::Value::String(record.location_code.clone()),
        );
        feature.properties.insert(
            "timestamp".to_string(),
            serde_json::Value::String(record.timestamp.to_rfc3339()),
        );
        for (key, value) in &record.properties {
            insert_number(&mut feature.properties, key, *value);
        }
        features.push(feature);
    }
    features
}

fn bucket_timestamp(ts: DateTime<Utc>, granularity: Granularity) -> DateTime<Utc> {
    let date = ts.date_naive();
    let naive = match granularity {
        Granularity::SixHourly => {
            let hour = ts.hour() - ts.hour() % 6;
            date.and_hms_opt(hour, 0, 0)
        }
        Granularity::Daily => date.and_hms_opt(0, 0, 0),
        Granularity::Weekly => {
            let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
            monday.and_hms_opt(0, 0, 0)
        }
    };
    match naive {
        Some(naive) => Utc.from_utc_datetime(&naive),
        None => ts,
    }
}
