//! Flat structured extractions: region expansions, topic buckets and time
//! ranges. These are unambiguous, so they are reported as values rather
//! than scored candidates.

use geolens_catalog::Catalog;
use geolens_protocol::{RegionExpansion, TimeSpec};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::contains_phrase;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap_or_else(|e| unreachable!("{e}")));

const SERIES_WORDS: &[&str] = &["trend", "trends", "historical", "history", "over time"];
const LATEST_WORDS: &[&str] = &["latest", "most recent", "current"];

/// Topic keyword buckets. The bucket name is what gets reported.
const TOPIC_BUCKETS: &[(&str, &[&str])] = &[
    ("seismic", &["earthquake", "earthquakes", "quake", "quakes", "seismic"]),
    ("storms", &["storm", "storms", "hurricane", "hurricanes", "cyclone", "typhoon"]),
    ("fires", &["fire", "fires", "wildfire", "wildfires", "burned"]),
    ("floods", &["flood", "floods", "flooding"]),
    ("economy", &["gdp", "economy", "economic", "income"]),
    ("demographics", &["population", "people", "demographic", "demographics"]),
];

/// Known region names present in the query, expanded to their member codes.
pub(crate) fn extract_regions(query_lower: &str, catalog: &Catalog) -> Vec<RegionExpansion> {
    catalog
        .region_names()
        .filter(|name| contains_phrase(query_lower, name))
        .map(|name| RegionExpansion {
            name: name.clone(),
            codes: catalog.expand_region(name).unwrap_or_default().to_vec(),
        })
        .collect()
}

pub(crate) fn extract_topics(query_lower: &str) -> Vec<String> {
    TOPIC_BUCKETS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| contains_phrase(query_lower, k)))
        .map(|(bucket, _)| (*bucket).to_string())
        .collect()
}

/// Time-range detection. Explicit years win over trend words, trend words
/// over "latest". Absence means no time signal at all.
pub(crate) fn extract_time(query_lower: &str) -> Option<TimeSpec> {
    let mut years: Vec<i32> = YEAR_RE
        .find_iter(query_lower)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    years.sort_unstable();
    years.dedup();

    match years.as_slice() {
        [] => {}
        [year] => return Some(TimeSpec::Year { year: *year }),
        [first, .., last] => {
            return Some(TimeSpec::Range {
                start: *first,
                end: *last,
            })
        }
    }

    if SERIES_WORDS.iter().any(|w| contains_phrase(query_lower, w)) {
        return Some(TimeSpec::Series);
    }
    if LATEST_WORDS.iter().any(|w| contains_phrase(query_lower, w)) {
        return Some(TimeSpec::Latest);
    }
    None
}
