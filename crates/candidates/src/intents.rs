use geolens_catalog::Catalog;
use geolens_protocol::{Candidate, CandidateKind};

use crate::config::{clamp_confidence, ScoringConfig};
use crate::text::contains_phrase;

const NAVIGATION_PHRASES: &[&str] = &[
    "show me",
    "where is",
    "zoom to",
    "take me to",
    "go to",
    "navigate to",
];

const REFERENCE_PREFIXES: &[&str] = &[
    "what is",
    "what's",
    "capital of",
    "how many",
    "tell me about",
];

const DATA_WORDS: &[&str] = &["data", "statistics"];

/// Score the competing intent readings. Several intents may exceed the
/// floor at once; the model sees all of them.
pub(crate) fn detect_intents(
    query_lower: &str,
    catalog: &Catalog,
    config: &ScoringConfig,
) -> Vec<Candidate> {
    let mut out = Vec::new();

    let mut navigation = Candidate::new(CandidateKind::Intent, "navigation", 0.0);
    let mut nav_score = 0.0;
    for phrase in NAVIGATION_PHRASES {
        if contains_phrase(query_lower, phrase) {
            nav_score += config.navigation_boost;
            navigation = navigation.evidence(format!("phrase:{phrase}"));
            break;
        }
    }
    navigation.confidence = clamp_confidence(nav_score);
    if navigation.confidence >= config.floor {
        out.push(navigation);
    }

    let mut data_request = Candidate::new(CandidateKind::Intent, "data_request", 0.0);
    let mut data_score = 0.0;
    if DATA_WORDS.iter().any(|w| contains_phrase(query_lower, w)) {
        data_score += config.data_request_boost;
        data_request = data_request.evidence("data_words");
    }
    if let Some(metric) = metric_word(query_lower, catalog) {
        data_score += config.metric_word_boost;
        data_request = data_request.evidence(format!("metric:{metric}"));
    }
    data_request.confidence = clamp_confidence(data_score);
    if data_request.confidence >= config.floor {
        out.push(data_request);
    }

    let mut reference = Candidate::new(CandidateKind::Intent, "reference_lookup", 0.0);
    let mut ref_score = 0.0;
    for prefix in REFERENCE_PREFIXES {
        if contains_phrase(query_lower, prefix) {
            ref_score += config.reference_lookup_boost;
            reference = reference.evidence(format!("phrase:{prefix}"));
            break;
        }
    }
    reference.confidence = clamp_confidence(ref_score);
    if reference.confidence >= config.floor {
        out.push(reference);
    }

    out
}

/// First catalog metric named explicitly in the query.
fn metric_word(query_lower: &str, catalog: &Catalog) -> Option<String> {
    for (_, def) in catalog.sources() {
        for metric in &def.metrics {
            if contains_phrase(query_lower, &metric.to_lowercase()) {
                return Some(metric.clone());
            }
        }
    }
    None
}
