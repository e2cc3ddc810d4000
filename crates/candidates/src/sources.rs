use geolens_catalog::Catalog;
use geolens_protocol::{Candidate, CandidateKind};

use crate::config::{clamp_confidence, ScoringConfig};
use crate::text::contains_phrase;

/// Generic data-seeking words that boost a source reading of the query.
const DATA_WORDS: &[&str] = &["data", "statistics", "source"];

/// Score every catalog source against the query. All matches above the
/// floor are reported, never just the best.
pub(crate) fn detect_sources(
    query_lower: &str,
    catalog: &Catalog,
    config: &ScoringConfig,
) -> Vec<Candidate> {
    let has_data_word = DATA_WORDS.iter().any(|w| contains_phrase(query_lower, w));

    let mut out = Vec::new();
    for (id, def) in catalog.sources() {
        let name_lower = def.name.to_lowercase();
        let id_lower = id.to_lowercase();

        let hit = if contains_phrase(query_lower, &name_lower) {
            Some((config.source_exact, name_lower.clone(), "exact_name"))
        } else if contains_phrase(query_lower, &id_lower) {
            Some((config.source_identifier, id_lower.clone(), "identifier"))
        } else {
            longest_name_word_in_query(&name_lower, query_lower).map(|word| {
                if word.len() > 8 {
                    (config.source_substring_long, word.to_string(), "substring_long")
                } else {
                    (config.source_substring_short, word.to_string(), "substring_short")
                }
            })
        };

        let Some((base, matched, evidence)) = hit else {
            continue;
        };

        let mut candidate = Candidate::new(CandidateKind::Source, id.clone(), 0.0)
            .evidence(evidence)
            .matched(matched);
        let mut score = base;
        if has_data_word {
            score += config.data_word_boost;
            candidate = candidate.evidence("data_words");
        }
        candidate.confidence = clamp_confidence(score);
        if candidate.confidence >= config.floor {
            out.push(candidate);
        }
    }
    out
}

/// Longest word of the source name (>= 4 chars) that appears in the query.
fn longest_name_word_in_query<'a>(name_lower: &'a str, query_lower: &str) -> Option<&'a str> {
    name_lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| w.len() >= 4 && contains_phrase(query_lower, w))
        .max_by_key(|w| w.len())
}
