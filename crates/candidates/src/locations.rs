use geolens_catalog::{Catalog, LocationEntry, LocationLevel};
use geolens_protocol::{Candidate, CandidateKind, SuffixType, Viewport};
use nucleo_matcher::{pattern::Pattern, Matcher};

use crate::config::ScoringConfig;
use crate::text::{contains_phrase, tokens};

/// Score every gazetteer entry against the query. One candidate per entry,
/// carrying its best match; nothing is discarded early.
pub(crate) fn detect_locations(
    query_lower: &str,
    singular_query: &str,
    catalog: &Catalog,
    viewport: Option<&Viewport>,
    config: &ScoringConfig,
) -> Vec<Candidate> {
    let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);
    let query_tokens = tokens(query_lower);

    let mut out = Vec::new();
    for entry in catalog.locations() {
        let name_lower = entry.name.to_lowercase();

        let exact = contains_phrase(query_lower, &name_lower);
        let via_singular = !exact && contains_phrase(singular_query, &name_lower);

        if exact || via_singular {
            // Admin-2 entries are matched only through the current viewport.
            if entry.level == LocationLevel::Admin2 && !in_viewport(entry, viewport) {
                continue;
            }
            let (score, evidence) = exact_score(entry.level, config);
            let suffix = if via_singular {
                SuffixType::Plural
            } else {
                SuffixType::Singular
            };
            out.push(
                Candidate::new(CandidateKind::Location, entry.name.clone(), score)
                    .evidence(evidence)
                    .matched(name_lower)
                    .codes(vec![entry.code.clone()])
                    .suffix(suffix),
            );
            continue;
        }

        if entry.level == LocationLevel::Admin2 && !in_viewport(entry, viewport) {
            continue;
        }
        if let Some(token) = partial_match(&query_tokens, &name_lower, &mut matcher) {
            out.push(
                Candidate::new(CandidateKind::Location, entry.name.clone(), config.partial_word)
                    .evidence("partial_word")
                    .matched(token)
                    .codes(vec![entry.code.clone()]),
            );
        }
    }
    out
}

fn exact_score(level: LocationLevel, config: &ScoringConfig) -> (f64, &'static str) {
    match level {
        LocationLevel::Country => (config.country_exact, "country_name"),
        LocationLevel::Capital => (config.capital_exact, "capital_city"),
        LocationLevel::Admin1 => (config.admin1_exact, "admin1_name"),
        LocationLevel::Admin2 => (config.admin2_viewport, "admin2_viewport"),
    }
}

fn in_viewport(entry: &LocationEntry, viewport: Option<&Viewport>) -> bool {
    let Some(vp) = viewport else {
        return false;
    };
    match (entry.latitude, entry.longitude) {
        (Some(lat), Some(lon)) => vp.contains(lat, lon),
        // No coordinate on record: the viewport cannot exclude it.
        _ => true,
    }
}

/// Partial-word match: a query token (>= 5 chars) that fuzzy-matches the
/// name and shares a 4-char prefix with one of its words. The prefix guard
/// keeps subsequence matching from linking unrelated tokens.
fn partial_match(
    query_tokens: &[String],
    name_lower: &str,
    matcher: &mut Matcher,
) -> Option<String> {
    for token in query_tokens.iter().filter(|t| t.len() >= 5) {
        let shares_prefix = name_lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|w| w.len() >= 4 && token.len() >= 4 && w[..4] == token[..4]);
        if !shares_prefix {
            continue;
        }
        let pattern = Pattern::parse(
            token,
            nucleo_matcher::pattern::CaseMatching::Ignore,
            nucleo_matcher::pattern::Normalization::Smart,
        );
        let haystack = nucleo_matcher::Utf32String::from(name_lower);
        if pattern.score(haystack.slice(..), matcher).is_some() {
            return Some(token.clone());
        }
    }
    None
}
