use std::sync::Arc;

use geolens_catalog::Catalog;
use geolens_protocol::{Candidate, CandidateSet, SuffixType, Viewport};

use crate::config::ScoringConfig;
use crate::extract::{extract_regions, extract_time, extract_topics};
use crate::intents::detect_intents;
use crate::locations::detect_locations;
use crate::sources::detect_sources;
use crate::text::singularized_query;

/// Scores within this distance count as "equally scored" for the
/// disambiguation rule.
const TIE_EPSILON: f64 = 1e-9;

/// Deterministic, side-effect-free candidate generation. Every detector
/// runs to completion on every call; a dominant match in one category
/// never short-circuits the others.
pub struct CandidateGenerator {
    catalog: Arc<Catalog>,
    config: ScoringConfig,
}

impl CandidateGenerator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_config(catalog, ScoringConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, config: ScoringConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn generate(&self, query: &str, viewport: Option<&Viewport>) -> CandidateSet {
        let query_lower = query.to_lowercase();
        let singular = singularized_query(&query_lower);

        let sources = detect_sources(&query_lower, &self.catalog, &self.config);
        let mut locations = detect_locations(
            &query_lower,
            &singular,
            &self.catalog,
            viewport,
            &self.config,
        );
        let intents = detect_intents(&query_lower, &self.catalog, &self.config);

        apply_source_overlap_penalty(&mut locations, &sources, &self.config);

        let mut set = CandidateSet {
            intents,
            locations,
            sources,
            regions: extract_regions(&query_lower, &self.catalog),
            topics: extract_topics(&query_lower),
            time: extract_time(&query_lower),
        };
        sort_descending(&mut set.intents);
        sort_descending(&mut set.locations);
        sort_descending(&mut set.sources);
        mark_disambiguation(&mut set.locations);

        log::debug!(
            "candidates for '{}': {} intents, {} locations, {} sources, {} regions",
            query,
            set.intents.len(),
            set.locations.len(),
            set.sources.len(),
            set.regions.len()
        );
        set
    }
}

/// Mandatory post-pass: a location whose matched substring also sits inside
/// a higher-or-equal source candidate's matched text loses confidence (the
/// "bureau" inside "Australian Bureau of Statistics" case). Scores only
/// ever decrease here, and never below zero.
fn apply_source_overlap_penalty(
    locations: &mut [Candidate],
    sources: &[Candidate],
    config: &ScoringConfig,
) {
    for location in locations.iter_mut() {
        let Some(matched) = location.matched_text.as_deref() else {
            continue;
        };
        let overlapped = sources.iter().any(|source| {
            source.confidence >= location.confidence
                && source
                    .matched_text
                    .as_deref()
                    .is_some_and(|text| text.contains(matched))
        });
        if overlapped {
            location.confidence =
                (location.confidence - config.source_overlap_penalty).max(0.0);
            location.evidence.push("source_overlap_penalty".to_string());
        }
    }
}

fn sort_descending(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.value.cmp(&b.value))
    });
}

/// Singular-suffix matches tied at the top score need disambiguation; a
/// plural suffix means show-all semantics instead.
fn mark_disambiguation(locations: &mut [Candidate]) {
    let Some(top) = locations.first().map(|c| c.confidence) else {
        return;
    };
    let tied: Vec<usize> = locations
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            (top - c.confidence).abs() < TIE_EPSILON && c.suffix == Some(SuffixType::Singular)
        })
        .map(|(i, _)| i)
        .collect();
    if tied.len() >= 2 {
        for i in tied {
            locations[i].needs_disambiguation = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolens_catalog::{LocationEntry, LocationLevel, SourceDef};
    use std::collections::BTreeMap;

    fn test_catalog() -> Arc<Catalog> {
        let mut builder = Catalog::builder()
            .source(
                "abs",
                SourceDef {
                    name: "Australian Bureau of Statistics".into(),
                    metrics: vec!["population".into()],
                    events: BTreeMap::new(),
                },
            )
            .location(LocationEntry {
                name: "Australia".into(),
                code: "AU".into(),
                level: LocationLevel::Country,
                latitude: None,
                longitude: None,
            })
            .location(LocationEntry {
                name: "Germany".into(),
                code: "DE".into(),
                level: LocationLevel::Country,
                latitude: None,
                longitude: None,
            })
            .region("western europe", vec!["DE".into(), "FR".into()]);

        // 31 distinct admin-2 entries all named "Washington County".
        for i in 0..31 {
            builder = builder.location(LocationEntry {
                name: "Washington County".into(),
                code: format!("US-{i:02}-WA"),
                level: LocationLevel::Admin2,
                latitude: Some(40.0),
                longitude: Some(-95.0),
            });
        }
        Arc::new(builder.build().unwrap())
    }

    fn wide_viewport() -> Viewport {
        Viewport::new(-180.0, -90.0, 180.0, 90.0)
    }

    #[test]
    fn all_confidences_stay_within_bounds() {
        let generator = CandidateGenerator::new(test_catalog());
        let set = generator.generate(
            "show me australian bureau of statistics data for australia 2020",
            None,
        );
        for candidate in set
            .intents
            .iter()
            .chain(set.locations.iter())
            .chain(set.sources.iter())
        {
            assert!(candidate.confidence >= 0.0 && candidate.confidence <= 1.0);
        }
    }

    #[test]
    fn overlap_penalty_strictly_decreases_location_score() {
        let generator = CandidateGenerator::new(test_catalog());

        let plain = generator.generate("australia population", None);
        let plain_score = plain
            .locations
            .iter()
            .find(|c| c.value == "Australia")
            .unwrap()
            .confidence;

        let conflicted = generator.generate("australian bureau of statistics population", None);
        let conflicted_score = conflicted
            .locations
            .iter()
            .find(|c| c.value == "Australia")
            .map(|c| c.confidence)
            .unwrap_or(0.0);

        assert!(conflicted_score < plain_score);
    }

    #[test]
    fn dominant_match_does_not_suppress_other_categories() {
        let generator = CandidateGenerator::new(test_catalog());
        let set = generator.generate("show me germany population data", None);
        // Location is a certain match, yet intents are still reported.
        assert!(!set.locations.is_empty());
        assert!(!set.intents.is_empty());
    }

    #[test]
    fn washington_county_marks_all_ties_for_disambiguation() {
        let generator = CandidateGenerator::new(test_catalog());
        let vp = wide_viewport();
        let set = generator.generate("show me washington county", Some(&vp));

        let group = set.disambiguation_group();
        assert_eq!(group.len(), 31);
        let mut codes: Vec<&str> = group
            .iter()
            .map(|c| c.location_codes[0].as_str())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 31);
    }

    #[test]
    fn plural_suffix_is_not_marked_for_disambiguation() {
        let generator = CandidateGenerator::new(test_catalog());
        let vp = wide_viewport();
        let set = generator.generate("show me washington counties", Some(&vp));

        assert!(set.disambiguation_group().is_empty());
        assert!(set
            .locations
            .iter()
            .all(|c| c.suffix == Some(SuffixType::Plural)));
    }

    #[test]
    fn penalty_subtracts_exactly_the_configured_amount() {
        let config = ScoringConfig::default();
        let mut locations = vec![Candidate::new(
            geolens_protocol::CandidateKind::Location,
            "Australia",
            1.0,
        )
        .matched("australia")];
        let sources = vec![Candidate::new(
            geolens_protocol::CandidateKind::Source,
            "abs",
            1.0,
        )
        .matched("australian bureau of statistics")];

        apply_source_overlap_penalty(&mut locations, &sources, &config);
        assert!((locations[0].confidence - 0.5).abs() < 1e-9);
        assert!(locations[0]
            .evidence
            .contains(&"source_overlap_penalty".to_string()));

        // A weaker source never penalizes.
        let weak_sources = vec![Candidate::new(
            geolens_protocol::CandidateKind::Source,
            "abs",
            0.3,
        )
        .matched("australian bureau of statistics")];
        let mut untouched = vec![Candidate::new(
            geolens_protocol::CandidateKind::Location,
            "Australia",
            1.0,
        )
        .matched("australia")];
        apply_source_overlap_penalty(&mut untouched, &weak_sources, &config);
        assert_eq!(untouched[0].confidence, 1.0);
    }

    #[test]
    fn region_and_time_are_flat_extractions() {
        let generator = CandidateGenerator::new(test_catalog());
        let set = generator.generate("western europe gdp trend", None);
        assert_eq!(set.regions.len(), 1);
        assert_eq!(set.regions[0].codes, vec!["DE", "FR"]);
        assert_eq!(set.time, Some(geolens_protocol::TimeSpec::Series));
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = CandidateGenerator::new(test_catalog());
        let a = generator.generate("show me washington county", Some(&wide_viewport()));
        let b = generator.generate("show me washington county", Some(&wide_viewport()));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
