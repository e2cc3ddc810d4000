//! Routing state machine: candidates-ready -> (direct route | model
//! consultation) -> routed. Direct routes exist only for structurally
//! unambiguous cases; anything involving competing categories goes to the
//! model.

use geolens_protocol::{Candidate, CandidateSet, LocationRef, Response, SuffixType};

/// Phrases that resolve a pending disambiguation into "all of them".
const SHOW_ALL_TRIGGERS: &[&str] = &[
    "show all",
    "show them all",
    "all of them",
    "show borders",
    "show every",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    CandidatesReady,
    ModelConsulted,
    Routed,
}

#[derive(Debug, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Try to route without consulting the model. Returns None when the
    /// interpretation is not structurally unambiguous.
    pub fn route_direct(
        &self,
        set: &CandidateSet,
        query: &str,
        prior_options: &[LocationRef],
    ) -> Option<Response> {
        let query_lower = query.to_lowercase();
        let show_all = SHOW_ALL_TRIGGERS.iter().any(|t| query_lower.contains(t));

        // A "show all" follow-up resolves the caller-held options directly.
        if show_all && !prior_options.is_empty() {
            log::debug!("direct route: show-all over {} stored options", prior_options.len());
            return Some(Response::Navigate {
                locations: prior_options.to_vec(),
                summary: Some(format!("Showing all {} options", prior_options.len())),
            });
        }

        // Structurally unambiguous disambiguation: several same-confidence
        // singular matches, and no competing source reading.
        let group = set.disambiguation_group();
        if group.len() >= 2 && !show_all && !self.contradicted(set, &group) {
            log::debug!("direct route: disambiguate over {} tied matches", group.len());
            return Some(Response::Disambiguate {
                options: group.iter().map(|c| option_of(c)).collect(),
                query: query.to_string(),
            });
        }

        // Plural suffix without prior context means show-all semantics.
        let plural: Vec<&Candidate> = set
            .locations
            .iter()
            .filter(|c| c.suffix == Some(SuffixType::Plural))
            .collect();
        if !plural.is_empty() && prior_options.is_empty() && !self.contradicted(set, &plural) {
            log::debug!("direct route: navigate to {} plural matches", plural.len());
            return Some(Response::Navigate {
                locations: plural.iter().map(|c| option_of(c)).collect(),
                summary: Some(format!("Showing {} locations", plural.len())),
            });
        }

        None
    }

    /// A competing source candidate, or a data-request intent, at or above
    /// the group's confidence means the model must decide between
    /// categories.
    fn contradicted(&self, set: &CandidateSet, group: &[&Candidate]) -> bool {
        let group_confidence = group
            .iter()
            .map(|c| c.confidence)
            .fold(f64::NEG_INFINITY, f64::max);
        let source_competes = set
            .sources
            .iter()
            .any(|s| s.confidence >= group_confidence);
        let data_intent_dominates = set
            .intents
            .iter()
            .any(|i| i.value == "data_request" && i.confidence >= group_confidence);
        source_competes || data_intent_dominates
    }
}

fn option_of(candidate: &Candidate) -> LocationRef {
    LocationRef {
        location_code: candidate
            .location_codes
            .first()
            .cloned()
            .unwrap_or_default(),
        label: candidate.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geolens_protocol::CandidateKind;

    fn location(value: &str, code: &str, confidence: f64) -> Candidate {
        Candidate::new(CandidateKind::Location, value, confidence)
            .codes(vec![code.to_string()])
            .suffix(SuffixType::Singular)
    }

    fn tied_set() -> CandidateSet {
        let mut a = location("Washington County", "US-01-WA", 0.5);
        let mut b = location("Washington County", "US-02-WA", 0.5);
        a.needs_disambiguation = true;
        b.needs_disambiguation = true;
        CandidateSet {
            intents: vec![],
            locations: vec![a, b],
            sources: vec![],
            regions: vec![],
            topics: vec![],
            time: None,
        }
    }

    #[test]
    fn tied_singular_matches_disambiguate_directly() {
        let router = Router::new();
        let response = router
            .route_direct(&tied_set(), "show me washington county", &[])
            .unwrap();
        match response {
            Response::Disambiguate { options, query } => {
                assert_eq!(options.len(), 2);
                assert_eq!(query, "show me washington county");
            }
            other => panic!("expected disambiguate, got {other:?}"),
        }
    }

    #[test]
    fn competing_source_defers_to_the_model() {
        let mut set = tied_set();
        set.sources.push(
            Candidate::new(CandidateKind::Source, "census", 0.9).matched("washington census"),
        );
        let router = Router::new();
        assert!(router
            .route_direct(&set, "washington county census", &[])
            .is_none());
    }

    #[test]
    fn show_all_resolves_stored_options() {
        let stored = vec![
            LocationRef::new("US-01-WA", "Washington County, AL"),
            LocationRef::new("US-02-WA", "Washington County, AR"),
        ];
        let router = Router::new();
        let response = router
            .route_direct(&CandidateSet::default(), "show them all", &stored)
            .unwrap();
        match response {
            Response::Navigate { locations, .. } => assert_eq!(locations, stored),
            other => panic!("expected navigate, got {other:?}"),
        }
    }

    #[test]
    fn plural_suffix_navigates_without_prior_context() {
        let mut set = tied_set();
        for candidate in &mut set.locations {
            candidate.suffix = Some(SuffixType::Plural);
            candidate.needs_disambiguation = false;
        }
        let router = Router::new();
        let response = router
            .route_direct(&set, "show me washington counties", &[])
            .unwrap();
        assert!(matches!(response, Response::Navigate { .. }));
    }

    #[test]
    fn no_structural_route_means_model_consultation() {
        let set = CandidateSet {
            locations: vec![location("Germany", "DE", 1.0)],
            ..CandidateSet::default()
        };
        let router = Router::new();
        assert!(router.route_direct(&set, "germany gdp", &[]).is_none());
    }
}
