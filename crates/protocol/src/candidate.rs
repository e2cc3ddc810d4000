use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::order::TimeSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Intent,
    Location,
    Source,
}

/// Grammatical number of the query term that matched a location name.
/// Plural drives show-all semantics, singular with ties drives disambiguation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuffixType {
    Singular,
    Plural,
}

/// One scored interpretation of part of the query. Candidates are never
/// discarded once emitted, only re-ranked.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub value: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
    /// The query substring the detector matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Location codes this candidate resolves to (location kind only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<SuffixType>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_disambiguation: bool,
}

impl Candidate {
    pub fn new(kind: CandidateKind, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            value: value.into(),
            confidence,
            evidence: Vec::new(),
            matched_text: None,
            location_codes: Vec::new(),
            suffix: None,
            needs_disambiguation: false,
        }
    }

    #[must_use]
    pub fn evidence(mut self, tag: impl Into<String>) -> Self {
        self.evidence.push(tag.into());
        self
    }

    #[must_use]
    pub fn matched(mut self, text: impl Into<String>) -> Self {
        self.matched_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn codes(mut self, codes: Vec<String>) -> Self {
        self.location_codes = codes;
        self
    }

    #[must_use]
    pub fn suffix(mut self, suffix: SuffixType) -> Self {
        self.suffix = Some(suffix);
        self
    }
}

/// A region name together with its expanded member location codes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegionExpansion {
    pub name: String,
    pub codes: Vec<String>,
}

/// Everything the generator extracted from one query: scored candidates per
/// kind plus the unambiguous flat extractions (regions, topics, time).
/// Immutable once produced; lives for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CandidateSet {
    pub intents: Vec<Candidate>,
    pub locations: Vec<Candidate>,
    pub sources: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<RegionExpansion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeSpec>,
}

impl CandidateSet {
    pub fn top_source(&self) -> Option<&Candidate> {
        self.sources.first()
    }

    pub fn top_location(&self) -> Option<&Candidate> {
        self.locations.first()
    }

    pub fn top_intent(&self) -> Option<&Candidate> {
        self.intents.first()
    }

    /// Location candidates tied at the top score and flagged for
    /// disambiguation by the suffix pass.
    pub fn disambiguation_group(&self) -> Vec<&Candidate> {
        self.locations
            .iter()
            .filter(|c| c.needs_disambiguation)
            .collect()
    }
}
