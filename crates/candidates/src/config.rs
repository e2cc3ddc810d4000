use serde::{Deserialize, Serialize};

/// All confidence constants used by the detectors. The defaults are a
/// starting point, not a tuned model; deployments can load their own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Full source name present in the query.
    pub source_exact: f64,
    /// Source identifier present as a word.
    pub source_identifier: f64,
    /// Source-name substring longer than 8 chars.
    pub source_substring_long: f64,
    /// Source-name substring of 4..=8 chars.
    pub source_substring_short: f64,
    /// Generic data-seeking words alongside a source match.
    pub data_word_boost: f64,

    pub country_exact: f64,
    pub capital_exact: f64,
    pub admin1_exact: f64,
    /// Admin-2 names are matched only when the current viewport contains
    /// the entry.
    pub admin2_viewport: f64,
    pub partial_word: f64,
    /// Subtracted from a location candidate whose matched text is contained
    /// in a higher-or-equal source candidate's matched text.
    pub source_overlap_penalty: f64,

    pub navigation_boost: f64,
    pub data_request_boost: f64,
    pub metric_word_boost: f64,
    pub reference_lookup_boost: f64,

    /// Candidates below this confidence are not reported.
    pub floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            source_exact: 1.0,
            source_identifier: 0.9,
            source_substring_long: 0.7,
            source_substring_short: 0.5,
            data_word_boost: 0.1,

            country_exact: 1.0,
            capital_exact: 0.9,
            admin1_exact: 0.8,
            admin2_viewport: 0.5,
            partial_word: 0.3,
            source_overlap_penalty: 0.5,

            navigation_boost: 0.5,
            data_request_boost: 0.3,
            metric_word_boost: 0.4,
            reference_lookup_boost: 0.3,

            floor: 0.25,
        }
    }
}

/// Clamp a raw score into the candidate confidence range.
pub(crate) fn clamp_confidence(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}
