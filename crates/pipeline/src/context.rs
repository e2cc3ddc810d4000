//! The bounded prompt payload handed to the model: a textual candidate
//! summary plus the top-scoring reference snippets, trimmed to a budget.

use geolens_catalog::Catalog;
use geolens_protocol::CandidateSet;

#[derive(Debug, Clone)]
pub struct ReferenceSnippet {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ModelContext {
    pub candidate_summary: String,
    pub reference_snippets: Vec<ReferenceSnippet>,
    /// The structured set, for model clients that consume typed input.
    pub candidates: CandidateSet,
}

impl ModelContext {
    pub fn used_chars(&self) -> usize {
        self.candidate_summary.chars().count()
            + self
                .reference_snippets
                .iter()
                .map(|s| s.title.chars().count() + s.text.chars().count())
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    pub max_chars: usize,
    pub snippet_limit: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            max_chars: 8_000,
            snippet_limit: 3,
        }
    }
}

impl ContextBuilder {
    /// Assemble the payload, shedding weight until it fits: lowest-scored
    /// snippets go first, the candidate summary truncates last.
    pub fn build(&self, query: &str, set: &CandidateSet, catalog: &Catalog) -> ModelContext {
        let snippets: Vec<ReferenceSnippet> = catalog
            .reference_snippets(query, self.snippet_limit)
            .into_iter()
            .map(|scored| ReferenceSnippet {
                title: scored.doc.title.clone(),
                text: scored.doc.text.clone(),
            })
            .collect();

        let mut context = ModelContext {
            candidate_summary: render_summary(set),
            reference_snippets: snippets,
            candidates: set.clone(),
        };

        while context.used_chars() > self.max_chars && context.reference_snippets.pop().is_some() {}
        if context.used_chars() > self.max_chars {
            context.candidate_summary = truncate_chars(&context.candidate_summary, self.max_chars);
            log::debug!("candidate summary truncated to {} chars", self.max_chars);
        }
        context
    }
}

fn render_summary(set: &CandidateSet) -> String {
    let mut lines = Vec::new();
    for candidate in set.sources.iter().chain(&set.locations).chain(&set.intents) {
        lines.push(format!(
            "{:?} {} {:.2} [{}]",
            candidate.kind,
            candidate.value,
            candidate.confidence,
            candidate.evidence.join(",")
        ));
    }
    for region in &set.regions {
        lines.push(format!("region {} -> {}", region.name, region.codes.join(",")));
    }
    if !set.topics.is_empty() {
        lines.push(format!("topics: {}", set.topics.join(",")));
    }
    if let Some(time) = &set.time {
        lines.push(format!("time: {}", time.key()));
    }
    lines.join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
