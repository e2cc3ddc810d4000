use crate::types::ReferenceDoc;

/// A reference document scored against a query, 0..1.
#[derive(Debug, Clone)]
pub struct ScoredSnippet<'a> {
    pub doc: &'a ReferenceDoc,
    pub score: f64,
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Keyword-overlap scoring: fraction of a document's keywords present in
/// the query, with a half-weight credit for title words. Documents with no
/// overlap are dropped; results are sorted descending and truncated.
pub fn score_references<'a>(
    docs: &'a [ReferenceDoc],
    query: &str,
    limit: usize,
) -> Vec<ScoredSnippet<'a>> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredSnippet<'a>> = docs
        .iter()
        .filter_map(|doc| {
            let keyword_hits = doc
                .keywords
                .iter()
                .filter(|k| terms.contains(&k.to_ascii_lowercase()))
                .count();
            let title_hits = query_terms(&doc.title)
                .iter()
                .filter(|t| terms.contains(*t))
                .count();

            if keyword_hits == 0 && title_hits == 0 {
                return None;
            }

            let keyword_score = if doc.keywords.is_empty() {
                0.0
            } else {
                keyword_hits as f64 / doc.keywords.len() as f64
            };
            let score = (keyword_score + 0.5 * title_hits.min(2) as f64).min(1.0);
            Some(ScoredSnippet { doc, score })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.doc.id.cmp(&b.doc.id))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, keywords: &[&str]) -> ReferenceDoc {
        ReferenceDoc {
            id: id.to_string(),
            title: title.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            text: String::new(),
        }
    }

    #[test]
    fn scores_by_keyword_overlap() {
        let docs = vec![
            doc("capitals", "World capitals", &["capital", "city"]),
            doc("quakes", "Earthquake basics", &["earthquake", "magnitude"]),
        ];

        let hits = score_references(&docs, "what is the capital of France", 5);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc.id, "capitals");
        assert!(hits[0].score > 0.0 && hits[0].score <= 1.0);
    }

    #[test]
    fn no_overlap_yields_nothing() {
        let docs = vec![doc("quakes", "Earthquake basics", &["earthquake"])];
        assert!(score_references(&docs, "rainfall in spain", 5).is_empty());
    }

    #[test]
    fn respects_limit_and_ordering() {
        let docs = vec![
            doc("a", "Flood history", &["flood"]),
            doc("b", "Flood and storm damage", &["flood", "storm", "damage"]),
        ];
        let hits = score_references(&docs, "flood damage", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc.id, "b");
    }
}
