//! Small text utilities shared by the detectors. All matching is
//! case-insensitive over a lowercased copy of the query.

/// Lowercased tokens of the query, punctuation stripped.
pub(crate) fn tokens(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Whether `needle` appears in `haystack` on word boundaries. Both sides
/// are expected lowercased.
pub(crate) fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack.as_bytes()[abs - 1].is_ascii_alphanumeric();
        let end = abs + needle.len();
        let after_ok =
            end == haystack.len() || !haystack.as_bytes()[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

/// Singular form of a pluralized token: "counties" -> "county",
/// "regions" -> "region". Returns None when the token is not plural.
pub(crate) fn singularize(token: &str) -> Option<String> {
    if let Some(stem) = token.strip_suffix("ies") {
        if !stem.is_empty() {
            return Some(format!("{stem}y"));
        }
    }
    if let Some(stem) = token.strip_suffix('s') {
        // "ss" endings ("congress") are not plurals.
        if !stem.is_empty() && !stem.ends_with('s') {
            return Some(stem.to_string());
        }
    }
    None
}

/// The query with every plural token replaced by its singular form, so
/// names can be matched under either number. Trailing punctuation on a
/// token is preserved.
pub(crate) fn singularized_query(query_lower: &str) -> String {
    query_lower
        .split(' ')
        .map(|token| {
            let word = token.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
            let punct = &token[word.len()..];
            match singularize(word) {
                Some(singular) => format!("{singular}{punct}"),
                None => token.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
