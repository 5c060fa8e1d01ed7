//! Keyword extraction
//!
//! The same normalizer feeds both keyword extraction at index time and query
//! tokenization at search time, so a query term matches the stored terms.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Tokens shorter than this (after stemming) are dropped
const MIN_TOKEN_CHARS: usize = 3;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
        "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
        "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Crude suffix stripping: `-ing`, then a trailing `s` not preceded by `s`,
/// then `-ed`
fn stem(word: &str) -> &str {
    if let Some(stripped) = word.strip_suffix("ing") {
        stripped
    } else if word.ends_with('s') && !word.ends_with("ss") {
        &word[..word.len() - 1]
    } else if let Some(stripped) = word.strip_suffix("ed") {
        stripped
    } else {
        word
    }
}

/// Normalizes text into index terms, in order of appearance
///
/// Lower-cases, strips punctuation, removes stop words, stems, and drops
/// tokens shorter than three characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(stem)
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Returns the `limit` most frequent terms of `text`
///
/// Ties are broken by first occurrence.
///
/// # Example
///
/// ```
/// use frontier_mesh::indexer::extract_keywords;
///
/// let keywords = extract_keywords("Books and more books. Cheap books, cheap travel.", 2);
/// assert_eq!(keywords, vec!["book", "cheap"]);
/// ```
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for (position, token) in tokenize(text).into_iter().enumerate() {
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(token, _, _)| token)
        .collect()
}
