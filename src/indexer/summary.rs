/// Marker appended to a shortened summary
const ELLIPSIS: &str = "...";

/// Builds a short summary of document text
///
/// Whitespace is collapsed first. Text within `max_chars` is returned as is.
/// Longer text is cut after the first sentence end (`.`, `!` or `?`) found
/// within `lookahead` characters past `max_chars`, or hard-cut at `max_chars`
/// if there is none, and `...` is appended. Lengths count characters.
pub fn summarize(text: &str, max_chars: usize, lookahead: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();

    if chars.len() <= max_chars {
        return collapsed;
    }

    let window_end = chars.len().min(max_chars.saturating_add(lookahead));
    let cut = chars[max_chars..window_end]
        .iter()
        .position(|c| matches!(c, '.' | '!' | '?'))
        .map_or(max_chars, |offset| max_chars + offset + 1);

    let mut summary: String = chars[..cut].iter().collect();
    summary.push_str(ELLIPSIS);
    summary
}
