const ELLIPSIS: &str = "...";

/// Truncates `s` so the result, ellipsis included, is at most `max_chars`
/// characters long.
#[must_use]
pub fn truncate_to_limit(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= ELLIPSIS.len() {
        return s.chars().take(max_chars).collect();
    }
    let keep = max_chars - ELLIPSIS.len();
    let truncated: String = s.chars().take(keep).collect();
    format!("{}{ELLIPSIS}", truncated.trim_end())
}
