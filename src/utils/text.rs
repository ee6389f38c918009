/// Largest char boundary at or before `max_bytes`.
#[inline]
fn safe_byte_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    s.char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= max_bytes)
        .last()
        .unwrap_or(0)
}

/// Truncate to `max_len` bytes (UTF-8 safe), appending a marker when cut.
pub fn truncate_with_marker(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let boundary = safe_byte_boundary(s, max_len);
        format!("{}...[truncated]", &s[..boundary])
    }
}

/// Truncate at a word boundary with "..." suffix (UTF-8 safe).
pub fn truncate_at_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let truncate_at = safe_byte_boundary(s, max_len.saturating_sub(3));
    let boundary = s[..truncate_at]
        .rfind(|c: char| c.is_whitespace() || c == '.' || c == ',')
        .unwrap_or(truncate_at);
    format!("{}...", &s[..boundary])
}

/// Case-insensitive substring search. Phrases are ASCII in practice, but lowering both
/// sides keeps non-ASCII input correct too.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    !phrase.is_empty() && haystack.to_lowercase().contains(&phrase.to_lowercase())
}

/// Split prose into trimmed sentences on `.`, `!`, `?` and line breaks.
/// Periods inside tokens such as `analysis.py` or `1.5` do not split.
pub fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            push_sentence(&mut out, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_none_or(|n| n.is_whitespace()) {
            push_sentence(&mut out, &mut current);
        }
    }
    push_sentence(&mut out, &mut current);
    out
}

fn push_sentence(out: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim().trim_start_matches(['-', '*', '>', ' ']).trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Sentences of `text` containing any of `phrases`, case-insensitively.
pub fn sentences_matching(text: &str, phrases: &[String]) -> Vec<String> {
    sentences(text)
        .into_iter()
        .filter(|s| phrases.iter().any(|p| contains_phrase(s, p)))
        .collect()
}
