use crate::tree::Value;
use once_cell::sync::Lazy;
use regex::Regex;

static INDEX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+)\]").unwrap());

/// Parse a key path into its segments.
///
/// Accepts a string (`a.b[2].c`) or a sequence of such strings, nested to
/// any depth; the segments of each element are concatenated in order.
/// Returns `None` for any other input and for input that yields no
/// segments at all (the empty string names no path).
pub fn parse_path(input: &Value) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    collect_segments(input, &mut segments)?;
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Parse a single string key path. See [`parse_path`].
pub fn parse_key(input: &str) -> Option<Vec<String>> {
    let segments = split_key(input);
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

fn collect_segments(input: &Value, out: &mut Vec<String>) -> Option<()> {
    match input {
        Value::String(s) => {
            out.extend(split_key(s));
            Some(())
        }
        Value::Sequence(items) => {
            for item in items {
                collect_segments(item, out)?;
            }
            Some(())
        }
        _ => None,
    }
}

fn split_key(input: &str) -> Vec<String> {
    if input.is_empty() {
        return Vec::new();
    }
    let normalized = INDEX_RE.replace_all(input, |caps: &regex::Captures| {
        format!(".{}", normalize_index(&caps[1]))
    });
    let trimmed = normalized.strip_prefix('.').unwrap_or(&normalized[..]);
    trimmed.split('.').map(str::to_string).collect()
}

/// `007` -> `7`, `0` -> `0`.
fn normalize_index(digits: &str) -> &str {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0"
    } else {
        stripped
    }
}

/// True if a segment addresses a sequence slot.
pub fn is_index_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}
