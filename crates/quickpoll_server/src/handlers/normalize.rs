//! Shared normalization helpers for text request fields.

/// Trim surrounding whitespace from a name-like field.
pub(super) fn normalize_field(value: String) -> String {
    let trimmed = value.trim();
    if trimmed.len() == value.len() {
        value
    } else {
        trimmed.to_string()
    }
}

/// Split a textarea of responses into one response per non-blank line.
///
/// Order is preserved; duplicates are kept so validation can reject them.
pub(super) fn split_responses(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
