//! Text helpers shared by submissions and checkpoints

/// Count whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Parse a comma-separated tag string into its tag set
///
/// Tags are trimmed and empty tags dropped; order of first appearance is kept.
pub fn parse_tags(tags: &str) -> Vec<String> {
    let mut parsed: Vec<String> = Vec::new();
    for tag in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !parsed.iter().any(|t| t == tag) {
            parsed.push(tag.to_string());
        }
    }
    parsed
}

/// Trim an optional string, mapping blank to `None`
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trim every item of a list and drop blank items
pub fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
