//! Hashtag extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Regex pattern for matching #hashtags
static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([a-zA-Z0-9_]+)").expect("Invalid hashtag regex"));

/// Extract hashtags from post content.
///
/// Tags are normalized to lowercase and deduplicated while preserving first
/// occurrence order.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    HASHTAG_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// Normalize a tag supplied by a caller (search or hashtag-feed input).
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_and_lowercases() {
        let tags = extract_hashtags("Shipping #Rust and #redis today! #rust");
        assert_eq!(tags, vec!["rust", "redis"]);
    }

    #[test]
    fn no_tags_is_empty() {
        assert!(extract_hashtags("plain text").is_empty());
    }

    #[test]
    fn underscores_and_digits_allowed() {
        assert_eq!(extract_hashtags("#feed_v2"), vec!["feed_v2"]);
    }

    #[test]
    fn normalize_strips_hash_and_case() {
        assert_eq!(normalize_tag("#Rust "), "rust");
        assert_eq!(normalize_tag("redis"), "redis");
    }
}
