//! Text similarity heuristics shared by the scorers.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Minimum length (exclusive) of a token kept by [`content_tokens`].
pub const MIN_TOKEN_LEN: usize = 3;

/// Render a value as plain text: strings unquoted, everything else as JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Lowercased words longer than [`MIN_TOKEN_LEN`] characters.
pub fn content_tokens(text: &str) -> HashSet<String> {
    words(text)
        .filter(|w| w.chars().count() > MIN_TOKEN_LEN)
        .collect()
}

fn bigrams(text: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut counts = HashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Sørensen-Dice coefficient over character bigrams.
pub fn bigram_dice(a: &str, b: &str) -> f64 {
    let left = bigrams(a);
    let right = bigrams(b);
    let total: usize = left.values().sum::<usize>() + right.values().sum::<usize>();
    if total == 0 {
        return 0.0;
    }
    let shared: usize = left
        .iter()
        .map(|(pair, n)| (*n).min(right.get(pair).copied().unwrap_or(0)))
        .sum();
    (2 * shared) as f64 / total as f64
}

/// Jaccard index over lowercased words.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = words(a).collect();
    let right: HashSet<String> = words(b).collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

/// Case-insensitive similarity in `[0, 1]`: the better of bigram overlap
/// and word overlap.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return 1.0;
    }
    bigram_dice(&a, &b).max(token_jaccard(&a, &b))
}

/// Fraction of `of` also present in `within`; `None` when `of` is empty.
pub fn overlap_ratio(of: &HashSet<String>, within: &HashSet<String>) -> Option<f64> {
    if of.is_empty() {
        return None;
    }
    Some(of.intersection(within).count() as f64 / of.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_and_disjoint() {
        assert_eq!(text_similarity("Hello World", "hello world "), 1.0);
        assert_eq!(text_similarity("2", "3"), 0.0);
        assert_eq!(text_similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let score = text_similarity("night", "nacht");
        assert!((score - 0.25).abs() < 1e-9);
        let score = text_similarity("the quick fox", "the slow fox");
        assert!(score > 0.4 && score < 1.0);
    }

    #[test]
    fn test_content_tokens_drop_short_words() {
        let tokens = content_tokens("The capital of France is Paris!");
        assert!(tokens.contains("capital"));
        assert!(tokens.contains("paris"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("is"));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("plain")), "plain");
        assert_eq!(value_text(&json!({"a": 1})), "{\"a\":1}");
        assert_eq!(value_text(&Value::Null), "");
    }
}
