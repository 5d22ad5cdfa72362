//! AMQP topic routing-pattern matching.

/// Returns `true` if `routing_key` matches the topic `pattern`.
///
/// Both are `.`-separated words. In the pattern `*` matches exactly one word
/// and `#` matches zero or more words.
#[must_use]
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern.split_first(), key.split_first()) {
        (None, None) => true,
        (Some((&"#", rest)), _) => {
            matches_words(rest, key) || (!key.is_empty() && matches_words(pattern, &key[1..]))
        }
        (Some((&"*", rest)), Some((_, key_rest))) => matches_words(rest, key_rest),
        (Some((word, rest)), Some((k, key_rest))) if word == k => matches_words(rest, key_rest),
        _ => false,
    }
}
