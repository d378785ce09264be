//! Pure, stateless MQTT topic/ACL-pattern matching. No I/O, no shared state —
//! safe to call from any thread without coordination.

/// Matches a concrete topic against a single ACL pattern.
///
/// Patterns are `/`-delimited segments. `+` matches exactly one non-empty
/// topic segment; `#` matches one or more remaining segments and is only
/// legal as the final pattern segment. A pattern without `#` requires an
/// equal segment count.
pub fn matches(topic: &str, pattern: &str) -> bool {
    let mut topic_segments = topic.split('/');
    let mut pattern_segments = pattern.split('/').peekable();

    loop {
        match pattern_segments.next() {
            Some("#") if pattern_segments.peek().is_none() => {
                // `#` must be the last pattern segment and must consume at
                // least one remaining topic segment.
                return topic_segments.next().is_some();
            }
            Some("+") => match topic_segments.next() {
                Some(seg) if !seg.is_empty() => continue,
                _ => return false,
            },
            Some(literal) => match topic_segments.next() {
                Some(seg) if seg == literal => continue,
                _ => return false,
            },
            None => return topic_segments.next().is_none(),
        }
    }
}

/// `allow(topic, patterns)`: true iff `patterns` is empty (allow-all) or any
/// pattern in the set matches. Order does not affect the result.
pub fn allow(topic: &str, patterns: &[String]) -> bool {
    patterns.is_empty() || patterns.iter().any(|pattern| matches(topic, pattern))
}

/// Whether a topic falls under the reserved admin tree, i.e. its first
/// segment equals the configured admin prefix's leading segment.
pub fn is_admin_topic(topic: &str, admin_prefix: &str) -> bool {
    let admin_segment = admin_prefix.trim_end_matches('/');
    topic
        .split('/')
        .next()
        .map(|first| first == admin_segment)
        .unwrap_or(false)
}
