use std::fmt;

/// Wildcard character accepted in topic patterns.
pub const WILDCARD: char = '*';

/// A compiled topic pattern.
///
/// `*` matches one or more arbitrary characters (shortest match first) and
/// everything else matches literally, `.` included. Matching is anchored at
/// the start of the topic. A pattern without `*` matches only the identical
/// topic; a pattern with `*` need not consume the whole topic, so `"a*b"`
/// also matches `"axbc"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPattern {
    raw: String,
    // Literal pieces between wildcards; always at least one element.
    segments: Vec<String>,
}

impl TopicPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let segments = raw.split(WILDCARD).map(str::to_owned).collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn matches(&self, topic: &str) -> bool {
        let Some((head, rest)) = self.segments.split_first() else {
            return false;
        };

        if rest.is_empty() {
            return topic == head;
        }

        let Some(mut tail) = topic.strip_prefix(head.as_str()) else {
            return false;
        };

        for literal in rest {
            // The wildcard takes at least one character before the next literal.
            let mut chars = tail.chars();
            if chars.next().is_none() {
                return false;
            }
            let after = chars.as_str();

            // Leftmost occurrence leaves the longest remainder for the
            // following segments, so it is never worse than a later one.
            match after.find(literal.as_str()) {
                Some(idx) => tail = &after[idx + literal.len()..],
                None => return false,
            }
        }

        true
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for TopicPattern {
    fn from(s: &str) -> Self {
        TopicPattern::new(s)
    }
}

impl From<String> for TopicPattern {
    fn from(s: String) -> Self {
        TopicPattern::new(s)
    }
}

/// One-off match without keeping the compiled pattern around.
pub fn matches(pattern: &str, topic: &str) -> bool {
    TopicPattern::new(pattern).matches(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_wildcard_is_anchored_at_start() {
        let p = TopicPattern::new("a.*");
        assert!(p.matches("a.b"));
        assert!(p.matches("a.bc"));
        assert!(p.matches("a.b.c"));
        assert!(!p.matches("x.a.b"));
    }

    #[test]
    fn wildcard_needs_at_least_one_character() {
        let p = TopicPattern::new("a.*");
        assert!(!p.matches("a."));
        assert!(!p.matches("a"));

        assert!(!matches("a*c", "ac"));
        assert!(matches("a*c", "abc"));
        assert!(matches("a**", "abc"));
        assert!(!matches("a**", "ab"));
    }

    #[test]
    fn literal_pattern_matches_only_identical_topic() {
        let p = TopicPattern::new("a.b");
        assert!(!p.has_wildcard());
        assert!(p.matches("a.b"));
        assert!(!p.matches("a.bc"));
        assert!(!p.matches("axb"));
        assert!(!p.matches("x.a.b"));
    }

    #[test]
    fn dot_is_literal() {
        assert!(!matches("a.*", "abc"));
        assert!(matches("a.*", "a.c"));
    }

    #[test]
    fn inner_wildcard_is_not_end_anchored() {
        assert!(matches("orders.*.created", "orders.eu.created"));
        assert!(matches("orders.*.created", "orders.eu.created.v2"));
        assert!(!matches("orders.*.created", "orders..created"));
        assert!(!matches("orders.*.created", "orders.eu.updated"));
    }

    #[test]
    fn leading_wildcard_matches_anything_non_empty() {
        assert!(matches("*", "x"));
        assert!(matches("*", "users.created"));
        assert!(!matches("*", ""));
        assert!(matches("*.created", "users.created"));
        assert!(!matches("*.created", ".created"));
    }

    #[test]
    fn multibyte_topics_are_handled_on_char_boundaries() {
        assert!(matches("т.*", "т.ё"));
        assert!(matches("*ё", "жё"));
        assert!(!matches("*ё", "ё"));
    }

    #[test]
    fn display_round_trips_the_raw_pattern() {
        let p = TopicPattern::from("orders.*");
        assert_eq!(p.to_string(), "orders.*");
        assert_eq!(p.as_str(), "orders.*");
        assert!(p.has_wildcard());
    }
}
