//! URL path patterns used in policy entries.
//!
//! Patterns are matched segment by segment against the request path:
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `orders` | the literal segment `orders` |
//! | `*` | exactly one segment; as the last segment, one or more |
//! | `**` | zero or more segments |
//!
//! Empty segments are ignored on both sides, so `/orders/` and `/orders`
//! are the same path.

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Any,
    Recursive,
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|s| match s {
                "*" => Segment::Any,
                "**" => Segment::Recursive,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        Self { segments }
    }

    /// True if `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let path: Vec<&str> = split(path).collect();
        match_segments(&self.segments, &path)
    }
}

/// Match `path` against a single pattern string.
pub fn matches_pattern(path: &str, pattern: &str) -> bool {
    PathPattern::new(pattern).matches(path)
}

fn split(s: &str) -> impl Iterator<Item = &str> {
    s.split('/').filter(|seg| !seg.is_empty())
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Recursive, rest)) => (0..=path.len())
            .filter_map(|skip| path.get(skip..))
            .any(|tail| match_segments(rest, tail)),
        Some((Segment::Any, [])) => !path.is_empty(),
        Some((Segment::Any, rest)) => path
            .split_first()
            .is_some_and(|(_, tail)| match_segments(rest, tail)),
        Some((Segment::Literal(literal), rest)) => path
            .split_first()
            .is_some_and(|(head, tail)| *head == literal.as_str() && match_segments(rest, tail)),
    }
}
