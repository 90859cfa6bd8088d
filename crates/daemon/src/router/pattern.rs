// SPDX-License-Identifier: MIT

//! Segment pattern matching for subscriptions and handler registration
//!: `*` matches exactly one
//! segment, `**` matches one or more. Event names are colon-delimited
//! (`"agent:spawn"`, `"state:entity:create"`), so `:` is the separator
//! this matches structurally.

/// A compiled subscription pattern: either an exact event name or a
/// sequence of segments that may contain `*`/`**` wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    /// `*` — exactly one segment.
    Single,
    /// `**` — one or more segments.
    Multi,
}

impl Pattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw
            .split(':')
            .map(|s| match s {
                "*" => Segment::Single,
                "**" => Segment::Multi,
                other => Segment::Literal(other.to_string()),
            })
            .collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_wildcard(&self) -> bool {
        self.segments.iter().any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Structural match only. `*` consumes exactly one dotted segment; `**` consumes
    /// one or more.
    pub fn matches(&self, name: &str) -> bool {
        let name_segs: Vec<&str> = name.split(':').collect();
        matches_from(&self.segments, &name_segs)
    }
}

fn matches_from(pattern: &[Segment], name: &[&str]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some((Segment::Literal(lit), rest)) => match name.split_first() {
            Some((head, tail)) if head == lit => matches_from(rest, tail),
            _ => false,
        },
        Some((Segment::Single, rest)) => match name.split_first() {
            Some((_, tail)) => matches_from(rest, tail),
            None => false,
        },
        Some((Segment::Multi, rest)) => {
            if name.is_empty() {
                return false;
            }
            // `**` is greedy from one segment up to the whole remaining tail;
            // try every split point so trailing literal segments after `**`
            // still anchor correctly.
            (1..=name.len()).any(|take| matches_from(rest, &name[take..]))
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
