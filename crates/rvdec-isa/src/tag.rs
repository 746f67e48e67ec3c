//! Tags, patterns, and match sets for inclusion/exclusion filtering.

use regex::Regex;
use rustc_hash::FxHashSet;

/// A compiled regular-expression pattern, matched against whole tags.
#[derive(Clone, Debug)]
pub struct Pattern {
    rex: Regex,
    is_empty: bool,
}

impl Pattern {
    pub fn new(p: &str) -> Result<Self, regex::Error> {
        // Anchor so a pattern matches a whole tag, not a substring.
        let rex = Regex::new(&format!("^(?:{p})$"))?;
        Ok(Self {
            rex,
            is_empty: p.is_empty(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    pub fn matches(&self, s: &str) -> bool {
        self.rex.is_match(s)
    }
}

/// A plain instruction tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag(String);

impl Tag {
    pub fn new(t: &str) -> Self {
        Self(t.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A set of tags or patterns built from a string list.
#[derive(Clone, Debug)]
pub struct MatchSet<T> {
    items: Vec<T>,
    names: FxHashSet<String>,
}

impl<T> Default for MatchSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            names: FxHashSet::default(),
        }
    }
}

impl<T> MatchSet<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_member(&self, s: &str) -> bool {
        self.names.contains(s)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl MatchSet<Tag> {
    pub fn tags(strings: &[String]) -> Self {
        Self {
            items: strings.iter().map(|s| Tag::new(s)).collect(),
            names: strings.iter().cloned().collect(),
        }
    }
}

impl MatchSet<Pattern> {
    pub fn patterns(strings: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            items: strings
                .iter()
                .map(|s| Pattern::new(s))
                .collect::<Result<_, _>>()?,
            names: strings.iter().cloned().collect(),
        })
    }

    /// True when any pattern matches any tag in `tags`.
    pub fn match_any_any(&self, tags: &MatchSet<Tag>) -> bool {
        self.items
            .iter()
            .any(|p| tags.items().iter().any(|t| p.matches(t.as_str())))
    }
}

impl PartialEq for MatchSet<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_member() {
        let tags = MatchSet::tags(&strs(&["a", "g"]));
        assert!(tags.is_member("a"));
        assert!(!tags.is_member("pf"));
    }

    #[test]
    fn test_match_any_any() {
        let tags = MatchSet::tags(&strs(&["a", "g"]));
        let incl = MatchSet::patterns(&strs(&["g"])).unwrap();
        assert!(incl.match_any_any(&tags));
        let excl = MatchSet::patterns(&strs(&["pf"])).unwrap();
        assert!(!excl.match_any_any(&tags));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let pats = MatchSet::patterns(&strs(&["p"])).unwrap();
        let tags = MatchSet::tags(&strs(&["pf"]));
        assert!(!pats.match_any_any(&tags));
    }

    #[test]
    fn test_pattern_wildcards() {
        let pats = MatchSet::patterns(&strs(&["z.*"])).unwrap();
        let tags = MatchSet::tags(&strs(&["zba"]));
        assert!(pats.match_any_any(&tags));
    }
}
