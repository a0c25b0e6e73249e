// SPDX-License-Identifier: MIT OR Apache-2.0

//! Path-pattern and value search over the index.
//!
//! A pattern is a `.`-separated list of segments matched against the keys of
//! an indexed path:
//!
//! - a leading `.` anchors the pattern at the document root; without it the
//!   pattern may match any trailing run of keys;
//! - `*`, `?` and `[..]` inside a segment are glob wildcards within one key;
//! - a segment that is exactly `**` matches zero or more keys;
//! - in fuzzy mode the final segment only has to occur somewhere inside the
//!   final key.
//!
//! Matching is case-sensitive and sequence positions match by their decimal
//! text.

use crate::domain::config_path::ConfigPath;
use crate::domain::config_value::{text_of, ConfigValue};
use crate::domain::errors::{ConfigError, Result};
use crate::domain::index::{IndexEntry, PathIndex};
use globset::{Glob, GlobMatcher};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone)]
enum Segment {
    AnyDepth,
    Key(GlobMatcher),
}

/// A compiled path pattern.
///
/// # Examples
///
/// ```
/// use flange::domain::config_path::ConfigPath;
/// use flange::domain::search::PathPattern;
///
/// let exact = PathPattern::new("a3b", true).unwrap();
/// assert!(exact.matches(&ConfigPath::from(["a", "a2", "a3b"])));
///
/// let fuzzy = PathPattern::new("3b", false).unwrap();
/// assert!(fuzzy.matches(&ConfigPath::from(["a", "a2", "a3b"])));
///
/// let anchored = PathPattern::new(".a2", true).unwrap();
/// assert!(!anchored.matches(&ConfigPath::from(["a", "a2"])));
/// ```
#[derive(Debug, Clone)]
pub struct PathPattern {
    text: String,
    exact: bool,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compiles `pattern`. An empty pattern matches every path.
    pub fn new(pattern: &str, exact: bool) -> Result<Self> {
        let (anchored, body) = match pattern.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };

        let mut segments = Vec::new();
        if !anchored || body.is_empty() {
            segments.push(Segment::AnyDepth);
        }
        if !body.is_empty() {
            let parts: Vec<&str> = body.split('.').collect();
            let last = parts.len() - 1;
            for (i, part) in parts.into_iter().enumerate() {
                if part == "**" {
                    segments.push(Segment::AnyDepth);
                    continue;
                }
                let glob = if i == last && !exact {
                    fuzzy_glob(part)
                } else {
                    part.to_string()
                };
                let matcher = Glob::new(&glob)
                    .map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        message: e.to_string(),
                    })?
                    .compile_matcher();
                segments.push(Segment::Key(matcher));
            }
        }

        Ok(Self {
            text: pattern.to_string(),
            exact,
            segments,
        })
    }

    /// Returns the source text of the pattern.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns `true` for exact matching of the final segment.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    /// Returns `true` if `path` satisfies the pattern.
    pub fn matches(&self, path: &ConfigPath) -> bool {
        let keys: Vec<Cow<'_, str>> = path.keys().iter().map(|k| k.text()).collect();
        match_segments(&self.segments, &keys)
    }

    /// Returns `true` if `value` satisfies at least one of `required`.
    ///
    /// An empty `required` list accepts every value. Exact mode compares for
    /// equality; fuzzy mode checks that the text form of the requirement
    /// occurs in the text form of the value.
    pub fn accepts_value(&self, value: &ConfigValue, required: &[ConfigValue]) -> bool {
        if required.is_empty() {
            return true;
        }
        if self.exact {
            required.iter().any(|r| r == value)
        } else {
            let text = text_of(value);
            required.iter().any(|r| text.contains(&text_of(r)))
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn fuzzy_glob(part: &str) -> String {
    let mut glob = String::with_capacity(part.len() + 2);
    if !part.starts_with('*') {
        glob.push('*');
    }
    glob.push_str(part);
    if !part.ends_with('*') {
        glob.push('*');
    }
    glob
}

fn match_segments(segments: &[Segment], keys: &[Cow<'_, str>]) -> bool {
    match segments.split_first() {
        None => keys.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=keys.len()).any(|skip| match_segments(rest, &keys[skip..]))
        }
        Some((Segment::Key(matcher), rest)) => match keys.split_first() {
            Some((key, tail)) => matcher.is_match(&**key) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Returns the indexed nodes matching `pattern` and `required` values, in
/// path order.
pub fn search<'a>(
    index: &'a PathIndex,
    pattern: &PathPattern,
    required: &[ConfigValue],
) -> Vec<(&'a ConfigPath, &'a IndexEntry)> {
    let found: Vec<_> = index
        .iter()
        .filter(|(path, entry)| {
            pattern.matches(path) && pattern.accepts_value(entry.value(), required)
        })
        .collect();
    tracing::trace!("Pattern '{}' matched {} paths", pattern, found.len());
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::SourceId;
    use serde_json::json;

    fn path(keys: &[&str]) -> ConfigPath {
        keys.iter().map(|k| (*k).into()).collect()
    }

    fn index_of(value: ConfigValue) -> PathIndex {
        let mut index = PathIndex::new();
        crate::domain::config_value::walk(&value, |p, v| {
            if !p.is_empty() {
                index.record(p.clone(), v, SourceId(0));
            }
        });
        index
    }

    fn found_paths(index: &PathIndex, pattern: &str, exact: bool) -> Vec<String> {
        let pattern = PathPattern::new(pattern, exact).unwrap();
        search(index, &pattern, &[])
            .into_iter()
            .map(|(p, _)| p.to_string())
            .collect()
    }

    #[test]
    fn test_exact_and_fuzzy_final_segment() {
        let index = index_of(json!({"a": {"a2": {"a3a": "v", "a3b": "v"}}}));
        assert_eq!(found_paths(&index, "a3b", true), vec!["a.a2.a3b"]);
        assert_eq!(found_paths(&index, "3b", false), vec!["a.a2.a3b"]);
        assert!(found_paths(&index, "3b", true).is_empty());
    }

    #[test]
    fn test_suffix_matching() {
        let index = index_of(json!({"db": {"host": "h"}, "cache": {"host": "c"}}));
        assert_eq!(found_paths(&index, "host", true), vec!["cache.host", "db.host"]);
        assert_eq!(found_paths(&index, "db.host", true), vec!["db.host"]);
    }

    #[test]
    fn test_anchored_pattern() {
        let index = index_of(json!({"host": 1, "db": {"host": 2}}));
        assert_eq!(found_paths(&index, ".host", true), vec!["host"]);
        assert_eq!(found_paths(&index, ".db.host", true), vec!["db.host"]);
    }

    #[test]
    fn test_single_segment_wildcard() {
        let index = index_of(json!({"svc": {"web": {"port": 80}, "api": {"port": 81}}}));
        assert_eq!(found_paths(&index, ".svc.*.port", true), vec!["svc.api.port", "svc.web.port"]);
        assert_eq!(found_paths(&index, "w*", true), vec!["svc.web"]);
        assert!(found_paths(&index, ".svc.port", true).is_empty());
    }

    #[test]
    fn test_any_depth_wildcard() {
        let index = index_of(json!({"a": {"b": {"c": {"port": 1}}, "port": 2}}));
        assert_eq!(found_paths(&index, ".a.**.port", true), vec!["a.b.c.port", "a.port"]);
    }

    #[test]
    fn test_sequence_indices_match_as_text() {
        let index = index_of(json!({"hosts": ["x", "y"]}));
        assert_eq!(found_paths(&index, "hosts.1", true), vec!["hosts.1"]);
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let index = index_of(json!({"a": {"b": 1}}));
        assert_eq!(found_paths(&index, "", true), vec!["a", "a.b"]);
    }

    #[test]
    fn test_case_sensitive() {
        let index = index_of(json!({"Host": 1}));
        assert!(found_paths(&index, "host", true).is_empty());
    }

    #[test]
    fn test_required_values() {
        let index = index_of(json!({"a": {"x": "localhost", "y": "remote"}, "n": 5432}));
        let exact = PathPattern::new("", true).unwrap();
        let hits = search(&index, &exact, &[json!("localhost")]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, &path(&["a", "x"]));

        let fuzzy = PathPattern::new("", false).unwrap();
        let hits = search(&index, &fuzzy, &[json!("local")]);
        assert!(hits.iter().any(|(p, _)| **p == path(&["a", "x"])));
        let hits = search(&index, &fuzzy, &[json!(543)]);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_fuzzy_with_leading_wildcard() {
        let pattern = PathPattern::new("*st", false).unwrap();
        assert!(pattern.matches(&path(&["db", "hostname"])));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PathPattern::new("a[", true).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
