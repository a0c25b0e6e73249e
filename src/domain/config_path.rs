// SPDX-License-Identifier: MIT OR Apache-2.0

//! Paths into a configuration tree.
//!
//! A [`ConfigPath`] is the ordered sequence of keys leading from the document
//! root to a node. Mapping keys are strings and sequence positions are
//! non-negative integers, so each step is a [`PathKey`].

use std::fmt;

/// One step of a [`ConfigPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    /// A mapping key.
    Key(String),
    /// A position in a sequence.
    Index(usize),
}

impl PathKey {
    /// Returns the key text; indices are rendered in decimal.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            PathKey::Key(k) => std::borrow::Cow::Borrowed(k.as_str()),
            PathKey::Index(i) => std::borrow::Cow::Owned(i.to_string()),
        }
    }

    /// Returns the mapping key, if this step is one.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathKey::Key(k) => Some(k),
            PathKey::Index(_) => None,
        }
    }
}

impl From<&str> for PathKey {
    fn from(s: &str) -> Self {
        PathKey::Key(s.to_string())
    }
}

impl From<String> for PathKey {
    fn from(s: String) -> Self {
        PathKey::Key(s)
    }
}

impl From<usize> for PathKey {
    fn from(i: usize) -> Self {
        PathKey::Index(i)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Key(k) => write!(f, "{}", k),
            PathKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// A type-safe path from the document root to a node.
///
/// Two paths are equal iff they have the same keys in the same order.
///
/// # Examples
///
/// ```
/// use flange::domain::config_path::{ConfigPath, PathKey};
///
/// let path = ConfigPath::from(["database", "hosts"]).child(0usize);
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.last(), Some(&PathKey::Index(0)));
/// assert_eq!(path.to_string(), "database.hosts.0");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigPath(Vec<PathKey>);

impl ConfigPath {
    /// Creates the empty path, which addresses the document root.
    pub fn root() -> Self {
        ConfigPath(Vec::new())
    }

    /// Creates a path from its keys.
    pub fn new(keys: Vec<PathKey>) -> Self {
        ConfigPath(keys)
    }

    /// Returns a new path with `key` appended.
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        let mut keys = self.0.clone();
        keys.push(key.into());
        ConfigPath(keys)
    }

    /// Returns `other` appended to this path.
    pub fn join(&self, other: &ConfigPath) -> Self {
        self.0.iter().chain(other.0.iter()).cloned().collect()
    }

    /// Returns the path of the parent node, or `None` for the root.
    pub fn parent(&self) -> Option<ConfigPath> {
        if self.0.is_empty() {
            None
        } else {
            Some(ConfigPath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Returns the final key, which is the registration key of a model match.
    pub fn last(&self) -> Option<&PathKey> {
        self.0.last()
    }

    /// Returns the keys of this path.
    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &ConfigPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Returns the keys of this path.
    pub fn into_keys(self) -> Vec<PathKey> {
        self.0
    }
}

impl<K: Into<PathKey>, const N: usize> From<[K; N]> for ConfigPath {
    fn from(keys: [K; N]) -> Self {
        ConfigPath(keys.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<PathKey>> for ConfigPath {
    fn from(keys: Vec<PathKey>) -> Self {
        ConfigPath(keys)
    }
}

impl FromIterator<PathKey> for ConfigPath {
    fn from_iter<I: IntoIterator<Item = PathKey>>(iter: I) -> Self {
        ConfigPath(iter.into_iter().collect())
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}
