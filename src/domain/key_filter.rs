// SPDX-License-Identifier: MIT OR Apache-2.0

//! Acceptance policy for keys found in configuration content.
//!
//! Format auto-detection can misread arbitrary files (a binary file read as
//! properties, say) and produce garbage keys. Every key is checked against a
//! [`KeyFilter`] and rejected keys drop their whole node.

use crate::domain::config_path::PathKey;
use crate::domain::config_value::{ConfigValue, Mapping};
use std::fmt;
use std::sync::Arc;

/// Keys at least this long are rejected by the default policy.
pub const MAX_KEY_LEN: usize = 50;

/// A predicate deciding whether a key may appear in the configuration.
#[derive(Clone)]
pub struct KeyFilter(Arc<dyn Fn(&PathKey) -> bool + Send + Sync>);

impl KeyFilter {
    /// Creates a filter from a predicate.
    pub fn new<F>(accept: F) -> Self
    where
        F: Fn(&PathKey) -> bool + Send + Sync + 'static,
    {
        KeyFilter(Arc::new(accept))
    }

    /// A filter that accepts every key.
    pub fn accept_all() -> Self {
        KeyFilter::new(|_| true)
    }

    /// Returns `true` if `key` is accepted.
    pub fn accepts(&self, key: &PathKey) -> bool {
        (self.0)(key)
    }

    /// Returns a copy of `value` with every rejected key's node removed.
    pub fn apply(&self, value: ConfigValue) -> ConfigValue {
        match value {
            ConfigValue::Object(map) => {
                let filtered: Mapping = map
                    .into_iter()
                    .filter(|(k, _)| {
                        let accepted = self.accepts(&PathKey::Key(k.clone()));
                        if !accepted {
                            tracing::debug!("Dropping node with rejected key {:?}", k);
                        }
                        accepted
                    })
                    .map(|(k, v)| (k, self.apply(v)))
                    .collect();
                ConfigValue::Object(filtered)
            }
            ConfigValue::Array(items) => {
                let mut kept = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    if self.accepts(&PathKey::Index(i)) {
                        kept.push(self.apply(item));
                    }
                }
                ConfigValue::Array(kept)
            }
            scalar => scalar,
        }
    }
}

impl Default for KeyFilter {
    fn default() -> Self {
        KeyFilter::new(default_key_policy)
    }
}

impl fmt::Debug for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyFilter(..)")
    }
}

/// The default policy: integer keys, and printable-ASCII keys shorter than
/// [`MAX_KEY_LEN`].
pub fn default_key_policy(key: &PathKey) -> bool {
    match key {
        PathKey::Index(_) => true,
        PathKey::Key(k) => k.len() < MAX_KEY_LEN && k.chars().all(|c| (' '..='~').contains(&c)),
    }
}
