// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table-backed descriptor resolution.

use crate::domain::model::Factory;
use crate::domain::{ConfigError, ConfigValue, Result};
use crate::ports::{Resolved, Resolver};
use std::collections::HashMap;

/// Resolves descriptors from a table filled in by the application.
///
/// Descriptors have the form `scheme://location`; a trailing `()` is
/// ignored, so `rust://models/db.schema()` and `rust://models/db.schema`
/// name the same entry.
///
/// # Examples
///
/// ```rust
/// use flange::adapters::RegistryResolver;
/// use flange::ports::{Resolved, Resolver};
/// use serde_json::json;
///
/// let resolver = RegistryResolver::new()
///     .with_schema("rust://models/db.schema", json!({"required": ["host"]}));
/// assert!(matches!(
///     resolver.resolve("rust://models/db.schema()"),
///     Ok(Resolved::Schema(_))
/// ));
/// assert!(resolver.resolve("models/db.schema").is_err());
/// ```
#[derive(Clone, Default)]
pub struct RegistryResolver {
    entries: HashMap<String, Resolved>,
}

impl RegistryResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a schema under `descriptor`.
    pub fn with_schema(mut self, descriptor: impl Into<String>, schema: ConfigValue) -> Self {
        self.insert(descriptor, Resolved::Schema(schema));
        self
    }

    /// Adds a factory under `descriptor`.
    pub fn with_factory(mut self, descriptor: impl Into<String>, factory: Factory) -> Self {
        self.insert(descriptor, Resolved::Factory(factory));
        self
    }

    /// Adds or replaces the entry for `descriptor`.
    pub fn insert(&mut self, descriptor: impl Into<String>, resolved: Resolved) {
        let descriptor = descriptor.into();
        self.entries
            .insert(normalize(&descriptor).to_string(), resolved);
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(descriptor: &str) -> &str {
    let descriptor = descriptor.trim();
    descriptor.strip_suffix("()").unwrap_or(descriptor)
}

impl Resolver for RegistryResolver {
    fn resolve(&self, descriptor: &str) -> Result<Resolved> {
        let key = normalize(descriptor);
        if !key.contains("://") {
            return Err(ConfigError::Resolve {
                descriptor: descriptor.to_string(),
                message: "expected a descriptor of the form scheme://location".to_string(),
            });
        }
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::Resolve {
                descriptor: descriptor.to_string(),
                message: "nothing registered under this descriptor".to_string(),
            })
    }
}

impl std::fmt::Debug for RegistryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        f.debug_struct("RegistryResolver")
            .field("descriptors", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::identity_factory;
    use serde_json::json;

    #[test]
    fn test_resolve_schema_and_factory() {
        let resolver = RegistryResolver::new()
            .with_schema("rust://m/schema", json!({"type": "object"}))
            .with_factory("rust://m/build()", identity_factory());
        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.resolve("rust://m/schema").unwrap().kind(), "schema");
        assert_eq!(resolver.resolve("rust://m/build").unwrap().kind(), "factory");
    }

    #[test]
    fn test_unknown_descriptor() {
        let resolver = RegistryResolver::new();
        assert!(resolver.is_empty());
        assert!(matches!(
            resolver.resolve("rust://missing"),
            Err(ConfigError::Resolve { .. })
        ));
    }
}
