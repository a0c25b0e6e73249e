// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration values and tree helpers.
//!
//! Configuration documents of every format are decoded into one recursive
//! value type, [`ConfigValue`]: null, booleans, numbers, strings, sequences
//! and string-keyed mappings. Mappings keep insertion order for display while
//! comparing equal regardless of order.
//!
//! This module also holds the tree operations the rest of the crate is built
//! on: addressing nodes by [`ConfigPath`], walking every node, key
//! unflattening and typed decoding.

use crate::domain::config_path::{ConfigPath, PathKey};
use crate::domain::errors::{ConfigError, Result};
use serde::de::DeserializeOwned;

/// A configuration value: a tree of mappings, sequences and scalars.
pub type ConfigValue = serde_json::Value;

/// A mapping node of a [`ConfigValue`] tree.
pub type Mapping = serde_json::Map<String, ConfigValue>;

/// The default separator used to split compound keys.
pub const DEFAULT_UNFLATTEN_SEPARATOR: &str = "__";

/// Returns the node at `path`, if there is one.
///
/// # Examples
///
/// ```
/// use flange::domain::config_path::ConfigPath;
/// use flange::domain::config_value::value_at;
/// use serde_json::json;
///
/// let tree = json!({"servers": [{"port": 80}]});
/// let path = ConfigPath::from(["servers"]).child(0usize).child("port");
/// assert_eq!(value_at(&tree, &path), Some(&json!(80)));
/// ```
pub fn value_at<'a>(root: &'a ConfigValue, path: &ConfigPath) -> Option<&'a ConfigValue> {
    path.keys().iter().try_fold(root, |node, key| match (node, key) {
        (ConfigValue::Object(map), PathKey::Key(k)) => map.get(k),
        (ConfigValue::Array(items), PathKey::Index(i)) => items.get(*i),
        _ => None,
    })
}

/// Returns the node at `path` mutably, if there is one.
pub fn value_at_mut<'a>(
    root: &'a mut ConfigValue,
    path: &ConfigPath,
) -> Option<&'a mut ConfigValue> {
    let mut node = root;
    for key in path.keys() {
        node = match (node, key) {
            (ConfigValue::Object(map), PathKey::Key(k)) => map.get_mut(k)?,
            (ConfigValue::Array(items), PathKey::Index(i)) => items.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Visits every node of `root` in pre-order, the root included.
pub fn walk<F>(root: &ConfigValue, mut visit: F)
where
    F: FnMut(&ConfigPath, &ConfigValue),
{
    fn walk_inner<F>(path: &ConfigPath, node: &ConfigValue, visit: &mut F)
    where
        F: FnMut(&ConfigPath, &ConfigValue),
    {
        visit(path, node);
        match node {
            ConfigValue::Object(map) => {
                for (key, child) in map {
                    walk_inner(&path.child(key.as_str()), child, visit);
                }
            }
            ConfigValue::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    walk_inner(&path.child(i), child, visit);
                }
            }
            _ => {}
        }
    }
    walk_inner(&ConfigPath::root(), root, &mut visit);
}

/// Returns the text form of a value: strings as-is, everything else as JSON.
pub fn text_of(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns `true` if any scalar in `value` contains `term` in its text form.
///
/// Mapping keys are not considered, only values.
pub fn contains_text(value: &ConfigValue, term: &str) -> bool {
    match value {
        ConfigValue::Object(map) => map.values().any(|v| contains_text(v, term)),
        ConfigValue::Array(items) => items.iter().any(|v| contains_text(v, term)),
        scalar => text_of(scalar).contains(term),
    }
}

/// Returns `true` for a null value or an empty mapping or sequence.
pub fn is_empty_tree(value: &ConfigValue) -> bool {
    match value {
        ConfigValue::Null => true,
        ConfigValue::Object(map) => map.is_empty(),
        ConfigValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Expands compound keys into nested mappings, at every depth.
///
/// `{"a__b": 1}` becomes `{"a": {"b": 1}}`. Keys without the separator are
/// left alone, empty parts are dropped, and compound keys are deep-merged
/// into siblings that share their leading part. The operation is idempotent.
/// An empty separator disables expansion.
///
/// # Examples
///
/// ```
/// use flange::domain::config_value::unflatten;
/// use serde_json::json;
///
/// let expanded = unflatten(json!({"db__host": "localhost", "db": {"port": 5432}}), "__");
/// assert_eq!(expanded, json!({"db": {"host": "localhost", "port": 5432}}));
/// ```
pub fn unflatten(value: ConfigValue, separator: &str) -> ConfigValue {
    if separator.is_empty() {
        return value;
    }
    match value {
        ConfigValue::Object(map) => {
            let mut expanded = Mapping::new();
            for (key, child) in map {
                let child = unflatten(child, separator);
                let parts: Vec<&str> = key.split(separator).filter(|p| !p.is_empty()).collect();
                match parts.split_first() {
                    None => insert_merged(&mut expanded, key, child),
                    Some((head, rest)) => {
                        let nested = rest.iter().rev().fold(child, |acc, part| {
                            let mut m = Mapping::new();
                            m.insert(part.to_string(), acc);
                            ConfigValue::Object(m)
                        });
                        insert_merged(&mut expanded, head.to_string(), nested);
                    }
                }
            }
            ConfigValue::Object(expanded)
        }
        ConfigValue::Array(items) => ConfigValue::Array(
            items
                .into_iter()
                .map(|item| unflatten(item, separator))
                .collect(),
        ),
        scalar => scalar,
    }
}

fn insert_merged(map: &mut Mapping, key: String, value: ConfigValue) {
    if let ConfigValue::Object(incoming) = value {
        if let Some(ConfigValue::Object(existing)) = map.get_mut(&key) {
            for (k, v) in incoming {
                insert_merged(existing, k, v);
            }
            return;
        }
        map.insert(key, ConfigValue::Object(incoming));
    } else {
        map.insert(key, value);
    }
}

/// Decodes a node into any deserializable type.
///
/// # Examples
///
/// ```
/// use flange::domain::config_path::ConfigPath;
/// use flange::domain::config_value::decode;
/// use serde_json::json;
///
/// let port: u16 = decode(&json!(5432), &ConfigPath::from(["db", "port"])).unwrap();
/// assert_eq!(port, 5432);
/// ```
pub fn decode<T>(value: &ConfigValue, path: &ConfigPath) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value.clone()).map_err(|e| ConfigError::TypeConversionError {
        path: path.to_string(),
        target_type: std::any::type_name::<T>().to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_at_missing() {
        let tree = json!({"a": {"b": 1}});
        assert_eq!(value_at(&tree, &ConfigPath::from(["a", "c"])), None);
        assert_eq!(value_at(&tree, &ConfigPath::from(["a", "b", "c"])), None);
        assert_eq!(value_at(&tree, &ConfigPath::root()), Some(&tree));
    }

    #[test]
    fn test_value_at_mut() {
        let mut tree = json!({"a": [1, 2]});
        *value_at_mut(&mut tree, &ConfigPath::from(["a"]).child(1usize)).unwrap() = json!(9);
        assert_eq!(tree, json!({"a": [1, 9]}));
    }

    #[test]
    fn test_walk_visits_every_node() {
        let tree = json!({"a": {"b": 1}, "c": [true]});
        let mut seen = Vec::new();
        walk(&tree, |path, _| seen.push(path.to_string()));
        assert_eq!(seen, vec!["", "a", "a.b", "c", "c.0"]);
    }

    #[test]
    fn test_unflatten_nested_levels() {
        let tree = json!({"outer": {"x__y__z": 1}});
        assert_eq!(
            unflatten(tree, "__"),
            json!({"outer": {"x": {"y": {"z": 1}}}})
        );
    }

    #[test]
    fn test_unflatten_leaves_plain_keys() {
        let tree = json!({"plain_key": 1, "dotted.key": 2});
        assert_eq!(unflatten(tree.clone(), "__"), tree);
    }

    #[test]
    fn test_unflatten_inside_sequences() {
        let tree = json!({"list": [{"a__b": 1}]});
        assert_eq!(unflatten(tree, "__"), json!({"list": [{"a": {"b": 1}}]}));
    }

    #[test]
    fn test_unflatten_drops_empty_parts() {
        let tree = json!({"__cf__user": "x", "____": "only separators"});
        assert_eq!(
            unflatten(tree, "__"),
            json!({"cf": {"user": "x"}, "____": "only separators"})
        );
    }

    #[test]
    fn test_unflatten_is_idempotent() {
        let tree = json!({"a__b": {"c__d": 1}, "a": {"e": 2}, "f": [{"g__h": 3}]});
        let once = unflatten(tree, "__");
        let twice = unflatten(once.clone(), "__");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unflatten_empty_separator_is_noop() {
        let tree = json!({"a__b": 1});
        assert_eq!(unflatten(tree.clone(), ""), tree);
    }

    #[test]
    fn test_contains_text() {
        let params = json!({"url": "postgres://db.internal:5432", "pool": 8});
        assert!(contains_text(&params, "db.internal"));
        assert!(contains_text(&params, "8"));
        assert!(!contains_text(&params, "url"));
    }

    #[test]
    fn test_decode_failure() {
        let result: Result<u16> = decode(&json!("not a number"), &ConfigPath::from(["port"]));
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::TypeConversionError { .. }));
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_is_empty_tree() {
        assert!(is_empty_tree(&json!(null)));
        assert!(is_empty_tree(&json!({})));
        assert!(!is_empty_tree(&json!({"a": 1})));
        assert!(!is_empty_tree(&json!(0)));
    }
}
