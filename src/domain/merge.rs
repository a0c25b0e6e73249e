// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folding sources into one composite tree.
//!
//! Sources are merged in the order given. Mappings merge key by key, and
//! anything else from a later source replaces the earlier value. The
//! [`PathIndex`] is populated in the same traversal, so it always holds
//! exactly the accepted nodes.

use crate::domain::config_path::ConfigPath;
use crate::domain::config_value::{unflatten, walk, ConfigValue, Mapping};
use crate::domain::errors::ConfigError;
use crate::domain::index::PathIndex;
use crate::domain::key_filter::KeyFilter;
use crate::domain::source::{Source, SourceId};

/// The result of merging a list of sources.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// The composite tree; always a mapping.
    pub data: ConfigValue,
    /// The index of every non-root node of `data`.
    pub index: PathIndex,
    /// Sources whose contents were rejected, as `MergeConflict` errors.
    pub failed: Vec<ConfigError>,
}

/// Merges source contents into one tree.
#[derive(Debug, Clone)]
pub struct Merger {
    separator: String,
    filter: KeyFilter,
}

impl Merger {
    /// Creates a merger using `separator` for key unflattening.
    pub fn new(separator: impl Into<String>, filter: KeyFilter) -> Self {
        Self {
            separator: separator.into(),
            filter,
        }
    }

    /// Returns the contents of `source` as they will be merged: grafted
    /// under its root path, unflattened and filtered.
    pub fn prepare(&self, source: &Source) -> ConfigValue {
        let contents = source.contents().clone();
        let grafted = match source.root_path() {
            Some(root) if !root.is_empty() => {
                let mut wrapper = Mapping::new();
                wrapper.insert(root.to_string(), contents);
                ConfigValue::Object(wrapper)
            }
            _ => contents,
        };
        self.filter.apply(unflatten(grafted, &self.separator))
    }

    /// Merges `sources` in order into a fresh tree.
    pub fn merge<'s, I>(&self, sources: I) -> MergeOutcome
    where
        I: IntoIterator<Item = (SourceId, &'s Source)>,
    {
        let mut data = Mapping::new();
        let mut index = PathIndex::new();
        let mut failed = Vec::new();
        let mut merged = 0usize;

        for (id, source) in sources {
            let ConfigValue::Object(incoming) = self.prepare(source) else {
                tracing::warn!("Skipping source '{}': contents are not a mapping", source.uri());
                failed.push(ConfigError::MergeConflict {
                    uri: source.uri().to_string(),
                    path: ConfigPath::root().to_string(),
                    message: "contents are not a mapping".to_string(),
                });
                continue;
            };
            if let Some((path, message)) = find_conflict(&data, &incoming, &ConfigPath::root()) {
                tracing::warn!(
                    "Skipping source '{}': conflict at '{}': {}",
                    source.uri(),
                    path,
                    message
                );
                failed.push(ConfigError::MergeConflict {
                    uri: source.uri().to_string(),
                    path: path.to_string(),
                    message,
                });
                continue;
            }
            fold(&mut data, incoming, &ConfigPath::root(), id, &mut index);
            merged += 1;
        }

        tracing::info!(
            "Merged {} sources ({} rejected) into {} indexed paths",
            merged,
            failed.len(),
            index.len()
        );
        MergeOutcome {
            data: ConfigValue::Object(data),
            index,
            failed,
        }
    }
}

impl Default for Merger {
    fn default() -> Self {
        Merger::new(
            crate::domain::config_value::DEFAULT_UNFLATTEN_SEPARATOR,
            KeyFilter::default(),
        )
    }
}

/// Finds the first path where `incoming` cannot be folded into `existing`.
fn find_conflict(
    existing: &Mapping,
    incoming: &Mapping,
    path: &ConfigPath,
) -> Option<(ConfigPath, String)> {
    for (key, new) in incoming {
        let Some(old) = existing.get(key) else {
            continue;
        };
        let here = path.child(key.as_str());
        match (old, new) {
            (ConfigValue::Object(old), ConfigValue::Object(new)) => {
                if let Some(conflict) = find_conflict(old, new, &here) {
                    return Some(conflict);
                }
            }
            (ConfigValue::Object(_), ConfigValue::Null) => {}
            (ConfigValue::Object(_), _) => {
                return Some((here, "cannot replace a mapping with a non-mapping".into()));
            }
            (ConfigValue::Null, _) => {}
            (_, ConfigValue::Object(_)) => {
                return Some((here, "cannot merge a mapping into a non-mapping".into()));
            }
            _ => {}
        }
    }
    None
}

/// Folds `incoming` into `acc`, recording every touched node in `index`.
///
/// A null arriving over a mapping leaves the mapping in place.
fn fold(
    acc: &mut Mapping,
    incoming: Mapping,
    path: &ConfigPath,
    id: SourceId,
    index: &mut PathIndex,
) {
    for (key, value) in incoming {
        let here = path.child(key.as_str());
        match acc.get_mut(&key) {
            Some(ConfigValue::Object(_)) if value.is_null() => {}
            Some(ConfigValue::Object(existing)) if value.is_object() => {
                if let ConfigValue::Object(nested) = value {
                    fold(existing, nested, &here, id, index);
                }
                index.record(here, &ConfigValue::Object(existing.clone()), id);
            }
            _ => {
                index.prune_below(&here);
                walk(&value, |sub, node| index.record(here.join(sub), node, id));
                acc.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::SourceKind;
    use serde_json::json;

    fn data_source(uri: &str, root: Option<&str>, value: ConfigValue) -> Source {
        Source::from_value(
            uri,
            SourceKind::InitData,
            root.map(str::to_string),
            value,
            &KeyFilter::default(),
        )
    }

    fn merge_all(sources: &[Source]) -> MergeOutcome {
        Merger::default().merge(sources.iter().enumerate().map(|(i, s)| (SourceId(i), s)))
    }

    #[test]
    fn test_later_source_wins() {
        let a = data_source("a", None, json!({"x": 1, "keep": true}));
        let b = data_source("b", None, json!({"x": 2}));

        let ab = merge_all(&[a, b]);
        assert_eq!(ab.data, json!({"x": 2, "keep": true}));

        let a = data_source("a", None, json!({"x": 1, "keep": true}));
        let b = data_source("b", None, json!({"x": 2}));
        let ba = merge_all(&[b, a]);
        assert_eq!(ba.data["x"], json!(1));
    }

    #[test]
    fn test_nested_mappings_merge_recursively() {
        let a = data_source("a", None, json!({"db": {"host": "h1", "port": 5432}}));
        let b = data_source("b", None, json!({"db": {"host": "h2"}}));
        let out = merge_all(&[a, b]);
        assert_eq!(out.data, json!({"db": {"host": "h2", "port": 5432}}));
        let entry = out.index.get(&ConfigPath::from(["db"])).unwrap();
        assert_eq!(entry.value(), &json!({"host": "h2", "port": 5432}));
        assert_eq!(entry.sources().len(), 2);
    }

    #[test]
    fn test_sequences_replace() {
        let a = data_source("a", None, json!({"hosts": ["a", "b", "c"]}));
        let b = data_source("b", None, json!({"hosts": ["z"]}));
        let out = merge_all(&[a, b]);
        assert_eq!(out.data, json!({"hosts": ["z"]}));
        assert!(out.index.get(&ConfigPath::from(["hosts"]).child(2usize)).is_none());
        assert_eq!(
            out.index.get(&ConfigPath::from(["hosts"]).child(0usize)).unwrap().value(),
            &json!("z")
        );
    }

    #[test]
    fn test_provenance_keeps_every_contributor() {
        let a = data_source("a", None, json!({"x": 1}));
        let b = data_source("b", None, json!({"x": 2}));
        let out = merge_all(&[a, b]);
        let entry = out.index.get(&ConfigPath::from(["x"])).unwrap();
        assert_eq!(entry.value(), &json!(2));
        assert_eq!(
            entry.sources().iter().copied().collect::<Vec<_>>(),
            vec![SourceId(0), SourceId(1)]
        );
    }

    #[test]
    fn test_conflicting_source_is_rejected_whole() {
        let a = data_source("a", None, json!({"x": 1, "y": {"z": 1}}));
        let b = data_source("b", None, json!({"w": 5, "x": {"nested": true}}));
        let c = data_source("c", None, json!({"w": 7}));
        let out = merge_all(&[a, b, c]);

        assert_eq!(out.data, json!({"x": 1, "y": {"z": 1}, "w": 7}));
        assert_eq!(out.failed.len(), 1);
        match &out.failed[0] {
            ConfigError::MergeConflict { uri, path, .. } => {
                assert_eq!(uri, "b");
                assert_eq!(path, "x");
            }
            other => panic!("unexpected error {:?}", other),
        }
        let w = out.index.get(&ConfigPath::from(["w"])).unwrap();
        assert_eq!(w.sources().iter().copied().collect::<Vec<_>>(), vec![SourceId(2)]);
    }

    #[test]
    fn test_scalar_over_mapping_conflicts() {
        let a = data_source("a", None, json!({"db": {"host": "h"}}));
        let b = data_source("b", None, json!({"db": "flat"}));
        let out = merge_all(&[a, b]);
        assert_eq!(out.data, json!({"db": {"host": "h"}}));
        assert_eq!(out.failed.len(), 1);
    }

    #[test]
    fn test_null_is_overwritten_and_does_not_erase() {
        let a = data_source("a", None, json!({"db": null, "svc": {"port": 1}}));
        let b = data_source("b", None, json!({"db": {"host": "h"}, "svc": null}));
        let out = merge_all(&[a, b]);
        assert!(out.failed.is_empty());
        assert_eq!(out.data, json!({"db": {"host": "h"}, "svc": {"port": 1}}));
    }

    #[test]
    fn test_null_over_mapping_keeps_provenance() {
        let a = data_source("a", None, json!({"m": {"x": 1}}));
        let b = data_source("b", None, json!({"m": null}));
        let out = merge_all(&[a, b]);
        assert!(out.failed.is_empty());
        assert_eq!(out.data, json!({"m": {"x": 1}}));
        let entry = out.index.get(&ConfigPath::from(["m"])).unwrap();
        assert_eq!(
            entry.sources().iter().copied().collect::<Vec<_>>(),
            vec![SourceId(0)]
        );
    }

    #[test]
    fn test_non_mapping_contents_are_rejected() {
        let a = data_source("a", None, json!({"x": 1}));
        let b = data_source("list", None, json!([1, 2]));
        let out = merge_all(&[a, b]);
        assert_eq!(out.data, json!({"x": 1}));
        assert_eq!(out.failed.len(), 1);
        match &out.failed[0] {
            ConfigError::MergeConflict { uri, path, message } => {
                assert_eq!(uri, "list");
                assert_eq!(path, "");
                assert!(message.contains("not a mapping"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_root_path_is_unflattened() {
        let a = data_source("a", Some("contexts__default"), json!({"user": "me"}));
        let out = merge_all(&[a]);
        assert_eq!(out.data, json!({"contexts": {"default": {"user": "me"}}}));
        assert!(out
            .index
            .get(&ConfigPath::from(["contexts", "default", "user"]))
            .is_some());
    }

    #[test]
    fn test_compound_keys_unflattened_during_merge() {
        let env = data_source("os_env", None, json!({"db__host": "localhost"}));
        let out = merge_all(&[env]);
        assert_eq!(out.data, json!({"db": {"host": "localhost"}}));
    }

    #[test]
    fn test_index_covers_every_non_root_node() {
        let a = data_source("a", None, json!({"a": {"b": [1, {"c": 2}]}}));
        let out = merge_all(&[a]);
        let paths: Vec<String> = out.index.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["a", "a.b", "a.b.0", "a.b.1", "a.b.1.c"]);
    }
}
