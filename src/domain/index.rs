// SPDX-License-Identifier: MIT OR Apache-2.0

//! The path index over the merged tree.
//!
//! Every non-root node of the merged tree has an [`IndexEntry`] holding its
//! current value, the sources that contributed at that path, and the model
//! registrations that matched the value there.

use crate::domain::config_path::ConfigPath;
use crate::domain::config_value::{value_at, walk, ConfigValue};
use crate::domain::errors::{ConfigError, Result};
use crate::domain::model::ModelRegistration;
use crate::domain::source::SourceId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Metadata about one node of the merged tree.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    value: ConfigValue,
    sources: BTreeSet<SourceId>,
    registrations: BTreeMap<String, Arc<ModelRegistration>>,
}

impl IndexEntry {
    fn new(value: ConfigValue) -> Self {
        Self {
            value,
            sources: BTreeSet::new(),
            registrations: BTreeMap::new(),
        }
    }

    /// Returns the value at this path in the merged tree.
    pub fn value(&self) -> &ConfigValue {
        &self.value
    }

    /// Returns every source that ever contributed at this path.
    pub fn sources(&self) -> &BTreeSet<SourceId> {
        &self.sources
    }

    /// Returns the registrations at this path, keyed by model name.
    pub fn registrations(&self) -> &BTreeMap<String, Arc<ModelRegistration>> {
        &self.registrations
    }

    /// Returns the registration for `model`, if that model matched here.
    pub fn registration(&self, model: &str) -> Option<&Arc<ModelRegistration>> {
        self.registrations.get(model)
    }

    pub(crate) fn set_value(&mut self, value: ConfigValue) {
        self.value = value;
    }
}

/// A map from full path to [`IndexEntry`], ordered by path.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    entries: BTreeMap<ConfigPath, IndexEntry>,
}

impl PathIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `source` supplied `value` at `path`.
    ///
    /// The entry's value always becomes the latest one, and the source is
    /// added to the contributing set even when the value is unchanged.
    pub fn record(&mut self, path: ConfigPath, value: &ConfigValue, source: SourceId) {
        match self.entries.get_mut(&path) {
            Some(entry) => {
                if entry.value != *value {
                    tracing::trace!("Index value at '{}' overridden by {:?}", path, source);
                    entry.value = value.clone();
                }
                entry.sources.insert(source);
            }
            None => {
                let mut entry = IndexEntry::new(value.clone());
                entry.sources.insert(source);
                self.entries.insert(path, entry);
            }
        }
    }

    /// Removes every entry strictly below `path`.
    pub fn prune_below(&mut self, path: &ConfigPath) {
        let stale: Vec<ConfigPath> = self
            .entries
            .range(path.clone()..)
            .map(|(p, _)| p)
            .take_while(|p| path.is_prefix_of(p))
            .filter(|p| *p != path)
            .cloned()
            .collect();
        for p in stale {
            self.entries.remove(&p);
        }
    }

    /// Re-reads the entries at, below and above `path` from `data`.
    ///
    /// Entries whose node is gone are removed and new nodes get entries with
    /// no contributing source. Registrations on surviving entries are kept.
    pub(crate) fn sync_subtree(&mut self, data: &ConfigValue, path: &ConfigPath) {
        let below: Vec<ConfigPath> = self
            .entries
            .range(path.clone()..)
            .map(|(p, _)| p)
            .take_while(|p| path.is_prefix_of(p))
            .cloned()
            .collect();
        for p in below {
            match value_at(data, &p) {
                Some(value) => {
                    if let Some(entry) = self.entries.get_mut(&p) {
                        entry.value = value.clone();
                    }
                }
                None => {
                    self.entries.remove(&p);
                }
            }
        }

        if let Some(node) = value_at(data, path) {
            let entries = &mut self.entries;
            walk(node, |sub, value| {
                let full = path.join(sub);
                if !full.is_empty() {
                    entries
                        .entry(full)
                        .or_insert_with(|| IndexEntry::new(value.clone()));
                }
            });
        }

        let mut ancestor = path.parent();
        while let Some(p) = ancestor {
            if p.is_empty() {
                break;
            }
            if let (Some(entry), Some(value)) = (self.entries.get_mut(&p), value_at(data, &p)) {
                entry.value = value.clone();
            }
            ancestor = p.parent();
        }
    }

    /// Attaches a registration to the entry at `path`.
    ///
    /// The root has no key to register under, so a root match is rejected
    /// with [`ConfigError::InvalidRegistrationKey`].
    pub fn attach(&mut self, path: &ConfigPath, registration: ModelRegistration) -> Result<()> {
        let model = registration.model().name().to_string();
        if path.is_empty() {
            return Err(ConfigError::InvalidRegistrationKey {
                model,
                path: path.to_string(),
            });
        }
        let entry = self
            .entries
            .entry(path.clone())
            .or_insert_with(|| IndexEntry::new(registration.params()));
        entry.registrations.insert(model, Arc::new(registration));
        Ok(())
    }

    /// Drops the registrations of one model, or of every model.
    pub fn clear_registrations(&mut self, model: Option<&str>) {
        for entry in self.entries.values_mut() {
            match model {
                Some(name) => {
                    entry.registrations.remove(name);
                }
                None => entry.registrations.clear(),
            }
        }
    }

    /// Returns every registration, optionally restricted to one model.
    pub fn registrations<'a>(
        &'a self,
        model: Option<&'a str>,
    ) -> impl Iterator<Item = (&'a ConfigPath, &'a Arc<ModelRegistration>)> + 'a {
        self.entries.iter().flat_map(move |(path, entry)| {
            entry
                .registrations
                .iter()
                .filter(move |(name, _)| model.map_or(true, |m| m == name.as_str()))
                .map(move |(_, reg)| (path, reg))
        })
    }

    /// Returns the entry at `path`.
    pub fn get(&self, path: &ConfigPath) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &ConfigPath) -> Option<&mut IndexEntry> {
        self.entries.get_mut(path)
    }

    /// Iterates over all entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&ConfigPath, &IndexEntry)> {
        self.entries.iter()
    }

    /// Returns the number of indexed paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
