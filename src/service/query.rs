// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query builder over the search primitive.
//!
//! Every accessor runs the same search and then shapes the result. The
//! singular accessors (`path`, `value`, `src`, `uri`, `obj`, `fobj`) require
//! at most one result: several are [`ConfigError::AmbiguousMatch`], and none
//! is `Ok(None)` unless [`Query::raise_absent`] asks for
//! [`ConfigError::AbsentMatch`]. The plural accessors return everything.

use crate::domain::config_value::decode;
use crate::domain::search::search;
use crate::domain::{
    ConfigError, ConfigPath, ConfigValue, IndexEntry, Instance, ModelRegistration, PathPattern,
    Result, Source,
};
use crate::service::Cfg;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::Arc;

/// Applies the uniqueness rule to `items`.
pub(crate) fn expect_unique<T>(
    mut items: Vec<T>,
    pattern: &str,
    raise_absent: bool,
    describe: impl Fn(&T) -> String,
) -> Result<Option<T>> {
    match items.len() {
        0 if raise_absent => Err(ConfigError::AbsentMatch {
            pattern: pattern.to_string(),
        }),
        0 => Ok(None),
        1 => Ok(items.pop()),
        _ => Err(ConfigError::AmbiguousMatch {
            pattern: pattern.to_string(),
            matches: items.iter().map(describe).collect(),
        }),
    }
}

fn describe_registration(registration: &Arc<ModelRegistration>) -> String {
    format!("{}@{}", registration.model().name(), registration.path())
}

/// A search over a [`Cfg`] and the shape of its result.
///
/// Queries are exact by default: the final pattern segment must match the
/// final key as a whole.
///
/// # Examples
///
/// ```rust
/// use flange::service::Cfg;
/// use serde_json::json;
///
/// # fn main() -> flange::domain::Result<()> {
/// let cfg = Cfg::from_data(json!({"db": {"host": "localhost", "port": 5432}}))?;
///
/// assert_eq!(cfg.query("db.port").value()?, Some(json!(5432)));
/// assert_eq!(cfg.query("hos").fuzzy().paths()?.len(), 1);
///
/// let port: Option<u16> = cfg.query("port").value_as()?;
/// assert_eq!(port, Some(5432));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Query<'c> {
    cfg: &'c Cfg,
    pattern: String,
    exact: bool,
    required: Vec<ConfigValue>,
    model: Option<String>,
    raise_absent: bool,
    reraise: bool,
}

impl<'c> Query<'c> {
    pub(crate) fn new(cfg: &'c Cfg, pattern: impl Into<String>) -> Self {
        Self {
            cfg,
            pattern: pattern.into(),
            exact: true,
            required: Vec::new(),
            model: None,
            raise_absent: false,
            reraise: false,
        }
    }

    /// Sets exact or fuzzy matching of the final segment and of values.
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Switches to fuzzy matching.
    pub fn fuzzy(self) -> Self {
        self.exact(false)
    }

    /// Adds a value a match must have. With several, any one suffices.
    pub fn with_value(mut self, value: impl Into<ConfigValue>) -> Self {
        self.required.push(value.into());
        self
    }

    /// Restricts `obj`/`fobj` results to registrations of one model.
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    /// Makes singular accessors fail with `AbsentMatch` when nothing matches.
    pub fn raise_absent(mut self, raise: bool) -> Self {
        self.raise_absent = raise;
        self
    }

    /// Makes `obj`/`objs` return factory failures instead of skipping them.
    pub fn reraise(mut self, reraise: bool) -> Self {
        self.reraise = reraise;
        self
    }

    /// Returns the matched index entries in path order.
    pub fn matches(&self) -> Result<Vec<(&'c ConfigPath, &'c IndexEntry)>> {
        let pattern = PathPattern::new(&self.pattern, self.exact)?;
        Ok(search(self.cfg.index(), &pattern, &self.required))
    }

    fn unique<T>(&self, items: Vec<T>, describe: impl Fn(&T) -> String) -> Result<Option<T>> {
        expect_unique(items, &self.pattern, self.raise_absent, describe)
    }

    fn unique_match(&self) -> Result<Option<(&'c ConfigPath, &'c IndexEntry)>> {
        self.unique(self.matches()?, |(path, _)| path.to_string())
    }

    /// Returns every matched path.
    pub fn paths(&self) -> Result<Vec<ConfigPath>> {
        Ok(self.matches()?.into_iter().map(|(p, _)| p.clone()).collect())
    }

    /// Returns the matched path.
    pub fn path(&self) -> Result<Option<ConfigPath>> {
        Ok(self.unique_match()?.map(|(p, _)| p.clone()))
    }

    /// Returns every matched value.
    pub fn values(&self) -> Result<Vec<ConfigValue>> {
        Ok(self
            .matches()?
            .into_iter()
            .map(|(_, e)| e.value().clone())
            .collect())
    }

    /// Returns the matched value.
    pub fn value(&self) -> Result<Option<ConfigValue>> {
        Ok(self.unique_match()?.map(|(_, e)| e.value().clone()))
    }

    /// Returns the matched value decoded into `T`.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.unique_match()?
            .map(|(path, entry)| decode(entry.value(), path))
            .transpose()
    }

    /// Returns every source that contributed to any match, in merge order.
    pub fn srcs(&self) -> Result<Vec<&'c Source>> {
        let mut ids: Vec<_> = self
            .matches()?
            .into_iter()
            .flat_map(|(_, e)| e.sources().iter().copied())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids.into_iter().filter_map(|id| self.cfg.source(id)).collect())
    }

    /// Returns the source whose value won at the matched path.
    pub fn src(&self) -> Result<Option<&'c Source>> {
        Ok(self
            .unique_match()?
            .and_then(|(_, e)| e.sources().iter().next_back().copied())
            .and_then(|id| self.cfg.source(id)))
    }

    /// Returns the uris of [`Query::srcs`].
    pub fn uris(&self) -> Result<Vec<&'c str>> {
        Ok(self.srcs()?.into_iter().map(Source::uri).collect())
    }

    /// Returns the uri of [`Query::src`].
    pub fn uri(&self) -> Result<Option<&'c str>> {
        Ok(self.src()?.map(Source::uri))
    }

    /// Returns the registrations at every matched path.
    pub fn fobjs(&self) -> Result<Vec<Arc<ModelRegistration>>> {
        if let Some(name) = &self.model {
            if self.cfg.model(name).is_none() {
                return Err(ConfigError::NoSuchModel { name: name.clone() });
            }
        }
        let mut found = Vec::new();
        for (_, entry) in self.matches()? {
            match &self.model {
                Some(name) => found.extend(entry.registration(name).cloned()),
                None => found.extend(entry.registrations().values().cloned()),
            }
        }
        Ok(found)
    }

    /// Returns the one registration among the matched paths.
    pub fn fobj(&self) -> Result<Option<Arc<ModelRegistration>>> {
        self.unique(self.fobjs()?, describe_registration)
    }

    /// Returns the instances of [`Query::fobjs`], skipping failed factories
    /// unless [`Query::reraise`] is set.
    pub fn objs(&self) -> Result<Vec<Instance>> {
        let mut instances = Vec::new();
        for registration in self.fobjs()? {
            instances.extend(registration.instance(Some(self.cfg), self.reraise)?);
        }
        Ok(instances)
    }

    /// Returns the instance of [`Query::fobj`].
    pub fn obj(&self) -> Result<Option<Instance>> {
        match self.fobj()? {
            Some(registration) => registration.instance(Some(self.cfg), self.reraise),
            None => Ok(None),
        }
    }

    /// Returns the instance of [`Query::fobj`] as a `T`.
    ///
    /// An instance of another type is a `TypeConversionError`.
    pub fn obj_as<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
        let Some(registration) = self.fobj()? else {
            return Ok(None);
        };
        match registration.instance(Some(self.cfg), self.reraise)? {
            Some(instance) => instance.downcast::<T>().map(Some).map_err(|_| {
                ConfigError::TypeConversionError {
                    path: registration.path().to_string(),
                    target_type: std::any::type_name::<T>().to_string(),
                    source: format!(
                        "model '{}' built a different type",
                        registration.model().name()
                    )
                    .into(),
                }
            }),
            None => Ok(None),
        }
    }
}
