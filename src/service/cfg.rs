// SPDX-License-Identifier: MIT OR Apache-2.0

//! The configuration façade.
//!
//! A [`Cfg`] is built in four phases:
//!
//! 1. **gather**: discover files under the base directories, then add the
//!    environment and init-data sources;
//! 2. **load**: parse every file source;
//! 3. **merge**: fold the sources in order into one tree and its index;
//! 4. **research**: test every model against every indexed node and register
//!    the matches, installing the models declared by plugin declarations on
//!    the way.
//!
//! Later sources win: files in discovery order, then the environment, then
//! init data. After construction a `Cfg` is read-mostly; [`Cfg::refresh`]
//! re-runs selected phases and must not race with readers.

use crate::adapters::{default_parsers, EnvVarReader, GlobWalker, JsonSchemaValidator, RegistryResolver};
use crate::domain::config_value::{value_at_mut, DEFAULT_UNFLATTEN_SEPARATOR};
use crate::domain::model::{
    default_models, identity_factory, plugin_model_spec, PLUGIN_MODEL_NAME,
};
use crate::domain::{
    ConfigError, ConfigPath, ConfigValue, Factory, Instance, KeyFilter, Mapping, Merger, Model,
    ModelRegistration, ModelSpec, PathIndex, PluginDeclaration, RegistryOptions, Result, Source,
    SourceId, SourceKind,
};
use crate::ports::{ConfigParser, Resolver, Validator, Walker};
use crate::service::info::{CfgInfo, ModelInfo, SourceInfo};
use crate::service::query::{expect_unique, Query};
use directories::BaseDirs;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name patterns included by default.
pub const DEFAULT_INCLUDE: [&str; 6] = [
    "*.yml",
    "*cfg",
    "*settings",
    "*config",
    "*properties",
    "*props",
];

/// File and directory name patterns excluded by default.
pub const DEFAULT_EXCLUDE: [&str; 10] = [
    "*.tar",
    "*.jar",
    "*.zip",
    "*.gz",
    "*.swp",
    "node_modules",
    "target",
    ".idea",
    "*.hide",
    "*save",
];

fn strings(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

/// A group of files discovered under one or more base directories.
///
/// # Examples
///
/// ```rust
/// use flange::service::FileSet;
///
/// let set = FileSet::new("~/.config/app")
///     .include(["*.toml", "*.yml"])
///     .search_depth(2)
///     .root_path("app");
/// assert_eq!(set.base_dirs, vec!["~/.config/app"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSet {
    /// Directories to search; a leading `~` is the home directory.
    pub base_dirs: Vec<String>,
    /// File name globs to include.
    pub include: Vec<String>,
    /// File and directory name globs to skip.
    pub exclude: Vec<String>,
    /// Directory levels below each base directory to descend.
    pub search_depth: usize,
    /// Path the contents of every file are grafted under.
    pub root_path: Option<String>,
    /// Graft each file under its parent directory's name when no root
    /// path is given.
    pub root_path_from_dirname: bool,
}

impl Default for FileSet {
    fn default() -> Self {
        Self {
            base_dirs: vec![".".to_string()],
            include: strings(&DEFAULT_INCLUDE),
            exclude: strings(&DEFAULT_EXCLUDE),
            search_depth: 1,
            root_path: None,
            root_path_from_dirname: false,
        }
    }
}

impl FileSet {
    /// Creates a file set over one base directory with the default patterns.
    pub fn new(base_dir: impl Into<String>) -> Self {
        Self {
            base_dirs: vec![base_dir.into()],
            ..Self::default()
        }
    }

    /// Adds another base directory.
    pub fn base_dir(mut self, dir: impl Into<String>) -> Self {
        self.base_dirs.push(dir.into());
        self
    }

    /// Replaces the include patterns.
    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the exclude patterns.
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the search depth.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Sets the root path.
    pub fn root_path(mut self, root: impl Into<String>) -> Self {
        self.root_path = Some(root.into());
        self
    }

    /// Sets whether files are grafted under their directory's name.
    pub fn root_path_from_dirname(mut self, enabled: bool) -> Self {
        self.root_path_from_dirname = enabled;
        self
    }

    fn root_path_for(&self, file: &Path) -> Option<String> {
        match &self.root_path {
            Some(root) if !root.is_empty() => Some(root.clone()),
            _ if self.root_path_from_dirname => dirname_root(file),
            _ => None,
        }
    }
}

fn dirname_root(file: &Path) -> Option<String> {
    let name = file.parent()?.file_name()?.to_str()?.trim_matches('.');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Expands a leading `~` to the home directory.
fn expand_home(dir: &str) -> PathBuf {
    let rest = if dir == "~" {
        Some("")
    } else {
        dir.strip_prefix("~/")
    };
    match (rest, BaseDirs::new()) {
        (Some(rest), Some(dirs)) => dirs.home_dir().join(rest),
        _ => PathBuf::from(dir),
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Tunables of a [`Cfg`].
///
/// Every field has a default, so options can be deserialized from a
/// partial document.
///
/// # Examples
///
/// ```rust
/// use flange::service::CfgOptions;
///
/// let options: CfgOptions = serde_json::from_str(r#"{"search_depth": 3}"#).unwrap();
/// assert_eq!(options.search_depth, 3);
/// assert_eq!(options.unflatten_separator, "__");
/// assert!(options.include_os_env);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CfgOptions {
    /// Directories searched for files.
    pub base_dirs: Vec<String>,
    /// File name globs to include.
    pub include: Vec<String>,
    /// File and directory name globs to skip.
    pub exclude: Vec<String>,
    /// Directory levels below each base directory to descend.
    pub search_depth: usize,
    /// Path the contents of discovered files are grafted under.
    pub root_path: Option<String>,
    /// Graft each discovered file under its parent directory's name.
    pub root_path_from_dirname: bool,
    /// Add the process environment as a source.
    pub include_os_env: bool,
    /// Path the environment is grafted under.
    pub env_root_path: Option<String>,
    /// Only read variables with this prefix, and strip it.
    pub env_prefix: Option<String>,
    /// Lowercase environment variable names.
    pub env_lowercase: bool,
    /// Separator splitting compound keys into nested mappings.
    pub unflatten_separator: String,
    /// Run the research phase during construction.
    pub research_models: bool,
    /// How registrations cache instances and treat their params.
    pub registry: RegistryOptions,
}

impl Default for CfgOptions {
    fn default() -> Self {
        let files = FileSet::default();
        Self {
            base_dirs: files.base_dirs,
            include: files.include,
            exclude: files.exclude,
            search_depth: files.search_depth,
            root_path: None,
            root_path_from_dirname: false,
            include_os_env: true,
            env_root_path: None,
            env_prefix: None,
            env_lowercase: true,
            unflatten_separator: DEFAULT_UNFLATTEN_SEPARATOR.to_string(),
            research_models: true,
            registry: RegistryOptions::default(),
        }
    }
}

impl CfgOptions {
    /// Returns the primary file set described by these options.
    pub fn file_set(&self) -> FileSet {
        FileSet {
            base_dirs: self.base_dirs.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            search_depth: self.search_depth,
            root_path: self.root_path.clone(),
            root_path_from_dirname: self.root_path_from_dirname,
        }
    }
}

/// Which phases [`Cfg::refresh`] re-runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPhases {
    /// Rediscover files and re-read the environment.
    pub gather: bool,
    /// Re-parse file sources.
    pub load: bool,
    /// Rebuild the tree and index from the sources.
    pub merge: bool,
    /// Rediscover model matches, dropping every registration and cache.
    pub research: bool,
}

impl RefreshPhases {
    /// Every phase.
    pub fn all() -> Self {
        Self {
            gather: true,
            load: true,
            merge: true,
            research: true,
        }
    }

    /// Only merge and research, for sources that are already loaded.
    pub fn remerge() -> Self {
        Self {
            gather: false,
            load: false,
            merge: true,
            research: true,
        }
    }
}

impl Default for RefreshPhases {
    fn default() -> Self {
        Self::all()
    }
}

/// A merged, indexed and researched configuration.
///
/// # Examples
///
/// ```rust
/// use flange::service::Cfg;
/// use serde_json::json;
///
/// # fn main() -> flange::domain::Result<()> {
/// let cfg = Cfg::from_data(json!({
///     "db": {"host": "localhost"},
///     "testlog": {"name": "testlog", "level": "INFO"}
/// }))?;
///
/// assert_eq!(cfg.value("db.host")?, Some(json!("localhost")));
/// assert_eq!(cfg.list("logger")?, vec!["testlog"]);
/// # Ok(())
/// # }
/// ```
pub struct Cfg {
    options: CfgOptions,
    file_sets: Vec<FileSet>,
    extra_files: Vec<(PathBuf, Option<String>)>,
    init_data: Option<ConfigValue>,
    explicit_models: BTreeMap<String, ModelSpec>,

    sources: Vec<Source>,
    data: ConfigValue,
    index: PathIndex,
    failed: Vec<ConfigError>,
    research_errors: Vec<ConfigError>,
    models: BTreeMap<String, Arc<Model>>,

    walker: Arc<dyn Walker>,
    parsers: Vec<Arc<dyn ConfigParser>>,
    validator: Arc<dyn Validator>,
    resolver: Arc<dyn Resolver>,
    key_filter: KeyFilter,
    env_reader: EnvVarReader,
}

impl Cfg {
    /// Builds a `Cfg` with the default options: files under the current
    /// directory, then the process environment.
    pub fn new() -> Result<Self> {
        CfgBuilder::new().build()
    }

    /// Creates a builder.
    pub fn builder() -> CfgBuilder {
        CfgBuilder::new()
    }

    /// Builds a `Cfg` from a single file, without the environment.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use flange::service::Cfg;
    ///
    /// # fn main() -> flange::domain::Result<()> {
    /// let cfg = Cfg::from_file("/etc/myapp/config.yml", None)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file(path: impl AsRef<Path>, root_path: Option<&str>) -> Result<Self> {
        CfgBuilder::new()
            .base_dirs(Vec::<String>::new())
            .include_os_env(false)
            .file(path, root_path.map(str::to_string))
            .build()
    }

    /// Builds a `Cfg` from in-memory data only.
    pub fn from_data(data: ConfigValue) -> Result<Self> {
        CfgBuilder::new()
            .base_dirs(Vec::<String>::new())
            .include_os_env(false)
            .init_data(data)
            .build()
    }

    /// Builds a `Cfg` from the process environment only.
    pub fn from_os_env(root_path: Option<&str>) -> Result<Self> {
        let mut builder = CfgBuilder::new().base_dirs(Vec::<String>::new());
        if let Some(root) = root_path {
            builder = builder.env_root_path(root);
        }
        builder.build()
    }

    // ---- phases -------------------------------------------------------

    /// Re-runs the selected phases, in order.
    pub fn refresh(&mut self, phases: RefreshPhases) -> Result<()> {
        if phases.gather {
            self.gather()?;
        }
        if phases.load {
            self.load();
        }
        if phases.merge {
            self.merge();
        }
        if phases.research {
            self.research()?;
        }
        Ok(())
    }

    fn discover(&self, set: &FileSet) -> Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        for dir in &set.base_dirs {
            let base = expand_home(dir);
            for path in self
                .walker
                .walk(&base, &set.include, &set.exclude, set.search_depth)?
            {
                found.push(absolute(&path));
            }
        }
        Ok(found)
    }

    fn gather(&mut self) -> Result<()> {
        let mut sources: Vec<Source> = Vec::new();
        let mut seen = HashSet::new();

        let sets: Vec<FileSet> = std::iter::once(self.options.file_set())
            .chain(self.file_sets.iter().cloned())
            .collect();
        for set in &sets {
            for path in self.discover(set)? {
                if seen.insert(path.clone()) {
                    sources.push(Source::file(&path, set.root_path_for(&path)));
                }
            }
        }

        for (path, root) in &self.extra_files {
            let uri = path.display().to_string();
            let duplicate = sources
                .iter()
                .any(|s| s.uri() == uri && s.root_path() == root.as_deref());
            if !duplicate {
                sources.push(Source::file(path, root.clone()));
            }
        }

        if self.options.include_os_env {
            sources.push(Source::environment(
                self.options.env_root_path.clone(),
                self.env_reader.read(),
                &self.key_filter,
            ));
        }
        if let Some(data) = &self.init_data {
            sources.push(Source::init_data(data.clone(), &self.key_filter));
        }

        tracing::info!("Gathered {} configuration sources", sources.len());
        self.sources = sources;
        Ok(())
    }

    fn load(&mut self) {
        for source in &mut self.sources {
            source.load(&self.parsers, &self.key_filter);
        }
        let failed = self.sources.iter().filter(|s| s.error().is_some()).count();
        tracing::info!(
            "Loaded {} sources ({} failed to load)",
            self.sources.len(),
            failed
        );
    }

    fn merge(&mut self) {
        let merger = Merger::new(
            self.options.unflatten_separator.clone(),
            self.key_filter.clone(),
        );
        let outcome = merger.merge(
            self.sources
                .iter()
                .enumerate()
                .map(|(i, source)| (SourceId(i), source)),
        );
        self.data = outcome.data;
        self.index = outcome.index;
        self.failed = outcome.failed;
    }

    /// Compiles the plugin model, the default models and the explicitly
    /// registered ones, in that order of precedence.
    fn install_models(&mut self) -> Result<()> {
        let mut specs: BTreeMap<String, ModelSpec> = BTreeMap::new();
        for spec in default_models() {
            specs.insert(spec.name().to_string(), spec);
        }
        for (name, spec) in &self.explicit_models {
            specs.insert(name.clone(), spec.clone());
        }
        let plugin = plugin_model_spec();
        specs.insert(plugin.name().to_string(), plugin);

        let mut models = BTreeMap::new();
        for (name, spec) in specs {
            models.insert(name, Arc::new(spec.compile(self.validator.clone())?));
        }
        self.models = models;
        Ok(())
    }

    fn research(&mut self) -> Result<()> {
        self.install_models()?;
        self.index.clear_registrations(None);
        self.research_errors.clear();

        let models: Vec<Arc<Model>> = self.models.values().cloned().collect();
        for model in &models {
            self.scan(model);
        }
        self.install_plugins();

        tracing::info!(
            "Researched {} models: {} registrations",
            self.models.len(),
            self.index.registrations(None).count()
        );
        Ok(())
    }

    /// Registers `model` at every indexed node it matches.
    fn scan(&mut self, model: &Arc<Model>) -> usize {
        self.index.clear_registrations(Some(model.name()));

        if model.matches(&self.data) {
            let err = ConfigError::InvalidRegistrationKey {
                model: model.name().to_string(),
                path: ConfigPath::root().to_string(),
            };
            tracing::debug!("{}", err);
            self.research_errors.push(err);
        }

        let matched: Vec<(ConfigPath, ConfigValue)> = self
            .index
            .iter()
            .filter(|(_, entry)| model.matches(entry.value()))
            .map(|(path, entry)| (path.clone(), entry.value().clone()))
            .collect();

        let mut registered = 0;
        for (path, value) in matched {
            let registration =
                ModelRegistration::new(model.clone(), path.clone(), value, self.options.registry);
            match self.index.attach(&path, registration) {
                Ok(()) => registered += 1,
                Err(e) => self.research_errors.push(e),
            }
        }
        tracing::debug!("Model '{}' matched {} paths", model.name(), registered);
        registered
    }

    /// Installs and researches the models declared by plugin declarations.
    fn install_plugins(&mut self) {
        let declarations: Vec<(ConfigPath, PluginDeclaration)> = self
            .index
            .registrations(Some(PLUGIN_MODEL_NAME))
            .filter_map(|(path, registration)| {
                let instance = match registration.instance(None, true) {
                    Ok(instance) => instance?,
                    Err(e) => {
                        tracing::warn!("Ignoring plugin declaration at '{}': {}", path, e);
                        return None;
                    }
                };
                let declaration = instance.downcast::<PluginDeclaration>().ok()?;
                Some((path.clone(), (*declaration).clone()))
            })
            .collect();

        for (path, declaration) in declarations {
            let compiled = declaration
                .resolve(self.resolver.as_ref())
                .and_then(|spec| spec.compile(self.validator.clone()));
            match compiled {
                Ok(model) => {
                    tracing::info!(
                        "Installed model '{}' declared at '{}'",
                        declaration.name,
                        path
                    );
                    let model = Arc::new(model);
                    self.models.insert(declaration.name.clone(), model.clone());
                    self.scan(&model);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to install model '{}' declared at '{}': {}",
                        declaration.name,
                        path,
                        e
                    );
                    self.research_errors.push(e);
                }
            }
        }
    }

    fn remerge(&mut self) -> Result<()> {
        self.refresh(RefreshPhases {
            research: self.options.research_models,
            ..RefreshPhases::remerge()
        })
    }

    /// Index of the first non-file source, where new file sources go.
    fn file_source_end(&self) -> usize {
        self.sources
            .iter()
            .position(|s| s.kind() != SourceKind::File)
            .unwrap_or(self.sources.len())
    }

    // ---- sources ------------------------------------------------------

    /// Discovers more files, merges them after the existing files and
    /// researches again.
    pub fn add_file_set(&mut self, set: FileSet) -> Result<()> {
        let known: HashSet<String> = self.sources.iter().map(|s| s.uri().to_string()).collect();
        let mut added: Vec<Source> = Vec::new();
        for path in self.discover(&set)? {
            let uri = path.display().to_string();
            if known.contains(&uri) || added.iter().any(|s| s.uri() == uri) {
                continue;
            }
            let mut source = Source::file(&path, set.root_path_for(&path));
            source.load(&self.parsers, &self.key_filter);
            added.push(source);
        }
        tracing::info!("Added {} file sources", added.len());

        let tail = self.sources.split_off(self.file_source_end());
        self.sources.extend(added);
        self.sources.extend(tail);
        self.file_sets.push(set);
        self.remerge()
    }

    /// Adds one file after the existing files, merges and researches again.
    ///
    /// A file already added under the same root path is rejected with
    /// [`ConfigError::SourceAlreadyAdded`] unless `overwrite` is set, which
    /// reloads it in place.
    pub fn add_source_file(
        &mut self,
        path: impl AsRef<Path>,
        root_path: Option<&str>,
        overwrite: bool,
    ) -> Result<()> {
        let path = absolute(path.as_ref());
        let uri = path.display().to_string();
        let root_path = root_path.map(str::to_string);
        let existing = self
            .sources
            .iter()
            .position(|s| s.uri() == uri && s.root_path() == root_path.as_deref());
        if existing.is_some() && !overwrite {
            return Err(ConfigError::SourceAlreadyAdded { uri });
        }

        let mut source = Source::file(&path, root_path.clone());
        source.load(&self.parsers, &self.key_filter);
        match existing {
            Some(i) => self.sources[i] = source,
            None => {
                let at = self.file_source_end();
                self.sources.insert(at, source);
            }
        }
        if !self
            .extra_files
            .iter()
            .any(|(p, r)| *p == path && *r == root_path)
        {
            self.extra_files.push((path, root_path));
        }
        self.remerge()
    }

    // ---- models -------------------------------------------------------

    /// Installs or replaces a model, and with `research` registers it at
    /// every matching node of the current tree.
    pub fn register_model(&mut self, spec: ModelSpec, research: bool) -> Result<Arc<Model>> {
        let name = spec.name().to_string();
        let model = Arc::new(spec.compile(self.validator.clone())?);
        if self.models.insert(name.clone(), model.clone()).is_some() {
            tracing::debug!("Replacing model '{}'", name);
        }
        self.explicit_models.insert(name.clone(), spec);
        self.index.clear_registrations(Some(&name));
        if research {
            self.scan(&model);
        }
        Ok(model)
    }

    /// Registers a model from a raw schema.
    ///
    /// Without a factory the instances are the matched values themselves.
    /// An existing model of the same name is only replaced with `replace`.
    pub fn register(
        &mut self,
        name: &str,
        schema: ConfigValue,
        factory: Option<Factory>,
        replace: bool,
    ) -> Result<Arc<Model>> {
        if !replace && self.models.contains_key(name) {
            return Err(ConfigError::ModelAlreadyRegistered {
                name: name.to_string(),
            });
        }
        let factory = factory.unwrap_or_else(identity_factory);
        self.register_model(ModelSpec::new(name, schema, factory), true)
    }

    fn require_model(&self, name: &str) -> Result<&Arc<Model>> {
        self.models
            .get(name)
            .ok_or_else(|| ConfigError::NoSuchModel {
                name: name.to_string(),
            })
    }

    /// Returns the config keys of every registration of `model`.
    pub fn list(&self, model: &str) -> Result<Vec<String>> {
        self.require_model(model)?;
        Ok(self
            .index
            .registrations(Some(model))
            .map(|(_, registration)| registration.key())
            .collect())
    }

    /// Merges `changes` into the params of the `model` registration whose
    /// config key is `config_key`, and into the tree at its path.
    ///
    /// Fails with [`ConfigError::ImmutableRegistryMutation`] unless the
    /// registry is mutable.
    pub fn update(&mut self, model: &str, config_key: &str, changes: Mapping) -> Result<ConfigValue> {
        self.require_model(model)?;
        if !self.options.registry.mutable {
            return Err(ConfigError::ImmutableRegistryMutation {
                model: model.to_string(),
            });
        }
        let candidates: Vec<Arc<ModelRegistration>> = self
            .index
            .registrations(Some(model))
            .filter(|(_, registration)| registration.key() == config_key)
            .map(|(_, registration)| registration.clone())
            .collect();
        let registration = expect_unique(candidates, config_key, true, |r| r.path().to_string())?
            .ok_or_else(|| ConfigError::AbsentMatch {
                pattern: config_key.to_string(),
            })?;

        let params = registration.update(&changes)?;
        self.write_back(registration.path(), params.clone());
        tracing::debug!("Updated '{}' registration at '{}'", model, registration.path());
        Ok(params)
    }

    /// Replaces the node at `path` and refreshes the index below it.
    fn write_back(&mut self, path: &ConfigPath, params: ConfigValue) {
        if let Some(node) = value_at_mut(&mut self.data, path) {
            *node = params;
        }
        self.index.sync_subtree(&self.data, path);
    }

    // ---- queries ------------------------------------------------------

    /// Starts a query for `pattern`.
    pub fn query(&self, pattern: &str) -> Query<'_> {
        Query::new(self, pattern)
    }

    /// Returns every `(path, value)` matching `pattern`, in path order.
    pub fn search(&self, pattern: &str, exact: bool) -> Result<Vec<(ConfigPath, ConfigValue)>> {
        Ok(self
            .query(pattern)
            .exact(exact)
            .matches()?
            .into_iter()
            .map(|(path, entry)| (path.clone(), entry.value().clone()))
            .collect())
    }

    /// Returns the value at the one path exactly matching `pattern`.
    pub fn value(&self, pattern: &str) -> Result<Option<ConfigValue>> {
        self.query(pattern).value()
    }

    /// Returns the values at every path exactly matching `pattern`.
    pub fn values(&self, pattern: &str) -> Result<Vec<ConfigValue>> {
        self.query(pattern).values()
    }

    /// Returns the sources contributing to every path matching `pattern`.
    pub fn srcs(&self, pattern: &str) -> Result<Vec<&Source>> {
        self.query(pattern).srcs()
    }

    /// Returns the instance registered at the one path matching `pattern`.
    pub fn obj(&self, pattern: &str, model: Option<&str>) -> Result<Option<Instance>> {
        let query = self.query(pattern);
        match model {
            Some(name) => query.model(name).obj(),
            None => query.obj(),
        }
    }

    /// Like [`Cfg::obj`], but hands the factory the live params.
    ///
    /// In a mutable registry, changes the factory makes to its params are
    /// written to the registration, the merged tree and the index. In an
    /// immutable registry this behaves exactly like [`Cfg::obj`].
    pub fn obj_mut(&mut self, pattern: &str, model: Option<&str>) -> Result<Option<Instance>> {
        let query = self.query(pattern);
        let registration = match model {
            Some(name) => query.model(name).fobj()?,
            None => query.fobj()?,
        };
        let Some(registration) = registration else {
            return Ok(None);
        };

        let (instance, changed) = registration.instance_with_changes(Some(&*self), false)?;
        if let Some(params) = changed {
            registration.replace_params(params.clone())?;
            self.write_back(registration.path(), params);
            tracing::debug!(
                "Factory of '{}' changed its params at '{}'",
                registration.model().name(),
                registration.path()
            );
        }
        Ok(instance)
    }

    /// Finds one instance across the registrations of one or all models.
    ///
    /// Candidates must have `config_key` as their key, when given, and
    /// contain every `vfilter` term in the text of some param. Plugin
    /// declarations are only considered when their model is named.
    pub fn mget(
        &self,
        config_key: Option<&str>,
        model: Option<&str>,
        vfilter: &[String],
        raise_absent: bool,
    ) -> Result<Option<Instance>> {
        if let Some(name) = model {
            self.require_model(name)?;
        }
        let candidates: Vec<&Arc<ModelRegistration>> = self
            .index
            .registrations(model)
            .map(|(_, registration)| registration)
            .filter(|r| model.is_some() || r.model().name() != PLUGIN_MODEL_NAME)
            .filter(|r| config_key.map_or(true, |key| r.key() == key))
            .filter(|r| r.matches_filter(vfilter))
            .collect();
        let pattern = config_key.unwrap_or("*");
        match expect_unique(candidates, pattern, raise_absent, |r| {
            format!("{}@{}", r.model().name(), r.path())
        })? {
            Some(registration) => registration.instance(Some(self), false),
            None => Ok(None),
        }
    }

    /// Returns the uris of the sources that contributed at exactly `path`.
    pub fn locate(&self, path: &ConfigPath) -> Vec<&str> {
        self.index
            .get(path)
            .map(|entry| {
                entry
                    .sources()
                    .iter()
                    .filter_map(|id| self.source(*id))
                    .map(Source::uri)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns a snapshot of models, patterns and sources.
    pub fn info(&self) -> CfgInfo {
        CfgInfo {
            models: self
                .models
                .keys()
                .map(|name| ModelInfo {
                    name: name.clone(),
                    instances: self
                        .index
                        .registrations(Some(name))
                        .map(|(_, r)| r.key())
                        .collect(),
                })
                .collect(),
            base_dirs: self.options.base_dirs.clone(),
            search_depth: self.options.search_depth,
            include: self.options.include.clone(),
            exclude: self.options.exclude.clone(),
            sources: self
                .sources
                .iter()
                .map(|s| SourceInfo {
                    uri: s.uri().to_string(),
                    parser: s.parser().map(str::to_string),
                    root_path: s.root_path().map(str::to_string),
                    error: s.error().map(|e| e.to_string()),
                })
                .collect(),
            failed: self.failed.iter().map(|e| e.to_string()).collect(),
            research_errors: self.research_errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    // ---- accessors ----------------------------------------------------

    /// Returns the merged tree; always a mapping.
    pub fn data(&self) -> &ConfigValue {
        &self.data
    }

    /// Returns the path index.
    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    /// Returns the sources in merge order.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Returns the source with `id`.
    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.0)
    }

    /// Returns the load failures of file sources.
    pub fn load_errors(&self) -> impl Iterator<Item = &ConfigError> {
        self.sources.iter().filter_map(Source::error)
    }

    /// Returns the sources rejected by the merge.
    pub fn failed(&self) -> &[ConfigError] {
        &self.failed
    }

    /// Returns the problems recorded by the last research pass.
    pub fn research_errors(&self) -> &[ConfigError] {
        &self.research_errors
    }

    /// Returns the installed model called `name`.
    pub fn model(&self, name: &str) -> Option<&Arc<Model>> {
        self.models.get(name)
    }

    /// Returns the names of the installed models.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Returns the options this `Cfg` was built with.
    pub fn options(&self) -> &CfgOptions {
        &self.options
    }
}

impl fmt::Debug for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cfg")
            .field("sources", &self.sources)
            .field("paths", &self.index.len())
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("failed", &self.failed.len())
            .finish()
    }
}

/// Builder for constructing a [`Cfg`].
///
/// # Examples
///
/// ```rust
/// use flange::adapters::EnvVarReader;
/// use flange::service::CfgBuilder;
/// use serde_json::json;
/// use std::collections::HashMap;
///
/// # fn main() -> flange::domain::Result<()> {
/// let mut env = HashMap::new();
/// env.insert("DB__HOST".to_string(), "db.internal".to_string());
///
/// let cfg = CfgBuilder::new()
///     .base_dirs(Vec::<String>::new())
///     .env_reader(EnvVarReader::with_values(env))
///     .init_data(json!({"db": {"port": 5432}}))
///     .build()?;
///
/// assert_eq!(cfg.value("db.host")?, Some(json!("db.internal")));
/// assert_eq!(cfg.value("db.port")?, Some(json!(5432)));
/// # Ok(())
/// # }
/// ```
pub struct CfgBuilder {
    options: CfgOptions,
    init_data: Option<ConfigValue>,
    files: Vec<(PathBuf, Option<String>)>,
    file_sets: Vec<FileSet>,
    models: Vec<ModelSpec>,
    walker: Option<Arc<dyn Walker>>,
    parsers: Option<Vec<Arc<dyn ConfigParser>>>,
    validator: Option<Arc<dyn Validator>>,
    resolver: Option<Arc<dyn Resolver>>,
    key_filter: Option<KeyFilter>,
    env_reader: Option<EnvVarReader>,
}

impl CfgBuilder {
    /// Creates a builder with the default options.
    pub fn new() -> Self {
        Self {
            options: CfgOptions::default(),
            init_data: None,
            files: Vec::new(),
            file_sets: Vec::new(),
            models: Vec::new(),
            walker: None,
            parsers: None,
            validator: None,
            resolver: None,
            key_filter: None,
            env_reader: None,
        }
    }

    /// Replaces all options.
    pub fn options(mut self, options: CfgOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the base directories of the primary file set.
    pub fn base_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.base_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the include patterns of the primary file set.
    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the exclude patterns of the primary file set.
    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the search depth of the primary file set.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.options.search_depth = depth;
        self
    }

    /// Grafts discovered files under `root`.
    pub fn root_path(mut self, root: impl Into<String>) -> Self {
        self.options.root_path = Some(root.into());
        self
    }

    /// Grafts each discovered file under its directory's name.
    pub fn root_path_from_dirname(mut self, enabled: bool) -> Self {
        self.options.root_path_from_dirname = enabled;
        self
    }

    /// Adds another file set after the primary one.
    pub fn file_set(mut self, set: FileSet) -> Self {
        self.file_sets.push(set);
        self
    }

    /// Adds one file, after every discovered file.
    pub fn file(mut self, path: impl AsRef<Path>, root_path: Option<String>) -> Self {
        self.files.push((absolute(path.as_ref()), root_path));
        self
    }

    /// Sets whether the process environment is a source.
    pub fn include_os_env(mut self, include: bool) -> Self {
        self.options.include_os_env = include;
        self
    }

    /// Grafts the environment under `root`.
    pub fn env_root_path(mut self, root: impl Into<String>) -> Self {
        self.options.env_root_path = Some(root.into());
        self
    }

    /// Only reads environment variables with `prefix`.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.env_prefix = Some(prefix.into());
        self
    }

    /// Sets whether environment variable names are lowercased.
    pub fn env_lowercase(mut self, enabled: bool) -> Self {
        self.options.env_lowercase = enabled;
        self
    }

    /// Reads the environment through `reader`.
    ///
    /// **Note**: This is primarily intended for tests, with
    /// [`EnvVarReader::with_values`].
    pub fn env_reader(mut self, reader: EnvVarReader) -> Self {
        self.env_reader = Some(reader);
        self
    }

    /// Sets the separator used to unflatten compound keys.
    pub fn unflatten_separator(mut self, separator: impl Into<String>) -> Self {
        self.options.unflatten_separator = separator.into();
        self
    }

    /// Sets whether research runs during construction.
    pub fn research_models(mut self, enabled: bool) -> Self {
        self.options.research_models = enabled;
        self
    }

    /// Sets the registry options of every registration.
    pub fn registry(mut self, options: RegistryOptions) -> Self {
        self.options.registry = options;
        self
    }

    /// Supplies data merged after every other source.
    pub fn init_data(mut self, data: ConfigValue) -> Self {
        self.init_data = Some(data);
        self
    }

    /// Registers a model in addition to the defaults.
    pub fn model(mut self, spec: ModelSpec) -> Self {
        self.models.push(spec);
        self
    }

    /// Replaces the file discovery collaborator.
    pub fn walker(mut self, walker: Arc<dyn Walker>) -> Self {
        self.walker = Some(walker);
        self
    }

    /// Replaces the format parsers, in fallback order.
    pub fn parsers(mut self, parsers: Vec<Arc<dyn ConfigParser>>) -> Self {
        self.parsers = Some(parsers);
        self
    }

    /// Replaces the schema validator.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Replaces the descriptor resolver used for plugin declarations.
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Replaces the key filter.
    pub fn key_filter(mut self, filter: KeyFilter) -> Self {
        self.key_filter = Some(filter);
        self
    }

    /// Builds the `Cfg`, running every phase.
    ///
    /// Unreadable files and conflicting sources do not fail the build; they
    /// are recorded on the `Cfg`. Invalid patterns and model schemas do.
    pub fn build(self) -> Result<Cfg> {
        let mut env_reader = self
            .env_reader
            .unwrap_or_default()
            .lowercase_keys(self.options.env_lowercase);
        if let Some(prefix) = &self.options.env_prefix {
            env_reader = env_reader.prefix(prefix.as_str());
        }

        let explicit_models = self
            .models
            .into_iter()
            .map(|spec| (spec.name().to_string(), spec))
            .collect();

        let mut cfg = Cfg {
            file_sets: self.file_sets,
            extra_files: self.files,
            init_data: self.init_data,
            explicit_models,
            sources: Vec::new(),
            data: ConfigValue::Object(Mapping::new()),
            index: PathIndex::new(),
            failed: Vec::new(),
            research_errors: Vec::new(),
            models: BTreeMap::new(),
            walker: self.walker.unwrap_or_else(|| Arc::new(GlobWalker::new())),
            parsers: self.parsers.unwrap_or_else(default_parsers),
            validator: self
                .validator
                .unwrap_or_else(|| Arc::new(JsonSchemaValidator::new())),
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(RegistryResolver::new())),
            key_filter: self.key_filter.unwrap_or_default(),
            env_reader,
            options: self.options,
        };

        cfg.install_models()?;
        cfg.refresh(RefreshPhases {
            research: cfg.options.research_models,
            ..RefreshPhases::all()
        })?;
        tracing::debug!("Built {:?}", cfg);
        Ok(cfg)
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}
