// SPDX-License-Identifier: MIT OR Apache-2.0

//! Models: schema-recognized fragments of configuration that build objects.
//!
//! A [`ModelSpec`] pairs a schema with a [`Factory`]. Once compiled against a
//! [`Validator`] it becomes a [`Model`], which the research pass tests against
//! every node of the merged tree. Each match is wrapped in a
//! [`ModelRegistration`] that builds its instance lazily and caches it.
//!
//! Two models are built in:
//!
//! - the plugin model ([`PLUGIN_MODEL_NAME`]) recognizes declarations of new
//!   models inside the configuration itself, see [`PluginDeclaration`];
//! - the `logger` model builds a [`NamedLogger`] from `{name, level}`.
//!
//! Further process-wide defaults can be added with [`register_default_model`].

use crate::domain::config_path::ConfigPath;
use crate::domain::config_value::{contains_text, decode, ConfigValue, Mapping};
use crate::domain::errors::{BoxError, ConfigError, Result};
use crate::ports::{Matcher, Resolved, Resolver, Validator};
use crate::service::Cfg;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::any::Any;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// A constructed model instance. Downcast it to the factory's concrete type.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// What a factory receives when asked to build an instance.
pub struct BuildContext<'a> {
    /// The matched configuration fragment.
    pub params: ConfigValue,
    /// The path of the match in the merged tree.
    pub path: &'a ConfigPath,
    /// The owning configuration, for models that asked to have it injected.
    pub cfg: Option<&'a Cfg>,
}

/// Builds an instance from a matched fragment.
pub type Factory =
    Arc<dyn Fn(&mut BuildContext<'_>) -> std::result::Result<Instance, BoxError> + Send + Sync>;

/// Wraps a closure into a [`Factory`].
pub fn factory<F>(build: F) -> Factory
where
    F: Fn(&mut BuildContext<'_>) -> std::result::Result<Instance, BoxError> + Send + Sync + 'static,
{
    Arc::new(build)
}

/// Wraps a plain constructor over the params into a [`Factory`].
///
/// # Examples
///
/// ```
/// use flange::domain::model::factory_fn;
///
/// let factory = factory_fn(|params| {
///     let host = params["host"].as_str().unwrap_or("localhost").to_string();
///     Ok(host)
/// });
/// # let _ = factory;
/// ```
pub fn factory_fn<T, F>(build: F) -> Factory
where
    T: Any + Send + Sync,
    F: Fn(ConfigValue) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
{
    factory(move |ctx| build(ctx.params.clone()).map(|built| Arc::new(built) as Instance))
}

/// A factory whose instance is the matched value itself.
pub fn identity_factory() -> Factory {
    factory(|ctx| Ok(Arc::new(ctx.params.clone()) as Instance))
}

/// The uncompiled declaration of a model.
#[derive(Clone)]
pub struct ModelSpec {
    name: String,
    schema: ConfigValue,
    factory: Factory,
    inject_self: bool,
}

impl ModelSpec {
    /// Creates a model declaration.
    pub fn new(name: impl Into<String>, schema: ConfigValue, factory: Factory) -> Self {
        Self {
            name: name.into(),
            schema,
            factory,
            inject_self: false,
        }
    }

    /// Declares a model whose instances are the matched values.
    pub fn identity(name: impl Into<String>, schema: ConfigValue) -> Self {
        Self::new(name, schema, identity_factory())
    }

    /// Sets whether the factory receives the owning `Cfg`.
    pub fn inject_self(mut self, inject: bool) -> Self {
        self.inject_self = inject;
        self
    }

    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema.
    pub fn schema(&self) -> &ConfigValue {
        &self.schema
    }

    /// Compiles the schema with `validator` into a [`Model`].
    pub fn compile(&self, validator: Arc<dyn Validator>) -> Result<Model> {
        let matcher = validator
            .compile(&self.schema)
            .map_err(|e| match e {
                ConfigError::InvalidSchema { message, .. } => ConfigError::InvalidSchema {
                    model: self.name.clone(),
                    message,
                },
                other => ConfigError::InvalidSchema {
                    model: self.name.clone(),
                    message: other.to_string(),
                },
            })?;
        Ok(Model {
            name: self.name.clone(),
            schema: self.schema.clone(),
            matcher,
            factory: self.factory.clone(),
            inject_self: self.inject_self,
        })
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("name", &self.name)
            .field("inject_self", &self.inject_self)
            .finish()
    }
}

/// A compiled recognizer and constructor pair.
pub struct Model {
    name: String,
    schema: ConfigValue,
    matcher: Matcher,
    factory: Factory,
    inject_self: bool,
}

impl Model {
    /// Returns the model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema the model was compiled from.
    pub fn schema(&self) -> &ConfigValue {
        &self.schema
    }

    /// Returns `true` if instances receive the owning `Cfg`.
    pub fn injects_self(&self) -> bool {
        self.inject_self
    }

    /// Returns `true` if `value` satisfies the model's schema.
    pub fn matches(&self, value: &ConfigValue) -> bool {
        (self.matcher)(value)
    }

    #[cfg(test)]
    pub(crate) fn accepting_all(name: &str) -> Self {
        Model {
            name: name.to_string(),
            schema: json!({}),
            matcher: Arc::new(|_: &ConfigValue| true),
            factory: identity_factory(),
            inject_self: false,
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Model {}>", self.name)
    }
}

/// How registrations of a registry hold their params and instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// Keep the first built instance and return it on every call.
    pub cache: bool,
    /// Allow updates to params. Changes a factory makes to its params reach
    /// the merged tree when the instance is built through `Cfg::obj_mut`.
    pub mutable: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            cache: true,
            mutable: false,
        }
    }
}

#[derive(Default)]
struct RegistrationState {
    params: ConfigValue,
    cached: Option<Instance>,
    cached_since: Option<DateTime<Utc>>,
    last_error: Option<Arc<dyn Error + Send + Sync>>,
}

/// A model bound to one matched value of the merged tree.
pub struct ModelRegistration {
    model: Arc<Model>,
    path: ConfigPath,
    options: RegistryOptions,
    state: Mutex<RegistrationState>,
}

impl ModelRegistration {
    /// Creates a registration of `model` at `path` with its own copy of `params`.
    pub fn new(
        model: Arc<Model>,
        path: ConfigPath,
        params: ConfigValue,
        options: RegistryOptions,
    ) -> Self {
        Self {
            model,
            path,
            options,
            state: Mutex::new(RegistrationState {
                params,
                ..RegistrationState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistrationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the registered model.
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Returns where in the merged tree the match was found.
    pub fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Returns the config key: the last segment of the path.
    pub fn key(&self) -> String {
        self.path.last().map(|k| k.text().into_owned()).unwrap_or_default()
    }

    /// Returns the registry options this registration was created with.
    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Returns a copy of the stored params.
    pub fn params(&self) -> ConfigValue {
        self.lock().params.clone()
    }

    /// Returns when the cached instance was built.
    pub fn cached_since(&self) -> Option<DateTime<Utc>> {
        self.lock().cached_since
    }

    /// Returns the error of the last failed construction.
    pub fn last_error(&self) -> Option<Arc<dyn Error + Send + Sync>> {
        self.lock().last_error.clone()
    }

    /// Returns `true` if an instance is cached.
    pub fn is_cached(&self) -> bool {
        self.lock().cached.is_some()
    }

    /// Returns `true` if every term occurs in the text of some leaf of the params.
    pub fn matches_filter(&self, terms: &[String]) -> bool {
        let state = self.lock();
        terms.iter().all(|term| contains_text(&state.params, term))
    }

    /// Returns the instance, building it on first use.
    ///
    /// The factory works on a copy of the params; changes it makes are
    /// dropped. Use [`ModelRegistration::instance_with_changes`] to collect
    /// them.
    ///
    /// A factory failure is stored as [`ModelRegistration::last_error`]. With
    /// `reraise` it is returned as [`ConfigError::FactoryConstruction`];
    /// otherwise the result is `Ok(None)`.
    pub fn instance(&self, cfg: Option<&Cfg>, reraise: bool) -> Result<Option<Instance>> {
        self.construct(cfg, reraise).map(|(instance, _)| instance)
    }

    /// Like [`ModelRegistration::instance`], but in a mutable registry also
    /// returns the params as the factory left them, if it changed them.
    ///
    /// The stored params are not touched; the caller decides where the
    /// changes go (see [`ModelRegistration::replace_params`]).
    pub fn instance_with_changes(
        &self,
        cfg: Option<&Cfg>,
        reraise: bool,
    ) -> Result<(Option<Instance>, Option<ConfigValue>)> {
        self.construct(cfg, reraise)
    }

    fn construct(
        &self,
        cfg: Option<&Cfg>,
        reraise: bool,
    ) -> Result<(Option<Instance>, Option<ConfigValue>)> {
        let params = {
            let state = self.lock();
            if self.options.cache {
                if let Some(cached) = &state.cached {
                    return Ok((Some(cached.clone()), None));
                }
            }
            state.params.clone()
        };

        let mut ctx = BuildContext {
            params: params.clone(),
            path: &self.path,
            cfg: if self.model.inject_self { cfg } else { None },
        };
        let built = (self.model.factory)(&mut ctx);
        let changed = (self.options.mutable && ctx.params != params).then_some(ctx.params);

        let mut state = self.lock();
        match built {
            Ok(instance) => {
                if self.options.cache {
                    if let Some(cached) = &state.cached {
                        return Ok((Some(cached.clone()), None));
                    }
                    state.cached = Some(instance.clone());
                }
                state.cached_since = Some(Utc::now());
                state.last_error = None;
                tracing::debug!("Built '{}' instance at '{}'", self.model.name, self.path);
                Ok((Some(instance), changed))
            }
            Err(e) => {
                let error: Arc<dyn Error + Send + Sync> = Arc::from(e);
                tracing::warn!(
                    "Factory for model '{}' failed at '{}': {}",
                    self.model.name,
                    self.path,
                    error
                );
                state.last_error = Some(error.clone());
                if reraise {
                    Err(ConfigError::FactoryConstruction {
                        model: self.model.name.clone(),
                        path: self.path.to_string(),
                        source: error,
                    })
                } else {
                    Ok((None, changed))
                }
            }
        }
    }

    /// Replaces the stored params, keeping any cached instance.
    ///
    /// Fails with [`ConfigError::ImmutableRegistryMutation`] unless the
    /// registry is mutable.
    pub fn replace_params(&self, params: ConfigValue) -> Result<()> {
        if !self.options.mutable {
            return Err(ConfigError::ImmutableRegistryMutation {
                model: self.model.name.clone(),
            });
        }
        self.lock().params = params;
        Ok(())
    }

    /// Merges `changes` into the params and returns the updated params.
    ///
    /// The cached instance is dropped so the next call rebuilds it.
    pub fn update(&self, changes: &Mapping) -> Result<ConfigValue> {
        if !self.options.mutable {
            return Err(ConfigError::ImmutableRegistryMutation {
                model: self.model.name.clone(),
            });
        }
        let mut state = self.lock();
        if !state.params.is_object() {
            state.params = ConfigValue::Object(Mapping::new());
        }
        if let ConfigValue::Object(params) = &mut state.params {
            for (key, value) in changes {
                params.insert(key.clone(), value.clone());
            }
        }
        state.cached = None;
        state.cached_since = None;
        Ok(state.params.clone())
    }
}

impl fmt::Debug for ModelRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        write!(
            f,
            "<ModelRegistration {} at {} cached={} since={:?} error={:?}>",
            self.model.name,
            self.path,
            state.cached.is_some(),
            state.cached_since,
            state.last_error.as_ref().map(|e| e.to_string())
        )
    }
}

/// Name of the built-in model that recognizes plugin declarations.
pub const PLUGIN_MODEL_NAME: &str = "flange_plugin";

/// The `type` value that marks a mapping as a plugin declaration.
pub const PLUGIN_TYPE_MARKER: &str = "FLANGE.TYPE.PLUGIN";

/// Returns the schema of plugin declarations.
pub fn plugin_schema() -> ConfigValue {
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "type": {"const": PLUGIN_TYPE_MARKER},
            "schema": {"oneOf": [{"type": "string"}, {"type": "object"}]},
            "factory": {"type": "string"},
            "inject": {"enum": ["flange", true, false]}
        },
        "required": ["name", "type", "schema", "factory"]
    })
}

/// A model declared inside the configuration.
///
/// ```yaml
/// db_model:
///   name: db
///   type: FLANGE.TYPE.PLUGIN
///   schema: rust://models/db.schema
///   factory: rust://models/db.connect
///   inject: flange
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginDeclaration {
    /// Name of the declared model.
    pub name: String,
    /// An inline schema, or a descriptor naming one.
    pub schema: ConfigValue,
    /// A descriptor naming the factory.
    pub factory: String,
    /// `"flange"` or `true` to inject the owning `Cfg` into the factory.
    #[serde(default)]
    pub inject: Option<ConfigValue>,
}

impl PluginDeclaration {
    /// Returns `true` if the declared model asks for the owning `Cfg`.
    pub fn injects_self(&self) -> bool {
        match &self.inject {
            Some(ConfigValue::Bool(flag)) => *flag,
            Some(ConfigValue::String(s)) => s == "flange",
            _ => false,
        }
    }

    /// Resolves the schema and factory descriptors into a [`ModelSpec`].
    pub fn resolve(&self, resolver: &dyn Resolver) -> Result<ModelSpec> {
        let schema = match &self.schema {
            ConfigValue::String(descriptor) => match resolver.resolve(descriptor)? {
                Resolved::Schema(schema) => schema,
                other => return Err(unexpected(descriptor, "schema", &other)),
            },
            inline => inline.clone(),
        };
        let factory = match resolver.resolve(&self.factory)? {
            Resolved::Factory(factory) => factory,
            other => return Err(unexpected(&self.factory, "factory", &other)),
        };
        Ok(ModelSpec::new(self.name.clone(), schema, factory).inject_self(self.injects_self()))
    }
}

fn unexpected(descriptor: &str, wanted: &str, got: &Resolved) -> ConfigError {
    ConfigError::Resolve {
        descriptor: descriptor.to_string(),
        message: format!("expected a {}, found a {}", wanted, got.kind()),
    }
}

/// The plugin model. Its instances are the decoded [`PluginDeclaration`]s.
pub fn plugin_model_spec() -> ModelSpec {
    let build = factory(|ctx| {
        let declaration: PluginDeclaration = decode(&ctx.params, ctx.path)?;
        Ok(Arc::new(declaration) as Instance)
    });
    ModelSpec::new(PLUGIN_MODEL_NAME, plugin_schema(), build)
}

/// Name of the built-in logger model.
pub const LOGGER_MODEL_NAME: &str = "logger";

const LOG_LEVELS: [&str; 5] = ["CRITICAL", "ERROR", "WARNING", "INFO", "DEBUG"];

/// Returns the schema of logger declarations.
pub fn logger_schema() -> ConfigValue {
    let levels: Vec<String> = LOG_LEVELS
        .iter()
        .flat_map(|l| [l.to_string(), l.to_lowercase()])
        .collect();
    json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "level": {"enum": levels},
            "format": {"type": "string"},
            "handler": {"type": "string"}
        },
        "required": ["name", "level"]
    })
}

#[derive(Deserialize)]
struct LoggerParams {
    name: String,
    level: String,
    #[serde(default)]
    format: Option<String>,
}

/// A logger built from configuration. Events go through `tracing`, tagged
/// with the logger's name, and are dropped below the configured level.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLogger {
    name: String,
    level: tracing::Level,
    format: Option<String>,
}

impl NamedLogger {
    /// Creates a logger.
    pub fn new(name: impl Into<String>, level: tracing::Level) -> Self {
        Self {
            name: name.into(),
            level,
            format: None,
        }
    }

    /// Returns the logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the most verbose level that is emitted.
    pub fn level(&self) -> tracing::Level {
        self.level
    }

    /// Returns the configured format string, if any.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Returns `true` if events at `level` are emitted.
    pub fn enabled(&self, level: tracing::Level) -> bool {
        level <= self.level
    }

    /// Emits `message` at `level`.
    pub fn log(&self, level: tracing::Level, message: &str) {
        if !self.enabled(level) {
            return;
        }
        match level {
            tracing::Level::ERROR => tracing::error!(logger = %self.name, "{}", message),
            tracing::Level::WARN => tracing::warn!(logger = %self.name, "{}", message),
            tracing::Level::INFO => tracing::info!(logger = %self.name, "{}", message),
            tracing::Level::DEBUG => tracing::debug!(logger = %self.name, "{}", message),
            _ => tracing::trace!(logger = %self.name, "{}", message),
        }
    }

    /// Emits at error level.
    pub fn error(&self, message: &str) {
        self.log(tracing::Level::ERROR, message);
    }

    /// Emits at warn level.
    pub fn warn(&self, message: &str) {
        self.log(tracing::Level::WARN, message);
    }

    /// Emits at info level.
    pub fn info(&self, message: &str) {
        self.log(tracing::Level::INFO, message);
    }

    /// Emits at debug level.
    pub fn debug(&self, message: &str) {
        self.log(tracing::Level::DEBUG, message);
    }
}

fn parse_level(level: &str) -> std::result::Result<tracing::Level, BoxError> {
    match level.to_ascii_uppercase().as_str() {
        "CRITICAL" | "ERROR" => Ok(tracing::Level::ERROR),
        "WARNING" | "WARN" => Ok(tracing::Level::WARN),
        "INFO" => Ok(tracing::Level::INFO),
        "DEBUG" => Ok(tracing::Level::DEBUG),
        other => Err(format!("unknown log level '{}'", other).into()),
    }
}

/// The built-in logger model.
pub fn logger_model_spec() -> ModelSpec {
    let build = factory(|ctx| {
        let params: LoggerParams = decode(&ctx.params, ctx.path)?;
        let logger = NamedLogger {
            level: parse_level(&params.level)?,
            name: params.name,
            format: params.format,
        };
        Ok(Arc::new(logger) as Instance)
    });
    ModelSpec::new(LOGGER_MODEL_NAME, logger_schema(), build)
}

static DEFAULT_MODELS: Lazy<RwLock<BTreeMap<String, ModelSpec>>> = Lazy::new(|| {
    let mut models = BTreeMap::new();
    models.insert(LOGGER_MODEL_NAME.to_string(), logger_model_spec());
    RwLock::new(models)
});

/// Adds or replaces a model used by every `Cfg` built afterwards.
pub fn register_default_model(spec: ModelSpec) {
    tracing::debug!("Registering default model '{}'", spec.name());
    DEFAULT_MODELS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(spec.name().to_string(), spec);
}

/// Returns the process-wide default models.
pub fn default_models() -> Vec<ModelSpec> {
    DEFAULT_MODELS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .cloned()
        .collect()
}
