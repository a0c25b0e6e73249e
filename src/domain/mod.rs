// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain layer containing core business logic and types.
//!
//! Everything here is independent of how sources are found, decoded or
//! validated: paths and values, the key filter, sources, the merger, the path
//! index, search, and models.

pub mod config_path;
pub mod config_value;
pub mod errors;
pub mod index;
pub mod key_filter;
pub mod merge;
pub mod model;
pub mod search;
pub mod source;

// Re-export commonly used types
pub use config_path::{ConfigPath, PathKey};
pub use config_value::{ConfigValue, Mapping};
pub use errors::{BoxError, ConfigError, Result};
pub use index::{IndexEntry, PathIndex};
pub use key_filter::KeyFilter;
pub use merge::{MergeOutcome, Merger};
pub use model::{
    factory, factory_fn, BuildContext, Factory, Instance, Model, ModelRegistration, ModelSpec,
    NamedLogger, PluginDeclaration, RegistryOptions,
};
pub use model::register_default_model;
pub use search::PathPattern;
pub use source::{Source, SourceId, SourceKind};
