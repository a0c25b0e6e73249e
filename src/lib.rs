// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration aggregation with path indexing and schema-driven
//! model discovery.
//!
//! A [`Cfg`](service::Cfg) gathers configuration from files found under a
//! set of base directories, the process environment and caller-supplied
//! data, and merges them into one tree. Every node of the tree is indexed
//! with the sources that contributed to it, and can be found by path
//! pattern. Fragments that satisfy a registered schema ("models") are turned
//! into objects on demand.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain Layer**: paths, values, sources, merging, the path index,
//!   search and models
//! - **Ports**: the collaborator traits (`ConfigParser`, `Validator`,
//!   `Resolver`, `Walker`)
//! - **Adapters**: format parsers, the environment reader, the JSON Schema
//!   validator, the resolver table and the filesystem walker
//! - **Service**: the `Cfg` façade that orchestrates everything
//!
//! # Precedence
//!
//! Sources merge in order and later sources win: discovered files, then the
//! environment, then init data. Mappings merge key by key; anything else is
//! replaced whole. Environment keys are split on `__`, so `DB__HOST`
//! overrides `db.host`.
//!
//! # Feature Flags
//!
//! - `yaml`: YAML files (default)
//! - `toml`: TOML files (default)
//! - `xml`: XML files (default)
//! - `env`: shell-style env files (default)
//! - `full`: all of the above
//!
//! JSON, INI and Java properties files are always supported.
//!
//! # Quick Start
//!
//! ```rust
//! use flange::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> Result<()> {
//! let cfg = Cfg::from_data(json!({
//!     "db": {"host": "localhost", "port": 5432},
//!     "applog": {"name": "app", "level": "INFO"}
//! }))?;
//!
//! assert_eq!(cfg.value("db.port")?, Some(json!(5432)));
//! assert_eq!(cfg.search("hos", false)?.len(), 1);
//!
//! let logger = cfg.query("applog").obj_as::<NamedLogger>()?.unwrap();
//! logger.info("configured");
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Commonly used types and traits.
///
/// This module re-exports the most commonly used types and traits for convenient access.
pub mod prelude {
    pub use crate::domain::{
        factory, factory_fn, ConfigError, ConfigPath, ConfigValue, Instance, Mapping, ModelSpec,
        NamedLogger, RegistryOptions, Result,
    };
    pub use crate::ports::{ConfigParser, Resolver, Validator, Walker};
    pub use crate::service::{Cfg, CfgBuilder, CfgOptions, FileSet, RefreshPhases};
}
