// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapters layer containing the default collaborator implementations.
//!
//! This module contains concrete implementations of the traits defined in
//! the ports layer: one parser per format, the JSON Schema validator, the
//! table-backed resolver and the glob walker. The environment reader feeds
//! the `os_env` source.

pub mod env_var;
pub mod formats;
pub mod glob_walker;
pub mod json_schema;
pub mod registry_resolver;

pub use env_var::EnvVarReader;
pub use formats::{default_parsers, IniParser, JsonParser, PropertiesParser};
pub use glob_walker::GlobWalker;
pub use json_schema::JsonSchemaValidator;
pub use registry_resolver::RegistryResolver;

#[cfg(feature = "env")]
pub use formats::EnvFileParser;
#[cfg(feature = "toml")]
pub use formats::TomlParser;
#[cfg(feature = "xml")]
pub use formats::XmlParser;
#[cfg(feature = "yaml")]
pub use formats::YamlParser;
