// SPDX-License-Identifier: MIT OR Apache-2.0

//! Format parsers.
//!
//! One [`ConfigParser`] per supported format. [`default_parsers`] returns them
//! in the order used to detect the format of files whose extension no parser
//! claims.

pub mod ini;
pub mod json;
pub mod properties;

#[cfg(feature = "env")]
pub mod env_file;
#[cfg(feature = "toml")]
pub mod toml;
#[cfg(feature = "xml")]
pub mod xml;
#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "env")]
pub use env_file::EnvFileParser;
pub use ini::IniParser;
pub use json::JsonParser;
pub use properties::PropertiesParser;
#[cfg(feature = "toml")]
pub use self::toml::TomlParser;
#[cfg(feature = "xml")]
pub use xml::XmlParser;
#[cfg(feature = "yaml")]
pub use yaml::YamlParser;

use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;
use std::sync::Arc;

/// Accepts a mapping document root; an empty document is an empty mapping.
pub(crate) fn document_root(value: ConfigValue) -> Result<ConfigValue> {
    match value {
        ConfigValue::Object(_) => Ok(value),
        ConfigValue::Null => Ok(ConfigValue::Object(Mapping::new())),
        _ => Err(ConfigError::parse_message(
            "Failed to parse configuration: document root is not a mapping",
        )),
    }
}

/// Returns every compiled-in parser, in detection order: xml, yaml, json,
/// toml, ini, env, properties.
pub fn default_parsers() -> Vec<Arc<dyn ConfigParser>> {
    let mut parsers: Vec<Arc<dyn ConfigParser>> = Vec::new();
    #[cfg(feature = "xml")]
    parsers.push(Arc::new(xml::XmlParser::new()));
    #[cfg(feature = "yaml")]
    parsers.push(Arc::new(yaml::YamlParser::new()));
    parsers.push(Arc::new(json::JsonParser::new()));
    #[cfg(feature = "toml")]
    parsers.push(Arc::new(self::toml::TomlParser::new()));
    parsers.push(Arc::new(ini::IniParser::new()));
    #[cfg(feature = "env")]
    parsers.push(Arc::new(env_file::EnvFileParser::new()));
    parsers.push(Arc::new(properties::PropertiesParser::new()));
    parsers
}
