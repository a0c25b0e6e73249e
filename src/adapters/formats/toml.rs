// SPDX-License-Identifier: MIT OR Apache-2.0

//! TOML parser.

use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;

/// TOML parser implementation. Datetimes become strings.
#[derive(Debug, Clone, Default)]
pub struct TomlParser;

impl TomlParser {
    /// Creates a new TOML parser.
    pub fn new() -> Self {
        TomlParser
    }

    fn convert(value: toml::Value) -> ConfigValue {
        match value {
            toml::Value::String(s) => ConfigValue::String(s),
            toml::Value::Integer(i) => ConfigValue::from(i),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(ConfigValue::Number)
                .unwrap_or_else(|| ConfigValue::String(f.to_string())),
            toml::Value::Boolean(b) => ConfigValue::Bool(b),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
            toml::Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(Self::convert).collect())
            }
            toml::Value::Table(table) => Self::convert_table(table),
        }
    }

    fn convert_table(table: toml::Table) -> ConfigValue {
        let map: Mapping = table
            .into_iter()
            .map(|(k, v)| (k, Self::convert(v)))
            .collect();
        ConfigValue::Object(map)
    }
}

impl ConfigParser for TomlParser {
    fn name(&self) -> &str {
        "toml"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::parse("TOML", e))?;
        Ok(Self::convert_table(table))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["toml"]
    }
}
