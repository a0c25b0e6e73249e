// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shell-style env-file parser.

use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;

/// Parser for `KEY=value` env files, as read by `dotenvy`.
///
/// Keys are kept as written; compound keys such as `DB__HOST` are expanded
/// later by the merger.
#[derive(Debug, Clone, Default)]
pub struct EnvFileParser;

impl EnvFileParser {
    /// Creates a new env-file parser.
    pub fn new() -> Self {
        EnvFileParser
    }
}

impl ConfigParser for EnvFileParser {
    fn name(&self) -> &str {
        "env"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        let mut map = Mapping::new();
        for item in dotenvy::from_read_iter(content.as_bytes()) {
            let (key, value) = item.map_err(|e| ConfigError::parse("env file", e))?;
            map.insert(key, ConfigValue::String(value));
        }
        Ok(ConfigValue::Object(map))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["env"]
    }
}
