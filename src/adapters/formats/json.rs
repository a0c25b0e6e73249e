// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON parser.

use super::document_root;
use crate::domain::{ConfigError, ConfigValue, Result};
use crate::ports::ConfigParser;

/// JSON parser implementation.
#[derive(Debug, Clone, Default)]
pub struct JsonParser;

impl JsonParser {
    /// Creates a new JSON parser.
    pub fn new() -> Self {
        JsonParser
    }
}

impl ConfigParser for JsonParser {
    fn name(&self) -> &str {
        "json"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        if content.trim().is_empty() {
            return document_root(ConfigValue::Null);
        }
        let value: ConfigValue =
            serde_json::from_str(content).map_err(|e| ConfigError::parse("JSON", e))?;
        document_root(value)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["json"]
    }
}
