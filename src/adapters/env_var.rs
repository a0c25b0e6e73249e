// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process environment reader.
//!
//! This module reads the process environment into one flat mapping, which
//! becomes the `os_env` source. Nesting is expressed with the unflatten
//! separator (`DB__HOST=localhost`) and expanded by the merger.

use crate::domain::{ConfigValue, Mapping};
use std::collections::HashMap;
use std::env;

/// Maximum length for environment variable keys (prevents DoS)
const MAX_ENV_KEY_LEN: usize = 512;

/// Maximum length for environment variable values (prevents DoS)
const MAX_ENV_VALUE_LEN: usize = 1048576; // 1MB

/// Reads environment variables into a flat mapping.
///
/// Variables that are not valid Unicode or exceed the size limits are
/// skipped.
///
/// # Examples
///
/// ```rust
/// use flange::adapters::EnvVarReader;
/// use std::collections::HashMap;
///
/// let mut values = HashMap::new();
/// values.insert("APP_DB__HOST".to_string(), "localhost".to_string());
/// values.insert("HOME".to_string(), "/root".to_string());
///
/// let vars = EnvVarReader::with_values(values)
///     .prefix("APP_")
///     .lowercase_keys(true)
///     .read();
/// assert_eq!(vars.len(), 1);
/// assert_eq!(vars["db__host"], "localhost");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvVarReader {
    /// Optional prefix a variable must carry; it is stripped from the key
    prefix: Option<String>,
    /// Whether to convert keys to lowercase
    lowercase_keys: bool,
    /// Fixed variables used instead of the process environment
    values: Option<HashMap<String, String>>,
}

impl EnvVarReader {
    /// Creates a reader over the whole process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a reader over fixed values instead of the process environment.
    ///
    /// **Note**: This is primarily intended for tests.
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self {
            values: Some(values),
            ..Self::default()
        }
    }

    /// Only reads variables starting with `prefix`, and strips it.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Sets whether to convert keys to lowercase.
    pub fn lowercase_keys(mut self, enabled: bool) -> Self {
        self.lowercase_keys = enabled;
        self
    }

    /// Reads the variables.
    pub fn read(&self) -> Mapping {
        let vars: Vec<(String, String)> = match &self.values {
            Some(values) => values.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        };

        let mut sorted: Vec<(String, String)> = vars
            .into_iter()
            .filter_map(|(key, value)| self.accept(key, value))
            .collect();
        sorted.sort();

        let mapping: Mapping = sorted
            .into_iter()
            .map(|(k, v)| (k, ConfigValue::String(v)))
            .collect();
        tracing::debug!("Read {} environment variables", mapping.len());
        mapping
    }

    fn accept(&self, key: String, value: String) -> Option<(String, String)> {
        // Validate input sizes to prevent DoS
        if key.len() > MAX_ENV_KEY_LEN || value.len() > MAX_ENV_VALUE_LEN {
            tracing::debug!(
                "Skipping oversized environment variable: key_len={}, value_len={} (max key={}, max value={})",
                key.len(),
                value.len(),
                MAX_ENV_KEY_LEN,
                MAX_ENV_VALUE_LEN
            );
            return None;
        }

        let key = match &self.prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str())?.to_string(),
            None => key,
        };
        if key.is_empty() {
            return None;
        }

        let key = if self.lowercase_keys {
            key.to_lowercase()
        } else {
            key
        };
        Some((key, value))
    }
}
