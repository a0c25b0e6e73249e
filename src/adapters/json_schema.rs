// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON Schema validation adapter.

use crate::domain::{ConfigError, ConfigValue, Result};
use crate::ports::{Matcher, Validator};
use std::sync::Arc;

/// Validates values against JSON Schema documents with `jsonschema`.
///
/// Schemas are compiled once per model; an invalid schema is rejected when
/// the model is registered rather than failing every match.
///
/// # Examples
///
/// ```rust
/// use flange::adapters::JsonSchemaValidator;
/// use flange::ports::Validator;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let schema = json!({"type": "object", "required": ["name", "level"]});
/// let matcher = Arc::new(JsonSchemaValidator::new()).compile(&schema).unwrap();
/// assert!(matcher(&json!({"name": "log", "level": "DEBUG"})));
/// assert!(!matcher(&json!({"name": "log"})));
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaValidator;

impl JsonSchemaValidator {
    /// Creates a new validator.
    pub fn new() -> Self {
        JsonSchemaValidator
    }

    fn build(schema: &ConfigValue) -> Result<jsonschema::Validator> {
        jsonschema::validator_for(schema).map_err(|e| ConfigError::InvalidSchema {
            model: String::new(),
            message: e.to_string(),
        })
    }
}

impl Validator for JsonSchemaValidator {
    fn validate(&self, schema: &ConfigValue, value: &ConfigValue) -> bool {
        Self::build(schema)
            .map(|validator| validator.is_valid(value))
            .unwrap_or(false)
    }

    fn check_schema(&self, schema: &ConfigValue) -> Result<()> {
        Self::build(schema).map(|_| ())
    }

    fn compile(self: Arc<Self>, schema: &ConfigValue) -> Result<Matcher> {
        let validator = Self::build(schema)?;
        Ok(Arc::new(move |value: &ConfigValue| validator.is_valid(value)))
    }
}
