// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema validation port.
//!
//! Models recognize configuration fragments by validating them against a
//! schema. The engine never interprets schema internals itself; it hands the
//! schema and the candidate value to a [`Validator`].

use crate::domain::{ConfigValue, Result};
use std::sync::Arc;

/// A compiled predicate over configuration values.
pub type Matcher = Arc<dyn Fn(&ConfigValue) -> bool + Send + Sync>;

/// A trait for schema validation engines.
///
/// # Examples
///
/// ```rust
/// use flange::ports::Validator;
/// use flange::domain::ConfigValue;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// /// Accepts mappings that hold every key listed in the schema's `keys` array.
/// struct RequiredKeys;
///
/// impl Validator for RequiredKeys {
///     fn validate(&self, schema: &ConfigValue, value: &ConfigValue) -> bool {
///         let Some(map) = value.as_object() else { return false };
///         schema["keys"]
///             .as_array()
///             .map_or(false, |keys| keys.iter().all(|k| k.as_str().map_or(false, |k| map.contains_key(k))))
///     }
/// }
///
/// let matcher = Arc::new(RequiredKeys).compile(&json!({"keys": ["host"]})).unwrap();
/// assert!(matcher(&json!({"host": "db"})));
/// assert!(!matcher(&json!({"port": 1})));
/// ```
pub trait Validator: Send + Sync + 'static {
    /// Returns `true` if `value` satisfies `schema`.
    fn validate(&self, schema: &ConfigValue, value: &ConfigValue) -> bool;

    /// Checks that `schema` is usable, before any value is validated.
    fn check_schema(&self, _schema: &ConfigValue) -> Result<()> {
        Ok(())
    }

    /// Compiles `schema` into a reusable predicate.
    ///
    /// The default implementation checks the schema and then defers to
    /// [`Validator::validate`] on every call. Engines with a compilation step
    /// should override it.
    fn compile(self: Arc<Self>, schema: &ConfigValue) -> Result<Matcher> {
        self.check_schema(schema)?;
        let schema = schema.clone();
        Ok(Arc::new(move |value: &ConfigValue| self.validate(&schema, value)))
    }
}
