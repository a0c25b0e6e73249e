// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the configuration crate.
//!
//! Structural failures (a source that cannot be parsed, a source that cannot be
//! merged) are normally recovered and recorded on the `Cfg`; the variants for
//! them exist so the recorded failures can be inspected. Query failures are
//! returned to the caller. All errors use `thiserror`.

use std::sync::Arc;
use thiserror::Error;

/// A boxed error as produced by model factories and collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for configuration operations.
///
/// It is marked as `#[non_exhaustive]` to allow for future additions without
/// breaking backwards compatibility.
///
/// # Examples
///
/// ```
/// use flange::domain::errors::ConfigError;
///
/// fn find_host() -> Result<String, ConfigError> {
///     Err(ConfigError::AbsentMatch {
///         pattern: "database.host".to_string(),
///     })
/// }
/// assert!(find_host().is_err());
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A source matched the inclusion patterns but could not be decoded.
    #[error("Failed to load source '{uri}': {message}")]
    SourceLoad {
        /// The URI of the failing source
        uri: String,
        /// The error message
        message: String,
    },

    /// A source's contents could not be folded into the merged tree.
    #[error("Failed to merge source '{uri}' at '{path}': {message}")]
    MergeConflict {
        /// The URI of the rejected source
        uri: String,
        /// The path where the structures disagreed
        path: String,
        /// The error message
        message: String,
    },

    /// A query that requires a unique result matched several.
    #[error("Multiple matches found for '{pattern}': {matches:?}")]
    AmbiguousMatch {
        /// The pattern or key that was searched for
        pattern: String,
        /// Display forms of the matches
        matches: Vec<String>,
    },

    /// A query that was asked to raise on absence matched nothing.
    #[error("No match found for '{pattern}'")]
    AbsentMatch {
        /// The pattern or key that was searched for
        pattern: String,
    },

    /// A model factory failed to build an instance.
    #[error("Factory for model '{model}' failed at '{path}': {source}")]
    FactoryConstruction {
        /// The model whose factory failed
        model: String,
        /// The path of the registration
        path: String,
        /// The underlying factory error
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A model matched at a location that has no key to register under.
    #[error("Model '{model}' matched at '{path}', which has no key to register under")]
    InvalidRegistrationKey {
        /// The model that matched
        model: String,
        /// The offending path
        path: String,
    },

    /// Attempted to change registration params on an immutable registry.
    #[error("Registry for model '{model}' is configured as immutable")]
    ImmutableRegistryMutation {
        /// The model whose registration was to be updated
        model: String,
    },

    /// A query named a model that is not registered.
    #[error("no model named '{name}'")]
    NoSuchModel {
        /// The requested model name
        name: String,
    },

    /// A model with this name already exists and replacement was not requested.
    #[error("model '{name}' already registered")]
    ModelAlreadyRegistered {
        /// The model name
        name: String,
    },

    /// A source with the same uri and root path was already added.
    #[error("'{uri}' is already sourced; pass overwrite to replace it")]
    SourceAlreadyAdded {
        /// The URI of the duplicate source
        uri: String,
    },

    /// An external descriptor could not be resolved.
    #[error("Failed to resolve '{descriptor}': {message}")]
    Resolve {
        /// The descriptor that was looked up
        descriptor: String,
        /// The error message
        message: String,
    },

    /// A schema could not be compiled by the validator.
    #[error("Invalid schema for model '{model}': {message}")]
    InvalidSchema {
        /// The model the schema belongs to
        model: String,
        /// The error message
        message: String,
    },

    /// A path pattern could not be compiled.
    #[error("Invalid path pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern text
        pattern: String,
        /// The error message
        message: String,
    },

    /// Failed to parse a configuration document.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// The error message
        message: String,
        /// The underlying parsing error
        #[source]
        source: Option<BoxError>,
    },

    /// Failed to convert a configuration value to the requested type.
    #[error("Failed to convert configuration value at '{path}' to type {target_type}: {source}")]
    TypeConversionError {
        /// The path being converted
        path: String,
        /// The target type name
        target_type: String,
        /// The underlying conversion error
        source: BoxError,
    },

    /// An I/O error occurred while reading configuration.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConfigError {
    /// Creates a `ParseError` for a named format from any parser error.
    pub fn parse<E>(format: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ConfigError::ParseError {
            message: format!("Failed to parse {}: {}", format, err),
            source: Some(Box::new(err)),
        }
    }

    /// Creates a `ParseError` carrying only a message.
    pub fn parse_message(message: impl Into<String>) -> Self {
        ConfigError::ParseError {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for the query-level errors raised by uniqueness checks.
    pub fn is_match_error(&self) -> bool {
        matches!(
            self,
            ConfigError::AmbiguousMatch { .. } | ConfigError::AbsentMatch { .. }
        )
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_load_error() {
        let error = ConfigError::SourceLoad {
            uri: "/etc/app/broken.yml".to_string(),
            message: "did not find expected key".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to load source '/etc/app/broken.yml': did not find expected key"
        );
    }

    #[test]
    fn test_ambiguous_match_error() {
        let error = ConfigError::AmbiguousMatch {
            pattern: "host".to_string(),
            matches: vec!["db.host".to_string(), "cache.host".to_string()],
        };
        assert!(error.to_string().contains("host"));
        assert!(error.to_string().contains("cache.host"));
        assert!(error.is_match_error());
    }

    #[test]
    fn test_absent_match_error() {
        let error = ConfigError::AbsentMatch {
            pattern: "missing".to_string(),
        };
        assert_eq!(error.to_string(), "No match found for 'missing'");
        assert!(error.is_match_error());
    }

    #[test]
    fn test_no_such_model_error() {
        let error = ConfigError::NoSuchModel {
            name: "nonexistent".to_string(),
        };
        assert_eq!(error.to_string(), "no model named 'nonexistent'");
        assert!(!error.is_match_error());
    }

    #[test]
    fn test_factory_error_keeps_source() {
        let inner: Arc<dyn std::error::Error + Send + Sync> =
            Arc::new(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let error = ConfigError::FactoryConstruction {
            model: "db".to_string(),
            path: "primary".to_string(),
            source: inner,
        };
        assert!(error.to_string().contains("boom"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_parse_helper() {
        let inner = "x".parse::<i32>().unwrap_err();
        let error = ConfigError::parse("json", inner);
        assert!(matches!(error, ConfigError::ParseError { source: Some(_), .. }));
        assert!(error.to_string().contains("json"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = ConfigError::from(io_error);
        assert!(matches!(error, ConfigError::IoError(_)));
    }
}
