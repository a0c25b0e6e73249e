// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML parser.

use super::document_root;
use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;

/// YAML parser implementation.
///
/// Mapping keys that are not strings (numbers, booleans) are kept under
/// their text form, and tags are dropped in favour of the tagged value.
///
/// # Examples
///
/// ```rust
/// use flange::adapters::YamlParser;
/// use flange::ports::ConfigParser;
/// use serde_json::json;
///
/// let parser = YamlParser::new();
/// let yaml_content = "database:\n  host: localhost\n  port: 5432";
/// let result = parser.parse(yaml_content).unwrap();
/// assert_eq!(result["database"]["host"], json!("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct YamlParser;

impl YamlParser {
    /// Creates a new YAML parser.
    pub fn new() -> Self {
        YamlParser
    }

    /// Converts a YAML value into a configuration tree.
    fn convert(value: serde_yaml::Value) -> ConfigValue {
        match value {
            serde_yaml::Value::Mapping(map) => {
                let mut result = Mapping::new();
                for (key, val) in map {
                    if let Some(key) = Self::key_text(key) {
                        result.insert(key, Self::convert(val));
                    }
                }
                ConfigValue::Object(result)
            }
            serde_yaml::Value::Sequence(seq) => {
                ConfigValue::Array(seq.into_iter().map(Self::convert).collect())
            }
            serde_yaml::Value::String(s) => ConfigValue::String(s),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::from(i)
                } else if let Some(u) = n.as_u64() {
                    ConfigValue::from(u)
                } else {
                    n.as_f64()
                        .and_then(serde_json::Number::from_f64)
                        .map(ConfigValue::Number)
                        .unwrap_or_else(|| ConfigValue::String(n.to_string()))
                }
            }
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Tagged(tagged) => Self::convert(tagged.value),
        }
    }

    fn key_text(key: serde_yaml::Value) -> Option<String> {
        match key {
            serde_yaml::Value::String(s) => Some(s),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            serde_yaml::Value::Tagged(tagged) => Self::key_text(tagged.value),
            _ => None,
        }
    }
}

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigParser for YamlParser {
    fn name(&self) -> &str {
        "yaml"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::parse("YAML", e))?;
        document_root(Self::convert(value))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yaml_parser_nested() {
        let parser = YamlParser::new();
        let yaml = r#"
testlog:
  name: testlog
  level: DEBUG
  format: "%(message)s"
"#;
        let result = parser.parse(yaml).unwrap();
        assert_eq!(
            result,
            json!({"testlog": {"name": "testlog", "level": "DEBUG", "format": "%(message)s"}})
        );
    }

    #[test]
    fn test_yaml_parser_array_and_types() {
        let parser = YamlParser::new();
        let yaml = "ports: [80, 443]\nratio: 0.5\nenabled: true\nnothing: ~";
        let result = parser.parse(yaml).unwrap();
        assert_eq!(
            result,
            json!({"ports": [80, 443], "ratio": 0.5, "enabled": true, "nothing": null})
        );
    }

    #[test]
    fn test_yaml_parser_non_string_keys() {
        let parser = YamlParser::new();
        let result = parser.parse("1: one\ntrue: yes").unwrap();
        assert_eq!(result, json!({"1": "one", "true": "yes"}));
    }

    #[test]
    fn test_yaml_parser_empty_document() {
        let parser = YamlParser::new();
        assert_eq!(parser.parse("").unwrap(), json!({}));
    }

    #[test]
    fn test_yaml_parser_invalid() {
        let parser = YamlParser::new();
        let result = parser.parse("key: [unclosed");
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_yaml_parser_scalar_root_rejected() {
        let parser = YamlParser::new();
        assert!(parser.parse("just some prose").is_err());
    }

    #[test]
    fn test_yaml_parser_supported_extensions() {
        let parser = YamlParser::default();
        assert!(parser.claims("yml"));
        assert!(parser.claims("YAML"));
        assert!(!parser.claims("json"));
    }
}
