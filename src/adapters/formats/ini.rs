// SPDX-License-Identifier: MIT OR Apache-2.0

//! INI parser.

use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;

/// INI parser implementation.
///
/// `[section]` headers open a nested mapping; `key = value` and `key: value`
/// pairs before the first header land at the top level. Lines starting with
/// `;` or `#` are comments. Values are kept as strings.
///
/// # Examples
///
/// ```rust
/// use flange::adapters::IniParser;
/// use flange::ports::ConfigParser;
/// use serde_json::json;
///
/// let tree = IniParser::new().parse("[db]\nhost = localhost").unwrap();
/// assert_eq!(tree, json!({"db": {"host": "localhost"}}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct IniParser;

impl IniParser {
    /// Creates a new INI parser.
    pub fn new() -> Self {
        IniParser
    }

    fn error(line: usize, message: &str) -> ConfigError {
        ConfigError::parse_message(format!("Failed to parse INI at line {}: {}", line, message))
    }

    fn split_pair(line: &str) -> Option<(&str, &str)> {
        let at = line.find(|c| c == '=' || c == ':')?;
        let key = line[..at].trim();
        if key.is_empty() {
            return None;
        }
        Some((key, line[at + 1..].trim()))
    }
}

impl ConfigParser for IniParser {
    fn name(&self) -> &str {
        "ini"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        let mut root = Mapping::new();
        let mut section: Option<String> = None;

        for (number, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| Self::error(number + 1, "malformed section header"))?;
                let slot = root
                    .entry(name.to_string())
                    .or_insert_with(|| ConfigValue::Object(Mapping::new()));
                if !slot.is_object() {
                    *slot = ConfigValue::Object(Mapping::new());
                }
                section = Some(name.to_string());
                continue;
            }

            let (key, value) = Self::split_pair(line)
                .ok_or_else(|| Self::error(number + 1, "expected 'key = value'"))?;
            let value = ConfigValue::String(value.to_string());
            match &section {
                Some(name) => {
                    if let Some(ConfigValue::Object(map)) = root.get_mut(name) {
                        map.insert(key.to_string(), value);
                    }
                }
                None => {
                    root.insert(key.to_string(), value);
                }
            }
        }

        Ok(ConfigValue::Object(root))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["ini"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ini_parser_sections() {
        let content = "; global\nname = demo\n\n[database]\nhost = localhost\nport: 5432\n";
        let result = IniParser::new().parse(content).unwrap();
        assert_eq!(
            result,
            json!({"name": "demo", "database": {"host": "localhost", "port": "5432"}})
        );
    }

    #[test]
    fn test_ini_parser_value_with_separator() {
        let result = IniParser::new().parse("[s]\nurl = http://x:80/a=b").unwrap();
        assert_eq!(result["s"]["url"], json!("http://x:80/a=b"));
    }

    #[test]
    fn test_ini_parser_rejects_prose() {
        assert!(IniParser::new().parse("just some prose").is_err());
        assert!(IniParser::new().parse("[unclosed").is_err());
    }

    #[test]
    fn test_ini_parser_extensions() {
        assert!(IniParser::new().claims("INI"));
        assert!(!IniParser::new().claims("cfg"));
        assert!(!IniParser::new().claims("properties"));
    }
}
