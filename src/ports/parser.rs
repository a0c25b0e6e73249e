// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration parser trait definition.
//!
//! This module defines the `ConfigParser` trait, which provides an interface for
//! decoding configuration files in different formats (YAML, JSON, INI, etc.)
//! into a [`ConfigValue`] tree.

use crate::domain::{ConfigValue, Result};

/// A trait for parsing configuration documents.
///
/// A parser turns the raw content of a document into a tree. The document
/// root must decode to a mapping; parsers report any other root as an error
/// so that a format which "reads" arbitrary text as a scalar is not mistaken
/// for a match during format detection. An empty document is an empty
/// mapping.
///
/// # Examples
///
/// ```rust
/// use flange::ports::ConfigParser;
/// use flange::domain::{ConfigValue, Result};
/// use serde_json::json;
///
/// struct CsvHeaderParser;
///
/// impl ConfigParser for CsvHeaderParser {
///     fn name(&self) -> &str {
///         "csv-header"
///     }
///
///     fn parse(&self, content: &str) -> Result<ConfigValue> {
///         let mut map = serde_json::Map::new();
///         for column in content.lines().next().unwrap_or("").split(',') {
///             map.insert(column.trim().to_string(), json!(true));
///         }
///         Ok(ConfigValue::Object(map))
///     }
///
///     fn supported_extensions(&self) -> &[&str] {
///         &["csv"]
///     }
/// }
///
/// let tree = CsvHeaderParser.parse("host, port\nlocalhost, 80").unwrap();
/// assert_eq!(tree, json!({"host": true, "port": true}));
/// ```
pub trait ConfigParser: Send + Sync {
    /// Returns the format tag recorded on sources decoded by this parser.
    fn name(&self) -> &str;

    /// Parses configuration content into a tree.
    ///
    /// # Arguments
    ///
    /// * `content` - The raw content of the configuration document
    ///
    /// # Returns
    ///
    /// * `Ok(ConfigValue)` - A mapping holding the parsed document
    /// * `Err(ConfigError)` - The content is not valid in this format
    fn parse(&self, content: &str) -> Result<ConfigValue>;

    /// Returns the file extensions supported by this parser.
    ///
    /// Extensions are given without the leading dot. A file whose extension
    /// is claimed by a parser is only ever decoded by that parser.
    fn supported_extensions(&self) -> &[&str];

    /// Returns `true` if this parser claims `extension`.
    fn claims(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}
