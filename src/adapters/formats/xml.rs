// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic XML parser.

use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Key under which an element's text is stored when it also has children.
pub const TEXT_KEY: &str = "#text";

/// Prefix of keys holding attributes.
pub const ATTRIBUTE_PREFIX: &str = "@";

/// Generic XML parser.
///
/// The document becomes `{root: ...}`. An element with only text becomes a
/// string, an empty element becomes null, and anything else becomes a
/// mapping of attributes (`@name`), children, and text (`#text`). Repeated
/// child elements collect into a sequence.
///
/// # Examples
///
/// ```rust
/// use flange::adapters::XmlParser;
/// use flange::ports::ConfigParser;
/// use serde_json::json;
///
/// let tree = XmlParser::new()
///     .parse(r#"<db engine="pg"><host>localhost</host></db>"#)
///     .unwrap();
/// assert_eq!(tree, json!({"db": {"@engine": "pg", "host": "localhost"}}));
/// ```
#[derive(Debug, Clone, Default)]
pub struct XmlParser;

struct Element {
    name: String,
    children: Mapping,
    text: String,
}

impl XmlParser {
    /// Creates a new XML parser.
    pub fn new() -> Self {
        XmlParser
    }

    fn open(start: &BytesStart<'_>) -> Result<Element> {
        let mut children = Mapping::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| ConfigError::parse("XML", e))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| ConfigError::parse("XML", e))?;
            children.insert(
                format!("{}{}", ATTRIBUTE_PREFIX, key),
                ConfigValue::String(value.into_owned()),
            );
        }
        Ok(Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            children,
            text: String::new(),
        })
    }

    fn close(element: Element) -> (String, ConfigValue) {
        let Element {
            name,
            mut children,
            text,
        } = element;
        let value = if children.is_empty() {
            if text.is_empty() {
                ConfigValue::Null
            } else {
                ConfigValue::String(text)
            }
        } else {
            if !text.is_empty() {
                children.insert(TEXT_KEY.to_string(), ConfigValue::String(text));
            }
            ConfigValue::Object(children)
        };
        (name, value)
    }

    fn attach(map: &mut Mapping, key: String, value: ConfigValue) {
        match map.get_mut(&key) {
            Some(ConfigValue::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = ConfigValue::Array(vec![first, value]);
            }
            None => {
                map.insert(key, value);
            }
        }
    }

    fn parent<'a>(stack: &'a mut [Element], root: &'a mut Mapping) -> &'a mut Mapping {
        match stack.last_mut() {
            Some(element) => &mut element.children,
            None => root,
        }
    }
}

impl ConfigParser for XmlParser {
    fn name(&self) -> &str {
        "xml"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        let mut reader = Reader::from_str(content);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root = Mapping::new();

        loop {
            match reader.read_event().map_err(|e| ConfigError::parse("XML", e))? {
                Event::Start(start) => stack.push(Self::open(&start)?),
                Event::Empty(start) => {
                    let (key, value) = Self::close(Self::open(&start)?);
                    Self::attach(Self::parent(&mut stack, &mut root), key, value);
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        ConfigError::parse_message("Failed to parse XML: unexpected closing tag")
                    })?;
                    let (key, value) = Self::close(element);
                    Self::attach(Self::parent(&mut stack, &mut root), key, value);
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| ConfigError::parse("XML", e))?;
                    match stack.last_mut() {
                        Some(element) => element.text.push_str(&text),
                        None => {
                            return Err(ConfigError::parse_message(
                                "Failed to parse XML: text outside of the root element",
                            ))
                        }
                    }
                }
                Event::CData(data) => match stack.last_mut() {
                    Some(element) => element.text.push_str(&String::from_utf8_lossy(&data)),
                    None => {
                        return Err(ConfigError::parse_message(
                            "Failed to parse XML: CDATA outside of the root element",
                        ))
                    }
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ConfigError::parse_message(
                "Failed to parse XML: unclosed element",
            ));
        }
        if root.is_empty() {
            return Err(ConfigError::parse_message(
                "Failed to parse XML: no root element",
            ));
        }
        Ok(ConfigValue::Object(root))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["xml"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_xml_repeated_children() {
        let content = r#"<?xml version="1.0"?>
<servers>
  <server>a</server>
  <server>b</server>
  <empty/>
</servers>"#;
        let result = XmlParser::new().parse(content).unwrap();
        assert_eq!(
            result,
            json!({"servers": {"server": ["a", "b"], "empty": null}})
        );
    }

    #[test]
    fn test_xml_mixed_text_and_escapes() {
        let result = XmlParser::new()
            .parse("<note lang=\"en\">a &amp; b<to>x</to></note>")
            .unwrap();
        assert_eq!(
            result,
            json!({"note": {"@lang": "en", "to": "x", "#text": "a & b"}})
        );
    }

    #[test]
    fn test_xml_rejects_non_xml() {
        assert!(XmlParser::new().parse("name=demo").is_err());
        assert!(XmlParser::new().parse("db:\n  host: x").is_err());
        assert!(XmlParser::new().parse("<a><b></a>").is_err());
        assert!(XmlParser::new().parse("<a>").is_err());
    }
}
