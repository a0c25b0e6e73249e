// SPDX-License-Identifier: MIT OR Apache-2.0

//! Java properties parser.

use crate::domain::{ConfigError, ConfigValue, Mapping, Result};
use crate::ports::ConfigParser;

/// Java-style `.properties` parser.
///
/// Supports `=`, `:` and whitespace separators, `#` and `!` comments,
/// backslash line continuations and the usual escapes including `\uXXXX`.
/// Keys are kept flat, so `a.b=1` is the key `"a.b"`.
#[derive(Debug, Clone, Default)]
pub struct PropertiesParser;

impl PropertiesParser {
    /// Creates a new properties parser.
    pub fn new() -> Self {
        PropertiesParser
    }

    /// Joins continuation lines into logical lines.
    fn logical_lines(content: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current: Option<String> = None;
        for raw in content.lines() {
            let piece = match current {
                Some(_) => raw.trim_start(),
                None => raw,
            };
            let trailing = piece.chars().rev().take_while(|c| *c == '\\').count();
            let continued = trailing % 2 == 1;
            let piece = if continued {
                &piece[..piece.len() - 1]
            } else {
                piece
            };
            let line = current.get_or_insert_with(String::new);
            line.push_str(piece);
            if !continued {
                if let Some(done) = current.take() {
                    lines.push(done);
                }
            }
        }
        if let Some(rest) = current {
            lines.push(rest);
        }
        lines
    }

    fn unescape(text: &str) -> Result<String> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('t') => out.push('\t'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('f') => out.push('\u{c}'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            ConfigError::parse_message(format!(
                                "Failed to parse properties: bad unicode escape '\\u{}'",
                                hex
                            ))
                        })?;
                    out.push(code);
                }
                Some(other) => out.push(other),
                None => {}
            }
        }
        Ok(out)
    }

    /// Splits a logical line at the first unescaped separator.
    fn split_pair(line: &str) -> (&str, &str) {
        let mut escaped = false;
        for (i, c) in line.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
                c if c.is_whitespace() => {
                    let rest = line[i..].trim_start();
                    let rest = rest
                        .strip_prefix('=')
                        .or_else(|| rest.strip_prefix(':'))
                        .unwrap_or(rest);
                    return (&line[..i], rest.trim_start());
                }
                _ => {}
            }
        }
        (line, "")
    }
}

impl ConfigParser for PropertiesParser {
    fn name(&self) -> &str {
        "properties"
    }

    fn parse(&self, content: &str) -> Result<ConfigValue> {
        let mut map = Mapping::new();
        for line in Self::logical_lines(content) {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = Self::split_pair(line);
            map.insert(
                Self::unescape(key)?,
                ConfigValue::String(Self::unescape(value)?),
            );
        }
        Ok(ConfigValue::Object(map))
    }

    fn supported_extensions(&self) -> &[&str] {
        &["properties", "props"]
    }
}
