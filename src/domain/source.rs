// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration sources.
//!
//! A [`Source`] is one origin of configuration data: a file, the process
//! environment, or data handed in by the caller. It owns its parsed contents
//! and records which format decoded them, or why none could.

use crate::domain::config_value::{is_empty_tree, ConfigValue, Mapping};
use crate::domain::errors::ConfigError;
use crate::domain::key_filter::KeyFilter;
use crate::ports::ConfigParser;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Maximum allowed size for configuration files (10MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// URI of the process environment source.
pub const OS_ENV_URI: &str = "os_env";

/// URI of the caller-supplied data source.
pub const INIT_DATA_URI: &str = "init_data";

/// Identifies a source within its owning `Cfg`.
///
/// Index entries refer to the sources that contributed to them by id, so
/// provenance never owns the sources themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub usize);

/// Where a source's data comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// A file on disk; its uri is the absolute path.
    File,
    /// The process environment.
    Environment,
    /// In-memory data supplied by the caller.
    InitData,
}

/// One origin of configuration data.
pub struct Source {
    uri: String,
    kind: SourceKind,
    root_path: Option<String>,
    parser: Option<String>,
    contents: ConfigValue,
    error: Option<ConfigError>,
}

impl Source {
    /// Creates a source around data that is already decoded.
    ///
    /// Rejected keys are removed by `filter`.
    pub fn from_value(
        uri: impl Into<String>,
        kind: SourceKind,
        root_path: Option<String>,
        contents: ConfigValue,
        filter: &KeyFilter,
    ) -> Self {
        let mut source = Self::empty(uri.into(), kind, root_path);
        source.contents = match filter.apply(contents) {
            ConfigValue::Null => ConfigValue::Object(Mapping::new()),
            other => other,
        };
        source
    }

    /// Creates the source for the process environment.
    pub fn environment(root_path: Option<String>, vars: Mapping, filter: &KeyFilter) -> Self {
        Self::from_value(
            OS_ENV_URI,
            SourceKind::Environment,
            root_path,
            ConfigValue::Object(vars),
            filter,
        )
    }

    /// Creates the source for caller-supplied data.
    pub fn init_data(data: ConfigValue, filter: &KeyFilter) -> Self {
        Self::from_value(INIT_DATA_URI, SourceKind::InitData, None, data, filter)
    }

    /// Creates a file source without reading it; call [`Source::load`] next.
    pub fn file(path: &Path, root_path: Option<String>) -> Self {
        Self::empty(path.display().to_string(), SourceKind::File, root_path)
    }

    /// Creates a file source and loads it.
    ///
    /// Loading never fails at this level: a file that cannot be decoded is
    /// returned with [`Source::error`] set and empty contents.
    pub fn from_file(
        path: &Path,
        root_path: Option<String>,
        parsers: &[Arc<dyn ConfigParser>],
        filter: &KeyFilter,
    ) -> Self {
        let mut source = Self::file(path, root_path);
        source.load(parsers, filter);
        source
    }

    fn empty(uri: String, kind: SourceKind, root_path: Option<String>) -> Self {
        Self {
            uri,
            kind,
            root_path,
            parser: None,
            contents: ConfigValue::Object(Mapping::new()),
            error: None,
        }
    }

    /// Re-reads and re-parses a file source. Other kinds are left unchanged.
    ///
    /// The extension picks the parser when one claims it, and a failure under
    /// that parser is recorded as the source's error. Otherwise every parser
    /// is tried in order and the first that yields a non-empty tree wins; if
    /// none does, the file is simply not configuration and no error is set.
    pub fn load(&mut self, parsers: &[Arc<dyn ConfigParser>], filter: &KeyFilter) {
        if self.kind != SourceKind::File {
            return;
        }
        self.parser = None;
        self.error = None;
        self.contents = ConfigValue::Object(Mapping::new());

        let path = Path::new(&self.uri).to_path_buf();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let claimed = parsers.iter().find(|p| p.claims(&extension));

        let content = match read_content(&path) {
            Ok(Some(content)) => content,
            Ok(None) if claimed.is_none() => {
                tracing::debug!("Skipping non-text file '{}'", self.uri);
                return;
            }
            Ok(None) => {
                self.fail("file is not valid UTF-8".to_string());
                return;
            }
            Err(e) => {
                self.fail(e.to_string());
                return;
            }
        };

        if let Some(parser) = claimed {
            match parser.parse(&content).and_then(require_mapping) {
                Ok(tree) => {
                    self.contents = filter.apply(tree);
                    self.parser = Some(parser.name().to_string());
                    tracing::debug!("Parsed '{}' as {}", self.uri, parser.name());
                }
                Err(e) => self.fail(e.to_string()),
            }
            return;
        }

        for parser in parsers {
            let Ok(tree) = parser.parse(&content).and_then(require_mapping) else {
                continue;
            };
            let tree = filter.apply(tree);
            if !is_empty_tree(&tree) {
                tracing::debug!("Detected '{}' as {}", self.uri, parser.name());
                self.contents = tree;
                self.parser = Some(parser.name().to_string());
                return;
            }
        }
        tracing::debug!("No parser recognized '{}'", self.uri);
    }

    fn fail(&mut self, message: String) {
        tracing::warn!("Failed to load configuration source '{}': {}", self.uri, message);
        self.error = Some(ConfigError::SourceLoad {
            uri: self.uri.clone(),
            message,
        });
    }

    /// Returns the origin identifier: a path, `os_env` or `init_data`.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns the kind of origin.
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Returns the separator-joined path this source is grafted under.
    pub fn root_path(&self) -> Option<&str> {
        self.root_path.as_deref()
    }

    /// Returns the format tag of the parser that decoded the contents.
    pub fn parser(&self) -> Option<&str> {
        self.parser.as_deref()
    }

    /// Returns the decoded contents; always a mapping.
    pub fn contents(&self) -> &ConfigValue {
        &self.contents
    }

    /// Returns the load failure, if any.
    pub fn error(&self) -> Option<&ConfigError> {
        self.error.as_ref()
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("uri", &self.uri)
            .field("kind", &self.kind)
            .field("root_path", &self.root_path)
            .field("parser", &self.parser)
            .field("error", &self.error.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Source uri={} root_path={} parser={}>",
            self.uri,
            self.root_path.as_deref().unwrap_or("-"),
            self.parser.as_deref().unwrap_or("-")
        )
    }
}

/// Reads a file as text. `Ok(None)` means the file is not UTF-8.
fn read_content(path: &Path) -> std::result::Result<Option<String>, ConfigError> {
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(ConfigError::SourceLoad {
            uri: path.display().to_string(),
            message: format!(
                "Configuration file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_FILE_SIZE
            ),
        });
    }
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes).ok())
}

fn require_mapping(tree: ConfigValue) -> crate::domain::Result<ConfigValue> {
    match tree {
        ConfigValue::Object(_) => Ok(tree),
        ConfigValue::Null => Ok(ConfigValue::Object(Mapping::new())),
        _ => Err(ConfigError::parse_message(
            "document root is not a mapping",
        )),
    }
}
