// SPDX-License-Identifier: MIT OR Apache-2.0

//! A printable snapshot of a `Cfg`.

use std::fmt;

/// One model and the config keys of its registrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// The model name.
    pub name: String,
    /// The config keys of its registrations, in path order.
    pub instances: Vec<String>,
}

/// One source as it stands after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// The source uri.
    pub uri: String,
    /// The format that decoded it, if any.
    pub parser: Option<String>,
    /// The path its contents are grafted under, if any.
    pub root_path: Option<String>,
    /// The load failure, if any.
    pub error: Option<String>,
}

/// What a `Cfg` was built from and what it recognized.
///
/// The `Display` form is a short tabular report:
///
/// ```text
/// models:
/// flange_plugin        instances:
/// logger               instances: testlog
///
/// base dir:       .
/// search depth:   1
/// ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgInfo {
    /// Every installed model.
    pub models: Vec<ModelInfo>,
    /// The base directories of the primary file set.
    pub base_dirs: Vec<String>,
    /// The search depth of the primary file set.
    pub search_depth: usize,
    /// Include patterns of the primary file set.
    pub include: Vec<String>,
    /// Exclude patterns of the primary file set.
    pub exclude: Vec<String>,
    /// Every source, in merge order.
    pub sources: Vec<SourceInfo>,
    /// Sources rejected by the merge.
    pub failed: Vec<String>,
    /// Problems recorded by the last research pass.
    pub research_errors: Vec<String>,
}

impl CfgInfo {
    /// Returns the sources that failed to load.
    pub fn load_errors(&self) -> impl Iterator<Item = &SourceInfo> {
        self.sources.iter().filter(|s| s.error.is_some())
    }
}

impl fmt::Display for CfgInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "models:")?;
        for model in &self.models {
            writeln!(f, "{:20} instances: {}", model.name, model.instances.join(","))?;
        }

        writeln!(f)?;
        writeln!(f, "base dir: \t{}", self.base_dirs.join(","))?;
        writeln!(f, "search depth: \t{}", self.search_depth)?;
        writeln!(f, "file include patterns: \t{}", self.include.join(","))?;
        writeln!(f, "file exclude patterns: \t{}", self.exclude.join(","))?;

        writeln!(f)?;
        writeln!(f, "sources:")?;
        for source in &self.sources {
            let parser = source.parser.as_deref().unwrap_or("-");
            match &source.root_path {
                Some(root) => write!(f, "{:20} {} (under {})", parser, source.uri, root)?,
                None => write!(f, "{:20} {}", parser, source.uri)?,
            }
            match &source.error {
                Some(error) => writeln!(f, "\n{:20} error: {}", "", error)?,
                None => writeln!(f)?,
            }
        }

        if !self.failed.is_empty() {
            writeln!(f)?;
            writeln!(f, "failed:")?;
            for failure in &self.failed {
                writeln!(f, "  {}", failure)?;
            }
        }
        if !self.research_errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "research errors:")?;
            for error in &self.research_errors {
                writeln!(f, "  {}", error)?;
            }
        }
        Ok(())
    }
}
