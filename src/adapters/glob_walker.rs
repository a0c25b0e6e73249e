// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem discovery with `walkdir` and `globset`.

use crate::domain::{ConfigError, Result};
use crate::ports::Walker;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Walks directories and matches entry names against glob sets.
///
/// Entries are visited in file-name order, so the result is deterministic.
/// Symbolic links are followed.
#[derive(Debug, Clone, Default)]
pub struct GlobWalker;

impl GlobWalker {
    /// Creates a new walker.
    pub fn new() -> Self {
        GlobWalker
    }
}

/// Build a GlobSet from patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| ConfigError::InvalidPattern {
        pattern: patterns.join(","),
        message: e.to_string(),
    })
}

impl Walker for GlobWalker {
    fn walk(
        &self,
        base_dir: &Path,
        include: &[String],
        exclude: &[String],
        max_depth: usize,
    ) -> Result<Vec<PathBuf>> {
        let include_set = build_globset(include)?;
        let exclude_set = build_globset(exclude)?;

        if !base_dir.is_dir() {
            tracing::debug!("Skipping missing base directory '{}'", base_dir.display());
            return Ok(Vec::new());
        }

        let entries = WalkDir::new(base_dir)
            .max_depth(max_depth.saturating_add(1))
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !exclude_set.is_match(entry.file_name()));

        let mut found = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && include_set.is_match(entry.file_name()) {
                        found.push(entry.into_path());
                    }
                }
                Err(err) => {
                    tracing::debug!("Skipping unreadable entry: {}", err);
                }
            }
        }

        tracing::debug!(
            "Found {} candidate files under '{}'",
            found.len(),
            base_dir.display()
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("app.yml"), "a: 1").unwrap();
        fs::write(root.join("readme.md"), "# hi").unwrap();
        fs::write(root.join("backup.yml.save"), "a: 0").unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/db.yml"), "b: 1").unwrap();
        fs::write(root.join("sub/deeper/too_deep.yml"), "c: 1").unwrap();
        fs::create_dir_all(root.join("node_modules")).unwrap();
        fs::write(root.join("node_modules/pkg.yml"), "d: 1").unwrap();
        dir
    }

    fn names(found: &[PathBuf], root: &Path) -> Vec<String> {
        found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_walk_respects_depth_and_excludes() {
        let dir = tree();
        let found = GlobWalker::new()
            .walk(
                dir.path(),
                &patterns(&["*.yml"]),
                &patterns(&["node_modules", "*save"]),
                1,
            )
            .unwrap();
        assert_eq!(names(&found, dir.path()), vec!["app.yml", "sub/db.yml"]);
    }

    #[test]
    fn test_walk_depth_zero_is_base_dir_only() {
        let dir = tree();
        let found = GlobWalker::new()
            .walk(dir.path(), &patterns(&["*.yml"]), &[], 0)
            .unwrap();
        assert_eq!(names(&found, dir.path()), vec!["app.yml"]);
    }

    #[test]
    fn test_walk_missing_dir() {
        let found = GlobWalker::new()
            .walk(Path::new("/no/such/dir"), &patterns(&["*"]), &[], 1)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_walk_invalid_pattern() {
        let dir = tree();
        let err = GlobWalker::new()
            .walk(dir.path(), &patterns(&["[oops"]), &[], 1)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
