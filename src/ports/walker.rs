// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem discovery port.

use crate::domain::Result;
use std::path::{Path, PathBuf};

/// A trait for discovering candidate configuration files.
///
/// Include and exclude patterns are globs matched against entry names (not
/// full paths). Exclude patterns apply to directories as well as files, and
/// an excluded directory is not descended into. `max_depth` counts
/// directory levels below `base_dir`: with a depth of 1, files directly in
/// `base_dir` and in its immediate subdirectories are found.
pub trait Walker: Send + Sync {
    /// Returns candidate files under `base_dir`, in a deterministic order.
    fn walk(
        &self,
        base_dir: &Path,
        include: &[String],
        exclude: &[String],
        max_depth: usize,
    ) -> Result<Vec<PathBuf>>;
}
