// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helper utilities for integration tests.

use flange::adapters::EnvVarReader;
use flange::service::CfgBuilder;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber once per test binary.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Writes `content` to `name` under `dir`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// An environment reader over fixed variables.
#[allow(dead_code)]
pub fn fixed_env(pairs: &[(&str, &str)]) -> EnvVarReader {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvVarReader::with_values(values)
}

/// A builder searching only `dir`, with no environment.
#[allow(dead_code)]
pub fn builder_in(dir: &Path) -> CfgBuilder {
    init_tracing();
    CfgBuilder::new()
        .base_dirs([dir.display().to_string()])
        .include_os_env(false)
}

/// A builder with no files and no environment.
#[allow(dead_code)]
pub fn bare_builder() -> CfgBuilder {
    init_tracing();
    CfgBuilder::new()
        .base_dirs(Vec::<String>::new())
        .include_os_env(false)
}
