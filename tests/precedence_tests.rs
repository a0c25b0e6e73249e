// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for source precedence.

mod common;

use common::{bare_builder, builder_in, fixed_env, write_file};
use flange::domain::{ConfigError, ConfigPath};
use flange::service::{CfgBuilder, FileSet};
use serde_json::json;
use std::env;

/// Helper to set and clean up environment variables
struct EnvGuard {
    keys: Vec<String>,
}

impl EnvGuard {
    fn new() -> Self {
        EnvGuard { keys: Vec::new() }
    }

    fn set(&mut self, key: &str, value: &str) {
        env::set_var(key, value);
        self.keys.push(key.to_string());
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            env::remove_var(key);
        }
    }
}

#[test]
fn test_later_files_win() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.yml", "db:\n  host: first\n  port: 1\n");
    write_file(dir.path(), "b.yml", "db:\n  host: second\n");

    let cfg = builder_in(dir.path()).build().unwrap();

    // b.yml is discovered after a.yml
    assert_eq!(cfg.value("db.host").unwrap(), Some(json!("second")));
    assert_eq!(cfg.value("db.port").unwrap(), Some(json!(1)));
    assert_eq!(cfg.locate(&ConfigPath::from(["db", "port"])).len(), 1);
    assert_eq!(cfg.locate(&ConfigPath::from(["db"])).len(), 2);
}

#[test]
fn test_env_over_files_and_init_data_over_env() {
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "app.yml",
        "server:\n  host: file\n  port: 80\n  name: web\n",
    );

    let cfg = builder_in(dir.path())
        .include_os_env(true)
        .env_reader(fixed_env(&[("SERVER__PORT", "8080"), ("SERVER__HOST", "env")]))
        .init_data(json!({"server": {"host": "init"}}))
        .build()
        .unwrap();

    assert_eq!(cfg.value("server.name").unwrap(), Some(json!("web")));
    assert_eq!(cfg.value("server.port").unwrap(), Some(json!("8080")));
    assert_eq!(cfg.value("server.host").unwrap(), Some(json!("init")));
    assert_eq!(
        cfg.query("server.host").uris().unwrap(),
        vec![
            cfg.sources()[0].uri(),
            "os_env",
            "init_data"
        ]
    );
}

#[test]
fn test_extra_file_sets_merge_after_primary() {
    let primary = tempfile::tempdir().unwrap();
    let extra = tempfile::tempdir().unwrap();
    write_file(primary.path(), "app.yml", "mode: primary\nonly_primary: true\n");
    write_file(extra.path(), "app.yml", "mode: extra\n");

    let cfg = builder_in(primary.path())
        .file_set(FileSet::new(extra.path().display().to_string()))
        .build()
        .unwrap();

    assert_eq!(cfg.value("mode").unwrap(), Some(json!("extra")));
    assert_eq!(cfg.value("only_primary").unwrap(), Some(json!(true)));
}

#[test]
fn test_root_path_grafts_files() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "app.yml", "port: 80\n");

    let cfg = builder_in(dir.path())
        .root_path("svc")
        .init_data(json!({"svc": {"port": 81}}))
        .build()
        .unwrap();

    assert_eq!(cfg.data(), &json!({"svc": {"port": 81}}));
}

#[test]
fn test_type_conflict_rejects_later_source() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "app.yml", "db:\n  host: localhost\n");

    let cfg = builder_in(dir.path())
        .include_os_env(true)
        .env_reader(fixed_env(&[("DB", "flat")]))
        .build()
        .unwrap();

    assert_eq!(cfg.value("db.host").unwrap(), Some(json!("localhost")));
    assert_eq!(cfg.failed().len(), 1);
    assert!(matches!(
        &cfg.failed()[0],
        ConfigError::MergeConflict { uri, .. } if uri == "os_env"
    ));
}

#[test]
fn test_custom_unflatten_separator() {
    let cfg = bare_builder()
        .include_os_env(true)
        .env_reader(fixed_env(&[("DB_HOST", "localhost"), ("DB__PORT", "5432")]))
        .unflatten_separator("_")
        .build()
        .unwrap();

    assert_eq!(cfg.value("db.host").unwrap(), Some(json!("localhost")));
    assert_eq!(cfg.value("db.port").unwrap(), Some(json!("5432")));
}

#[test]
fn test_process_environment_with_prefix() {
    let mut env_guard = EnvGuard::new();
    env_guard.set("FLANGE_PRECEDENCE_TEST_DB__PORT", "6543");
    env_guard.set("FLANGE_PRECEDENCE_TEST_MODE", "env");

    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "app.yml", "db:\n  port: 5432\nmode: file\n");

    let cfg = CfgBuilder::new()
        .base_dirs([dir.path().display().to_string()])
        .env_prefix("FLANGE_PRECEDENCE_TEST_")
        .build()
        .unwrap();

    assert_eq!(cfg.value("db.port").unwrap(), Some(json!("6543")));
    assert_eq!(cfg.value("mode").unwrap(), Some(json!("env")));
    assert_eq!(
        cfg.sources().last().map(|s| s.uri()),
        Some("os_env")
    );
}
