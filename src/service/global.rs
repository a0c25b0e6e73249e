// SPDX-License-Identifier: MIT OR Apache-2.0

//! A process-wide `Cfg`.
//!
//! The first call to [`global`] builds a `Cfg` with the default options,
//! unless [`init_global`] installed one earlier. The instance is never
//! rebuilt; build a new `Cfg` to pick up later changes.

use crate::domain::{ConfigPath, ConfigValue, Instance, Result};
use crate::service::{Cfg, CfgInfo};
use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<Cfg> = OnceCell::new();

/// Returns the process-wide `Cfg`, building it on first use.
pub fn global() -> Result<&'static Cfg> {
    GLOBAL.get_or_try_init(|| {
        tracing::debug!("Building the global configuration");
        Cfg::new()
    })
}

/// Installs `cfg` as the process-wide `Cfg`.
///
/// Returns `cfg` back if one is already installed.
pub fn init_global(cfg: Cfg) -> std::result::Result<(), Cfg> {
    GLOBAL.set(cfg)
}

/// [`Cfg::value`] on the process-wide `Cfg`.
pub fn value(pattern: &str) -> Result<Option<ConfigValue>> {
    global()?.value(pattern)
}

/// [`Cfg::search`] on the process-wide `Cfg`.
pub fn search(pattern: &str, exact: bool) -> Result<Vec<(ConfigPath, ConfigValue)>> {
    global()?.search(pattern, exact)
}

/// [`Cfg::mget`] on the process-wide `Cfg`.
pub fn mget(
    config_key: Option<&str>,
    model: Option<&str>,
    vfilter: &[String],
    raise_absent: bool,
) -> Result<Option<Instance>> {
    global()?.mget(config_key, model, vfilter, raise_absent)
}

/// [`Cfg::info`] on the process-wide `Cfg`.
pub fn info() -> Result<CfgInfo> {
    Ok(global()?.info())
}
