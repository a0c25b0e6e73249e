// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service layer containing the `Cfg` façade.
//!
//! This module wires the domain logic to the default adapters: [`Cfg`] and
//! its [`CfgBuilder`], the [`Query`] builder every accessor is built on, the
//! [`CfgInfo`] report, and a process-wide instance in [`global`].

pub mod cfg;
pub mod global;
pub mod info;
pub mod query;

pub use cfg::{Cfg, CfgBuilder, CfgOptions, FileSet, RefreshPhases, DEFAULT_EXCLUDE, DEFAULT_INCLUDE};
pub use global::{global, init_global};
pub use info::{CfgInfo, ModelInfo, SourceInfo};
pub use query::Query;
