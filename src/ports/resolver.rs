// SPDX-License-Identifier: MIT OR Apache-2.0

//! External descriptor resolution port.
//!
//! Configuration data can refer to schemas and factories that live in code
//! through string descriptors such as `rust://models/db.connect`. The engine
//! treats a descriptor as an opaque string and asks a [`Resolver`] for the
//! value it names.

use crate::domain::model::Factory;
use crate::domain::{ConfigValue, Result};
use std::fmt;

/// What a descriptor resolved to.
#[derive(Clone)]
pub enum Resolved {
    /// A schema document.
    Schema(ConfigValue),
    /// A model factory.
    Factory(Factory),
}

impl Resolved {
    /// Returns a short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Resolved::Schema(_) => "schema",
            Resolved::Factory(_) => "factory",
        }
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Schema(schema) => f.debug_tuple("Schema").field(schema).finish(),
            Resolved::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A trait for resolving descriptors to schemas or factories.
pub trait Resolver: Send + Sync {
    /// Resolves `descriptor`, or fails with [`crate::domain::ConfigError::Resolve`].
    fn resolve(&self, descriptor: &str) -> Result<Resolved>;
}
