// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ports layer containing trait definitions.
//!
//! The engine talks to its collaborators through these traits: parsers decode
//! file content, a validator checks values against model schemas, a resolver
//! turns descriptors into schemas and factories, and a walker finds candidate
//! files. Default implementations live in the adapters layer.

pub mod parser;
pub mod resolver;
pub mod validator;
pub mod walker;

// Re-export commonly used types
pub use parser::ConfigParser;
pub use resolver::{Resolved, Resolver};
pub use validator::{Matcher, Validator};
pub use walker::Walker;
