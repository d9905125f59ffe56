//! Penumbra: backend of a PartiQL-style query compiler.
//!
//! The crate takes an already parsed expression tree, rewrites and validates
//! it, and compiles physical relational plans into pull-based relation
//! producers built from pluggable operator implementations.

#![warn(missing_docs)]

pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod query;

pub use error::{Error, InternalError, QueryError, Result};
