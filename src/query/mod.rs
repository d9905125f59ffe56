#![forbid(unsafe_code)]

//! Query compiler backend.
//!
//! Front half: the expression tree, its rewrite and visit traversals and the
//! semantic validator. Back half: the physical plan, the operator registry and
//! the plan compiler that lowers plans into relation producers.

/// Expression tree handed over by the parser.
pub mod ast;

/// Constructors for expression trees, used by tests and tools.
pub mod builder;

/// Physical plan compiler.
pub mod compiler;

/// Compile options and their TOML form.
pub mod config;

/// Stable error codes.
pub mod errors;

/// Node metadata: source locations and annotations.
pub mod metadata;

/// The `default` operator implementations.
pub mod operators;

/// Physical relational plan.
pub mod physical;

/// Operator factory registry.
pub mod registry;

/// Runtime traits of compiled plans.
pub mod relation;

/// Structural rewrite framework.
pub mod rewrite;

/// Basic scalar expression compiler.
pub mod scalar;

/// Register file and parameters of one execution.
pub mod state;

/// Semantic validation.
pub mod validate;

/// Values shared by literals, plans and registers.
pub mod value;

/// Read-only traversal.
pub mod visit;

pub use compiler::{CompiledPlan, ExprCompiler, PlanCompiler};
pub use config::{CompileOptions, TypedOpBehavior};
pub use registry::{OperatorKind, OperatorRegistry};
pub use rewrite::{CancellationToken, Rewriter};
pub use validate::validate;
pub use value::Value;
pub use visit::Visitor;
