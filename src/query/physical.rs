//! Physical relational-algebra plan consumed by the plan compiler.
//!
//! Each relational node names the implementation that should run it through
//! an [`Impl`] selector; the node's variant implies the operator kind. Variables
//! have been resolved to register indices ([`VarDecl`]) by the planner, so the
//! compiler never deals with names.

use serde::{Deserialize, Serialize};

use crate::query::ast::{NAryOp, SeqKind};
use crate::query::metadata::MetaContainer;
use crate::query::registry::OperatorKind;
use crate::query::value::Value;

/// Name of the implementation every operator kind ships with.
pub const DEFAULT_IMPL: &str = "default";

/// Selects the implementation of a relational operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Impl {
    /// Registered name of the implementation.
    pub name: String,
    /// Implementation-specific arguments, opaque to the compiler.
    pub static_args: Vec<Value>,
}

impl Impl {
    /// Selector without static arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            static_args: Vec::new(),
        }
    }

    /// Adds static arguments to the selector.
    pub fn with_args(mut self, static_args: Vec<Value>) -> Self {
        self.static_args = static_args;
        self
    }
}

impl Default for Impl {
    fn default() -> Self {
        Self::new(DEFAULT_IMPL)
    }
}

/// Declaration of a variable, resolved to its register.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct VarDecl {
    /// Register index in the evaluation state.
    pub index: usize,
}

impl VarDecl {
    /// Declaration bound to register `index`.
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

/// Join flavour.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Only matching pairs.
    Inner,
    /// Every left row; right side padded with nulls when nothing matches.
    Left,
    /// Every right row; left side padded with nulls when nothing matches.
    Right,
    /// Union of left and right outer joins.
    Full,
}

/// `LET` binding: evaluate `value`, store it in `decl`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LetBinding {
    /// Value to compute for every row.
    pub value: Expr,
    /// Register receiving the value.
    pub decl: VarDecl,
}

/// Relational plan node ("bindings expression").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Bexpr {
    /// Iterates the value of `expr`.
    Scan {
        /// Implementation selector.
        imp: Impl,
        /// Collection to scan.
        expr: Expr,
        /// Receives each element.
        as_decl: VarDecl,
        /// Receives each element's ordinal.
        at_decl: Option<VarDecl>,
        /// Receives each element's address.
        by_decl: Option<VarDecl>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Binds the evaluated arguments to a single variable, producing one row.
    Project {
        /// Implementation selector.
        imp: Impl,
        /// Receives the projected value.
        binding: VarDecl,
        /// Arguments handed to the implementation.
        args: Vec<Expr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Keeps the rows of `source` for which `predicate` holds.
    Filter {
        /// Implementation selector.
        imp: Impl,
        /// Row predicate.
        predicate: Expr,
        /// Input rows.
        source: Box<Bexpr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Combines the rows of two inputs.
    Join {
        /// Implementation selector.
        imp: Impl,
        /// Join flavour.
        join_type: JoinType,
        /// Left input.
        left: Box<Bexpr>,
        /// Right input; re-evaluated for every left row.
        right: Box<Bexpr>,
        /// Join condition; `None` matches every pair.
        predicate: Option<Expr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Skips the first `row_count` rows of `source`.
    Offset {
        /// Implementation selector.
        imp: Impl,
        /// Number of rows to skip.
        row_count: Expr,
        /// Input rows.
        source: Box<Bexpr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Emits at most `row_count` rows of `source`.
    Limit {
        /// Implementation selector.
        imp: Impl,
        /// Maximum number of rows.
        row_count: Expr,
        /// Input rows.
        source: Box<Bexpr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Computes additional variables for every row of `source`.
    Let {
        /// Implementation selector.
        imp: Impl,
        /// Input rows.
        source: Box<Bexpr>,
        /// Bindings, evaluated in order.
        bindings: Vec<LetBinding>,
        /// Node metadata.
        metas: MetaContainer,
    },
}

impl Bexpr {
    /// Operator kind implied by the variant.
    pub fn kind(&self) -> OperatorKind {
        match self {
            Bexpr::Scan { .. } => OperatorKind::Scan,
            Bexpr::Project { .. } => OperatorKind::Project,
            Bexpr::Filter { .. } => OperatorKind::Filter,
            Bexpr::Join { .. } => OperatorKind::Join,
            Bexpr::Offset { .. } => OperatorKind::Offset,
            Bexpr::Limit { .. } => OperatorKind::Limit,
            Bexpr::Let { .. } => OperatorKind::Let,
        }
    }

    /// Implementation selector of the node.
    pub fn imp(&self) -> &Impl {
        match self {
            Bexpr::Scan { imp, .. }
            | Bexpr::Project { imp, .. }
            | Bexpr::Filter { imp, .. }
            | Bexpr::Join { imp, .. }
            | Bexpr::Offset { imp, .. }
            | Bexpr::Limit { imp, .. }
            | Bexpr::Let { imp, .. } => imp,
        }
    }

    /// Node metadata.
    pub fn metas(&self) -> &MetaContainer {
        match self {
            Bexpr::Scan { metas, .. }
            | Bexpr::Project { metas, .. }
            | Bexpr::Filter { metas, .. }
            | Bexpr::Join { metas, .. }
            | Bexpr::Offset { metas, .. }
            | Bexpr::Limit { metas, .. }
            | Bexpr::Let { metas, .. } => metas,
        }
    }

    /// Relational inputs of the node, left to right.
    pub fn children(&self) -> Vec<&Bexpr> {
        match self {
            Bexpr::Scan { .. } | Bexpr::Project { .. } => Vec::new(),
            Bexpr::Filter { source, .. }
            | Bexpr::Offset { source, .. }
            | Bexpr::Limit { source, .. }
            | Bexpr::Let { source, .. } => vec![source.as_ref()],
            Bexpr::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Variables declared by this node itself, in declaration order.
    pub fn own_var_decls(&self) -> Vec<VarDecl> {
        match self {
            Bexpr::Scan {
                as_decl,
                at_decl,
                by_decl,
                ..
            } => std::iter::once(*as_decl)
                .chain(*at_decl)
                .chain(*by_decl)
                .collect(),
            Bexpr::Project { binding, .. } => vec![*binding],
            Bexpr::Let { bindings, .. } => bindings.iter().map(|binding| binding.decl).collect(),
            Bexpr::Filter { .. } | Bexpr::Join { .. } | Bexpr::Offset { .. } | Bexpr::Limit { .. } => {
                Vec::new()
            }
        }
    }

    /// Scalar expressions held directly by this node.
    pub fn own_exprs(&self) -> Vec<&Expr> {
        match self {
            Bexpr::Scan { expr, .. } => vec![expr],
            Bexpr::Project { args, .. } => args.iter().collect(),
            Bexpr::Filter { predicate, .. } => vec![predicate],
            Bexpr::Join { predicate, .. } => predicate.iter().collect(),
            Bexpr::Offset { row_count, .. } | Bexpr::Limit { row_count, .. } => vec![row_count],
            Bexpr::Let { bindings, .. } => bindings.iter().map(|binding| &binding.value).collect(),
        }
    }
}

/// Field of a struct constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    /// Field name; must evaluate to text.
    pub name: Expr,
    /// Field value.
    pub value: Expr,
}

/// Scalar expression in a physical plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Constant.
    Lit {
        /// The constant value.
        value: Value,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// `MISSING`.
    Missing {
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Read of a register.
    LocalId {
        /// Register index.
        index: usize,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Reference to a global (catalog) name.
    GlobalId {
        /// Resolved name.
        name: String,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Positional parameter, numbered from 1.
    Parameter {
        /// Parameter position.
        position: usize,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Operator application.
    NAry {
        /// Operator.
        op: NAryOp,
        /// Operands.
        args: Vec<Expr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Struct constructor.
    Struct {
        /// Fields in source order.
        fields: Vec<StructField>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// List, s-expression or bag constructor.
    Collection {
        /// Collection kind.
        kind: SeqKind,
        /// Elements.
        values: Vec<Expr>,
        /// Node metadata.
        metas: MetaContainer,
    },
    /// Sub-query: evaluates `exp` for every row of `query` and collects the
    /// results into a bag.
    BindingsToValues {
        /// Per-row value.
        exp: Box<Expr>,
        /// Rows to iterate.
        query: Box<Bexpr>,
        /// Node metadata.
        metas: MetaContainer,
    },
}

impl Expr {
    /// Literal with no metadata.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Lit {
            value: value.into(),
            metas: MetaContainer::new(),
        }
    }

    /// Register read with no metadata.
    pub fn local(index: usize) -> Self {
        Expr::LocalId {
            index,
            metas: MetaContainer::new(),
        }
    }

    /// Node metadata.
    pub fn metas(&self) -> &MetaContainer {
        match self {
            Expr::Lit { metas, .. }
            | Expr::Missing { metas }
            | Expr::LocalId { metas, .. }
            | Expr::GlobalId { metas, .. }
            | Expr::Parameter { metas, .. }
            | Expr::NAry { metas, .. }
            | Expr::Struct { metas, .. }
            | Expr::Collection { metas, .. }
            | Expr::BindingsToValues { metas, .. } => metas,
        }
    }

    /// True only for the literal boolean `true`.
    pub fn is_lit_true(&self) -> bool {
        matches!(self, Expr::Lit { value, .. } if value.is_true())
    }
}
