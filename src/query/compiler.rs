//! Lowers physical plans into executable relation producers.
//!
//! The compiler walks a [`Bexpr`] tree bottom-up, resolving each node's
//! implementation selector against the [`OperatorRegistry`] and handing the
//! selected factory the node's compiled inputs. Scalar expressions are
//! compiled by an injected [`ExprCompiler`], which receives the plan compiler
//! back so nested sub-queries can be lowered too.
//!
//! Compilation fails only when a selector cannot be honoured; every other
//! failure surfaces when the compiled plan runs.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::query::physical::{Bexpr, Expr, Impl, LetBinding, VarDecl};
use crate::query::registry::{JoinInputs, LookupError, OperatorKind, OperatorRegistry};
use crate::query::relation::{
    BoxRelationExpression, LocatedRelation, RelationExpression, ValueExpression, VariableBinding,
};
use crate::query::state::{EvaluatorState, NullPadding, SetVariable};
use crate::query::value::Value;

/// Compiles scalar expressions of a physical plan.
pub trait ExprCompiler: Send + Sync {
    /// Compiles `expr`. `plans` compiles relational sub-plans nested in it.
    fn compile(&self, expr: &Expr, plans: &PlanCompiler) -> Result<ValueExpression>;
}

/// A compiled plan plus the register file size it needs.
pub struct CompiledPlan {
    root: BoxRelationExpression,
    register_count: usize,
}

impl CompiledPlan {
    /// Root relation producer.
    pub fn root(&self) -> &dyn RelationExpression {
        self.root.as_ref()
    }

    /// Number of registers every execution state must provide.
    pub fn register_count(&self) -> usize {
        self.register_count
    }

    /// Fresh state sized for this plan.
    pub fn new_state(&self) -> EvaluatorState {
        EvaluatorState::new(self.register_count)
    }

    /// Fresh state sized for this plan with bound parameters.
    pub fn new_state_with_parameters(&self, parameters: Vec<Value>) -> EvaluatorState {
        self.new_state().with_parameters(parameters)
    }

    /// Gives up the size information and keeps only the root producer.
    pub fn into_root(self) -> BoxRelationExpression {
        self.root
    }
}

impl fmt::Debug for CompiledPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPlan")
            .field("register_count", &self.register_count)
            .finish_non_exhaustive()
    }
}

/// Physical plan compiler.
///
/// Holds no per-query state; one instance can compile any number of plans,
/// from any number of threads.
#[derive(Clone)]
pub struct PlanCompiler {
    registry: Arc<OperatorRegistry>,
    exprs: Arc<dyn ExprCompiler>,
}

impl fmt::Debug for PlanCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCompiler")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl PlanCompiler {
    /// Compiler resolving operators in `registry` and scalars with `exprs`.
    pub fn new(registry: Arc<OperatorRegistry>, exprs: Arc<dyn ExprCompiler>) -> Self {
        Self { registry, exprs }
    }

    /// Registry the compiler resolves selectors against.
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    /// Compiles a whole plan and sizes its register file.
    pub fn compile_plan(&self, plan: &Bexpr) -> Result<CompiledPlan> {
        let register_count = register_count(plan);
        debug!(register_count, root = %plan.kind(), "plan.compile");
        let root = self.compile_bexpr(plan)?;
        Ok(CompiledPlan {
            root,
            register_count,
        })
    }

    /// Compiles one scalar expression through the injected expression compiler.
    pub fn compile_expr(&self, expr: &Expr) -> Result<ValueExpression> {
        self.exprs.compile(expr, self)
    }

    /// Compiles one relational node and everything below it.
    pub fn compile_bexpr(&self, node: &Bexpr) -> Result<BoxRelationExpression> {
        let relation = match node {
            Bexpr::Scan {
                imp,
                expr,
                as_decl,
                at_decl,
                by_decl,
                ..
            } => {
                debug!(imp = %imp.name, "plan.compile.scan");
                let expr = self.compile_expr(expr)?;
                let factory = self.resolve(OperatorKind::Scan, imp, OperatorRegistry::scan_factory)?;
                factory.create(
                    imp,
                    expr,
                    setter(*as_decl),
                    at_decl.map(setter),
                    by_decl.map(setter),
                )?
            }
            Bexpr::Project {
                imp, binding, args, ..
            } => {
                debug!(imp = %imp.name, args = args.len(), "plan.compile.project");
                let args = args
                    .iter()
                    .map(|arg| self.compile_expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                let factory =
                    self.resolve(OperatorKind::Project, imp, OperatorRegistry::project_factory)?;
                factory.create(imp, setter(*binding), args)?
            }
            Bexpr::Filter {
                imp,
                predicate,
                source,
                ..
            } => {
                debug!(imp = %imp.name, "plan.compile.filter");
                let predicate = self.compile_expr(predicate)?;
                let source = self.compile_bexpr(source)?;
                let factory =
                    self.resolve(OperatorKind::Filter, imp, OperatorRegistry::filter_factory)?;
                factory.create(imp, predicate, source)?
            }
            Bexpr::Join {
                imp,
                join_type,
                left,
                right,
                predicate,
                ..
            } => {
                debug!(imp = %imp.name, join_type = ?join_type, "plan.compile.join");
                let left_relation = self.compile_bexpr(left)?;
                let right_relation = self.compile_bexpr(right)?;
                let predicate = match predicate {
                    Some(predicate) if !predicate.is_lit_true() => {
                        Some(self.compile_expr(predicate)?)
                    }
                    _ => None,
                };
                let left_padding = null_padding(left);
                let right_padding = null_padding(right);
                let factory = self.resolve(OperatorKind::Join, imp, OperatorRegistry::join_factory)?;
                factory.create(
                    imp,
                    JoinInputs {
                        join_type: *join_type,
                        left: left_relation,
                        right: right_relation,
                        predicate,
                        left_padding,
                        right_padding,
                    },
                )?
            }
            Bexpr::Offset {
                imp,
                row_count,
                source,
                ..
            } => {
                debug!(imp = %imp.name, "plan.compile.offset");
                let row_count = self.compile_expr(row_count)?;
                let source = self.compile_bexpr(source)?;
                let factory =
                    self.resolve(OperatorKind::Offset, imp, OperatorRegistry::offset_factory)?;
                factory.create(imp, row_count, source)?
            }
            Bexpr::Limit {
                imp,
                row_count,
                source,
                ..
            } => {
                debug!(imp = %imp.name, "plan.compile.limit");
                let row_count = self.compile_expr(row_count)?;
                let source = self.compile_bexpr(source)?;
                let factory =
                    self.resolve(OperatorKind::Limit, imp, OperatorRegistry::limit_factory)?;
                factory.create(imp, row_count, source)?
            }
            Bexpr::Let {
                imp,
                source,
                bindings,
                ..
            } => {
                debug!(imp = %imp.name, bindings = bindings.len(), "plan.compile.let");
                let source = self.compile_bexpr(source)?;
                let bindings = bindings
                    .iter()
                    .map(|binding| self.compile_let_binding(binding))
                    .collect::<Result<Vec<_>>>()?;
                let factory = self.resolve(OperatorKind::Let, imp, OperatorRegistry::let_factory)?;
                factory.create(imp, source, bindings)?
            }
        };
        Ok(Box::new(LocatedRelation::new(
            relation,
            node.metas().location(),
        )))
    }

    fn compile_let_binding(&self, binding: &LetBinding) -> Result<VariableBinding> {
        let expr = self.compile_expr(&binding.value)?;
        Ok(VariableBinding::new(setter(binding.decl), expr))
    }

    fn resolve<F: ?Sized>(
        &self,
        kind: OperatorKind,
        imp: &Impl,
        lookup: impl FnOnce(&OperatorRegistry, &str) -> std::result::Result<Arc<F>, LookupError>,
    ) -> Result<Arc<F>> {
        match lookup(&self.registry, &imp.name) {
            Ok(factory) => {
                debug!(kind = %kind, name = %imp.name, "plan.factory.resolve");
                Ok(factory)
            }
            Err(err) => {
                debug!(kind = %kind, name = %imp.name, error = %err, "plan.factory.unresolved");
                Err(Error::from(err.into_internal(kind, &imp.name)))
            }
        }
    }
}

fn setter(decl: VarDecl) -> SetVariable {
    SetVariable::new(decl.index)
}

fn null_padding(side: &Bexpr) -> NullPadding {
    NullPadding::new(accessible_var_decls(side).into_iter().map(|decl| decl.index))
}

/// Variables a relational sub-plan makes visible to its consumers: the
/// declarations of `node` and of every relational node below it, pre-order.
///
/// Scalar expressions are not entered, so sub-queries nested inside them do
/// not contribute.
pub fn accessible_var_decls(node: &Bexpr) -> Vec<VarDecl> {
    let mut decls = Vec::new();
    collect_var_decls(node, &mut decls);
    decls
}

fn collect_var_decls(node: &Bexpr, decls: &mut Vec<VarDecl>) {
    decls.extend(node.own_var_decls());
    for child in node.children() {
        collect_var_decls(child, decls);
    }
}

/// Registers a plan needs: one past the highest register it declares or
/// reads anywhere, sub-queries included.
pub fn register_count(plan: &Bexpr) -> usize {
    let mut count = 0;
    count_bexpr(plan, &mut count);
    count
}

fn count_bexpr(node: &Bexpr, count: &mut usize) {
    for decl in node.own_var_decls() {
        *count = (*count).max(decl.index + 1);
    }
    for expr in node.own_exprs() {
        count_expr(expr, count);
    }
    for child in node.children() {
        count_bexpr(child, count);
    }
}

fn count_expr(expr: &Expr, count: &mut usize) {
    match expr {
        Expr::LocalId { index, .. } => *count = (*count).max(index + 1),
        Expr::Lit { .. } | Expr::Missing { .. } | Expr::GlobalId { .. } | Expr::Parameter { .. } => {}
        Expr::NAry { args, .. } => args.iter().for_each(|arg| count_expr(arg, count)),
        Expr::Struct { fields, .. } => {
            for field in fields {
                count_expr(&field.name, count);
                count_expr(&field.value, count);
            }
        }
        Expr::Collection { values, .. } => values.iter().for_each(|value| count_expr(value, count)),
        Expr::BindingsToValues { exp, query, .. } => {
            count_expr(exp, count);
            count_bexpr(query, count);
        }
    }
}
