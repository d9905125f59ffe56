//! Structural copy-transform over the expression tree.
//!
//! A [`Rewriter`] has one hook per node kind. Every hook defaults to a deep
//! copy that rebuilds the node from its recursively rewritten children, so an
//! implementation only overrides the hooks it cares about. The default for a
//! hook is the matching free `walk_*` function, which an override can call to
//! reuse the base traversal (much like `syn::fold`).
//!
//! `SELECT` and DML children are visited in semantic order rather than field
//! order; see [`walk_select`] and [`walk_data_manipulation`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::query::ast::*;
use crate::query::metadata::MetaContainer;

/// Cooperative cancellation flag shared between a rewrite and its caller.
///
/// Cloning the token shares the flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing flag.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    /// Requests cancellation. Rewrites observing this token stop at the next
    /// node they enter.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fails with [`Error::Interrupted`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            debug!("rewrite.interrupted");
            return Err(Error::Interrupted);
        }
        Ok(())
    }
}

/// Overridable tree transformation. All hooks default to identity.
pub trait Rewriter {
    /// Token checked on entry to every expression node.
    fn cancellation_token(&self) -> Option<&CancellationToken> {
        None
    }

    /// Entry point for any expression node.
    fn rewrite_expr(&mut self, node: &Expr) -> Result<Expr> {
        walk_expr(self, node)
    }

    /// Called once for the metas of every node that owns them.
    fn rewrite_metas(&mut self, metas: &MetaContainer) -> Result<MetaContainer> {
        Ok(metas.clone())
    }

    fn rewrite_lit(&mut self, node: &Lit) -> Result<Expr> {
        walk_lit(self, node)
    }

    fn rewrite_missing(&mut self, node: &Missing) -> Result<Expr> {
        walk_missing(self, node)
    }

    fn rewrite_var_ref(&mut self, node: &VarRef) -> Result<Expr> {
        walk_var_ref(self, node)
    }

    fn rewrite_nary(&mut self, node: &NAry) -> Result<Expr> {
        walk_nary(self, node)
    }

    fn rewrite_call_agg(&mut self, node: &CallAgg) -> Result<Expr> {
        walk_call_agg(self, node)
    }

    fn rewrite_typed(&mut self, node: &Typed) -> Result<Expr> {
        walk_typed(self, node)
    }

    fn rewrite_path(&mut self, node: &Path) -> Result<Expr> {
        walk_path(self, node)
    }

    fn rewrite_simple_case(&mut self, node: &SimpleCase) -> Result<Expr> {
        walk_simple_case(self, node)
    }

    fn rewrite_searched_case(&mut self, node: &SearchedCase) -> Result<Expr> {
        walk_searched_case(self, node)
    }

    fn rewrite_struct(&mut self, node: &Struct) -> Result<Expr> {
        walk_struct(self, node)
    }

    /// `index` is the field's position in the constructor.
    fn rewrite_struct_field(&mut self, field: &StructField, index: usize) -> Result<StructField> {
        walk_struct_field(self, field, index)
    }

    fn rewrite_seq(&mut self, node: &Seq) -> Result<Expr> {
        walk_seq(self, node)
    }

    fn rewrite_seq_kind(&mut self, kind: SeqKind) -> Result<SeqKind> {
        Ok(kind)
    }

    /// Overridable entry for `SELECT`. Overrides that want the default
    /// traversal for the node itself call [`walk_select`].
    fn rewrite_select(&mut self, node: &Select) -> Result<Expr> {
        Ok(Expr::Select(Box::new(walk_select(self, node)?)))
    }

    fn rewrite_select_where(&mut self, node: &Expr) -> Result<Expr> {
        self.rewrite_expr(node)
    }

    fn rewrite_select_having(&mut self, node: &Expr) -> Result<Expr> {
        self.rewrite_expr(node)
    }

    fn rewrite_select_offset(&mut self, node: &Expr) -> Result<Expr> {
        self.rewrite_expr(node)
    }

    fn rewrite_select_limit(&mut self, node: &Expr) -> Result<Expr> {
        self.rewrite_expr(node)
    }

    fn rewrite_select_metas(&mut self, node: &Select) -> Result<MetaContainer> {
        self.rewrite_metas(&node.metas)
    }

    fn rewrite_projection(&mut self, projection: &SelectProjection) -> Result<SelectProjection> {
        walk_projection(self, projection)
    }

    fn rewrite_select_list_item(&mut self, item: &SelectListItem) -> Result<SelectListItem> {
        walk_select_list_item(self, item)
    }

    fn rewrite_path_component(&mut self, component: &PathComponent) -> Result<PathComponent> {
        walk_path_component(self, component)
    }

    fn rewrite_path_component_expr(
        &mut self,
        expr: &Expr,
        case: CaseSensitivity,
        metas: &MetaContainer,
    ) -> Result<PathComponent> {
        Ok(PathComponent::Expr {
            expr: self.rewrite_expr(expr)?,
            case,
            metas: self.rewrite_metas(metas)?,
        })
    }

    fn rewrite_path_component_unpivot(&mut self, metas: &MetaContainer) -> Result<PathComponent> {
        Ok(PathComponent::Unpivot {
            metas: self.rewrite_metas(metas)?,
        })
    }

    fn rewrite_path_component_wildcard(&mut self, metas: &MetaContainer) -> Result<PathComponent> {
        Ok(PathComponent::Wildcard {
            metas: self.rewrite_metas(metas)?,
        })
    }

    fn rewrite_from_source(&mut self, source: &FromSource) -> Result<FromSource> {
        walk_from_source(self, source)
    }

    fn rewrite_from_source_expr(&mut self, source: &FromSourceExpr) -> Result<FromSource> {
        Ok(FromSource::Expr(FromSourceExpr {
            expr: self.rewrite_from_source_value_expr(&source.expr)?,
            variables: self.rewrite_let_variables(&source.variables)?,
        }))
    }

    fn rewrite_from_source_unpivot(&mut self, source: &FromSourceUnpivot) -> Result<FromSource> {
        Ok(FromSource::Unpivot(FromSourceUnpivot {
            expr: self.rewrite_from_source_value_expr(&source.expr)?,
            variables: self.rewrite_let_variables(&source.variables)?,
            metas: self.rewrite_metas(&source.metas)?,
        }))
    }

    fn rewrite_from_source_join(&mut self, source: &FromSourceJoin) -> Result<FromSource> {
        Ok(FromSource::Join(FromSourceJoin {
            op: source.op,
            left: Box::new(self.rewrite_from_source(&source.left)?),
            right: Box::new(self.rewrite_from_source(&source.right)?),
            condition: self.rewrite_expr(&source.condition)?,
            metas: self.rewrite_metas(&source.metas)?,
        }))
    }

    /// Expression of an expression or `UNPIVOT` from source only.
    fn rewrite_from_source_value_expr(&mut self, expr: &Expr) -> Result<Expr> {
        self.rewrite_expr(expr)
    }

    fn rewrite_let_variables(&mut self, variables: &LetVariables) -> Result<LetVariables> {
        Ok(LetVariables {
            as_name: rewrite_opt_name(self, variables.as_name.as_ref())?,
            at_name: rewrite_opt_name(self, variables.at_name.as_ref())?,
            by_name: rewrite_opt_name(self, variables.by_name.as_ref())?,
        })
    }

    fn rewrite_let_source(&mut self, source: &LetSource) -> Result<LetSource> {
        let bindings = source
            .bindings
            .iter()
            .map(|binding| self.rewrite_let_binding(binding))
            .collect::<Result<Vec<_>>>()?;
        Ok(LetSource { bindings })
    }

    fn rewrite_let_binding(&mut self, binding: &LetBinding) -> Result<LetBinding> {
        Ok(LetBinding {
            expr: self.rewrite_expr(&binding.expr)?,
            name: self.rewrite_symbolic_name(&binding.name)?,
        })
    }

    fn rewrite_group_by(&mut self, group_by: &GroupBy) -> Result<GroupBy> {
        let items = group_by
            .items
            .iter()
            .map(|item| self.rewrite_group_by_item(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(GroupBy {
            strategy: group_by.strategy,
            items,
            group_as: rewrite_opt_name(self, group_by.group_as.as_ref())?,
        })
    }

    fn rewrite_group_by_item(&mut self, item: &GroupByItem) -> Result<GroupByItem> {
        Ok(GroupByItem {
            expr: self.rewrite_expr(&item.expr)?,
            as_name: rewrite_opt_name(self, item.as_name.as_ref())?,
        })
    }

    fn rewrite_order_by(&mut self, order_by: &OrderBy) -> Result<OrderBy> {
        let sort_specs = order_by
            .sort_specs
            .iter()
            .map(|spec| self.rewrite_sort_spec(spec))
            .collect::<Result<Vec<_>>>()?;
        Ok(OrderBy { sort_specs })
    }

    fn rewrite_sort_spec(&mut self, spec: &SortSpec) -> Result<SortSpec> {
        Ok(SortSpec {
            expr: self.rewrite_expr(&spec.expr)?,
            ordering: spec.ordering,
            nulls: spec.nulls,
        })
    }

    fn rewrite_data_type(&mut self, data_type: &DataType) -> Result<DataType> {
        Ok(DataType {
            kind: data_type.kind,
            metas: self.rewrite_metas(&data_type.metas)?,
        })
    }

    fn rewrite_simple_case_when(&mut self, when: &SimpleCaseWhen) -> Result<SimpleCaseWhen> {
        Ok(SimpleCaseWhen {
            value: self.rewrite_expr(&when.value)?,
            then: self.rewrite_expr(&when.then)?,
        })
    }

    fn rewrite_searched_case_when(&mut self, when: &SearchedCaseWhen) -> Result<SearchedCaseWhen> {
        Ok(SearchedCaseWhen {
            condition: self.rewrite_expr(&when.condition)?,
            then: self.rewrite_expr(&when.then)?,
        })
    }

    fn rewrite_symbolic_name(&mut self, name: &SymbolicName) -> Result<SymbolicName> {
        Ok(SymbolicName {
            name: name.name.clone(),
            metas: self.rewrite_metas(&name.metas)?,
        })
    }

    fn rewrite_identifier(&mut self, identifier: &Identifier) -> Result<Identifier> {
        Ok(Identifier {
            name: identifier.name.clone(),
            case: identifier.case,
            metas: self.rewrite_metas(&identifier.metas)?,
        })
    }

    fn rewrite_parameter(&mut self, node: &Parameter) -> Result<Expr> {
        Ok(Expr::Parameter(Parameter {
            position: node.position,
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    /// Overridable entry for DML statements; see [`walk_data_manipulation`].
    fn rewrite_data_manipulation(&mut self, node: &DataManipulation) -> Result<Expr> {
        Ok(Expr::Dml(Box::new(walk_data_manipulation(self, node)?)))
    }

    fn rewrite_dml_where(&mut self, node: &Expr) -> Result<Expr> {
        self.rewrite_expr(node)
    }

    fn rewrite_returning(&mut self, returning: &Returning) -> Result<Returning> {
        let elems = returning
            .elems
            .iter()
            .map(|elem| self.rewrite_returning_elem(elem))
            .collect::<Result<Vec<_>>>()?;
        Ok(Returning { elems })
    }

    fn rewrite_returning_elem(&mut self, elem: &ReturningElem) -> Result<ReturningElem> {
        let column = match &elem.column {
            ReturningColumn::Wildcard => ReturningColumn::Wildcard,
            ReturningColumn::Expr(expr) => ReturningColumn::Expr(self.rewrite_expr(expr)?),
        };
        Ok(ReturningElem {
            mapping: elem.mapping,
            column,
        })
    }

    /// The whole operation list. Implementations must keep the order.
    fn rewrite_dml_ops(&mut self, ops: &[DmlOp]) -> Result<Vec<DmlOp>> {
        ops.iter().map(|op| self.rewrite_dml_op(op)).collect()
    }

    fn rewrite_dml_op(&mut self, op: &DmlOp) -> Result<DmlOp> {
        walk_dml_op(self, op)
    }

    fn rewrite_insert(&mut self, op: &InsertOp) -> Result<DmlOp> {
        Ok(DmlOp::Insert(InsertOp {
            lvalue: self.rewrite_expr(&op.lvalue)?,
            values: self.rewrite_expr(&op.values)?,
            metas: self.rewrite_metas(&op.metas)?,
        }))
    }

    fn rewrite_insert_value(&mut self, op: &InsertValueOp) -> Result<DmlOp> {
        Ok(DmlOp::InsertValue(InsertValueOp {
            lvalue: self.rewrite_expr(&op.lvalue)?,
            value: self.rewrite_expr(&op.value)?,
            position: op
                .position
                .as_ref()
                .map(|position| self.rewrite_expr(position))
                .transpose()?,
            on_conflict: op
                .on_conflict
                .as_ref()
                .map(|on_conflict| self.rewrite_on_conflict(on_conflict))
                .transpose()?,
            metas: self.rewrite_metas(&op.metas)?,
        }))
    }

    fn rewrite_on_conflict(&mut self, on_conflict: &OnConflict) -> Result<OnConflict> {
        Ok(OnConflict {
            condition: self.rewrite_expr(&on_conflict.condition)?,
            action: on_conflict.action,
        })
    }

    fn rewrite_assignment(&mut self, op: &AssignmentOp) -> Result<DmlOp> {
        Ok(DmlOp::Assignment(AssignmentOp {
            lvalue: self.rewrite_expr(&op.lvalue)?,
            rvalue: self.rewrite_expr(&op.rvalue)?,
            metas: self.rewrite_metas(&op.metas)?,
        }))
    }

    fn rewrite_remove(&mut self, op: &RemoveOp) -> Result<DmlOp> {
        Ok(DmlOp::Remove(RemoveOp {
            lvalue: self.rewrite_expr(&op.lvalue)?,
            metas: self.rewrite_metas(&op.metas)?,
        }))
    }

    fn rewrite_delete(&mut self, op: &DeleteOp) -> Result<DmlOp> {
        Ok(DmlOp::Delete(DeleteOp {
            metas: self.rewrite_metas(&op.metas)?,
        }))
    }

    fn rewrite_create_table(&mut self, node: &CreateTable) -> Result<Expr> {
        Ok(Expr::CreateTable(CreateTable {
            name: node.name.clone(),
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_create_index(&mut self, node: &CreateIndex) -> Result<Expr> {
        let table = self.rewrite_identifier(&node.table)?;
        let keys = rewrite_all(self, &node.keys)?;
        Ok(Expr::CreateIndex(CreateIndex {
            table,
            keys,
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_drop_table(&mut self, node: &DropTable) -> Result<Expr> {
        Ok(Expr::DropTable(DropTable {
            table: self.rewrite_identifier(&node.table)?,
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_drop_index(&mut self, node: &DropIndex) -> Result<Expr> {
        Ok(Expr::DropIndex(DropIndex {
            table: self.rewrite_identifier(&node.table)?,
            index: self.rewrite_identifier(&node.index)?,
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_null_if(&mut self, node: &NullIf) -> Result<Expr> {
        Ok(Expr::NullIf(NullIf {
            left: Box::new(self.rewrite_expr(&node.left)?),
            right: Box::new(self.rewrite_expr(&node.right)?),
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_coalesce(&mut self, node: &Coalesce) -> Result<Expr> {
        Ok(Expr::Coalesce(Coalesce {
            args: rewrite_all(self, &node.args)?,
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_exec(&mut self, node: &Exec) -> Result<Expr> {
        Ok(Expr::Exec(Exec {
            procedure: self.rewrite_symbolic_name(&node.procedure)?,
            args: rewrite_all(self, &node.args)?,
            metas: self.rewrite_metas(&node.metas)?,
        }))
    }

    fn rewrite_date(&mut self, node: &DateLiteral) -> Result<Expr> {
        Ok(Expr::Date(DateLiteral {
            metas: self.rewrite_metas(&node.metas)?,
            ..node.clone()
        }))
    }

    fn rewrite_time(&mut self, node: &TimeLiteral) -> Result<Expr> {
        Ok(Expr::Time(TimeLiteral {
            metas: self.rewrite_metas(&node.metas)?,
            ..node.clone()
        }))
    }
}

/// Checks the rewriter's cancellation token, then dispatches on the node kind.
pub fn walk_expr<R: Rewriter + ?Sized>(r: &mut R, node: &Expr) -> Result<Expr> {
    if let Some(token) = r.cancellation_token() {
        token.check()?;
    }
    match node {
        Expr::Lit(node) => r.rewrite_lit(node),
        Expr::Missing(node) => r.rewrite_missing(node),
        Expr::Id(node) => r.rewrite_var_ref(node),
        Expr::NAry(node) => r.rewrite_nary(node),
        Expr::CallAgg(node) => r.rewrite_call_agg(node),
        Expr::Typed(node) => r.rewrite_typed(node),
        Expr::Path(node) => r.rewrite_path(node),
        Expr::SimpleCase(node) => r.rewrite_simple_case(node),
        Expr::SearchedCase(node) => r.rewrite_searched_case(node),
        Expr::Struct(node) => r.rewrite_struct(node),
        Expr::Seq(node) => r.rewrite_seq(node),
        Expr::Select(node) => r.rewrite_select(node),
        Expr::Parameter(node) => r.rewrite_parameter(node),
        Expr::Dml(node) => r.rewrite_data_manipulation(node),
        Expr::CreateTable(node) => r.rewrite_create_table(node),
        Expr::CreateIndex(node) => r.rewrite_create_index(node),
        Expr::DropTable(node) => r.rewrite_drop_table(node),
        Expr::DropIndex(node) => r.rewrite_drop_index(node),
        Expr::NullIf(node) => r.rewrite_null_if(node),
        Expr::Coalesce(node) => r.rewrite_coalesce(node),
        Expr::Exec(node) => r.rewrite_exec(node),
        Expr::Date(node) => r.rewrite_date(node),
        Expr::Time(node) => r.rewrite_time(node),
    }
}

pub fn walk_lit<R: Rewriter + ?Sized>(r: &mut R, node: &Lit) -> Result<Expr> {
    Ok(Expr::Lit(Lit {
        value: node.value.clone(),
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_missing<R: Rewriter + ?Sized>(r: &mut R, node: &Missing) -> Result<Expr> {
    Ok(Expr::Missing(Missing {
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_var_ref<R: Rewriter + ?Sized>(r: &mut R, node: &VarRef) -> Result<Expr> {
    Ok(Expr::Id(VarRef {
        name: node.name.clone(),
        case: node.case,
        qualifier: node.qualifier,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_nary<R: Rewriter + ?Sized>(r: &mut R, node: &NAry) -> Result<Expr> {
    Ok(Expr::NAry(NAry {
        op: node.op,
        args: rewrite_all(r, &node.args)?,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_call_agg<R: Rewriter + ?Sized>(r: &mut R, node: &CallAgg) -> Result<Expr> {
    Ok(Expr::CallAgg(CallAgg {
        func: Box::new(r.rewrite_expr(&node.func)?),
        setq: node.setq,
        arg: Box::new(r.rewrite_expr(&node.arg)?),
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_typed<R: Rewriter + ?Sized>(r: &mut R, node: &Typed) -> Result<Expr> {
    Ok(Expr::Typed(Typed {
        op: node.op,
        expr: Box::new(r.rewrite_expr(&node.expr)?),
        data_type: r.rewrite_data_type(&node.data_type)?,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_path<R: Rewriter + ?Sized>(r: &mut R, node: &Path) -> Result<Expr> {
    let root = Box::new(r.rewrite_expr(&node.root)?);
    let components = node
        .components
        .iter()
        .map(|component| r.rewrite_path_component(component))
        .collect::<Result<Vec<_>>>()?;
    Ok(Expr::Path(Path {
        root,
        components,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_path_component<R: Rewriter + ?Sized>(
    r: &mut R,
    component: &PathComponent,
) -> Result<PathComponent> {
    match component {
        PathComponent::Expr { expr, case, metas } => r.rewrite_path_component_expr(expr, *case, metas),
        PathComponent::Unpivot { metas } => r.rewrite_path_component_unpivot(metas),
        PathComponent::Wildcard { metas } => r.rewrite_path_component_wildcard(metas),
    }
}

pub fn walk_simple_case<R: Rewriter + ?Sized>(r: &mut R, node: &SimpleCase) -> Result<Expr> {
    let value = Box::new(r.rewrite_expr(&node.value)?);
    let whens = node
        .whens
        .iter()
        .map(|when| r.rewrite_simple_case_when(when))
        .collect::<Result<Vec<_>>>()?;
    let default = rewrite_opt_box(r, node.default.as_deref())?;
    Ok(Expr::SimpleCase(SimpleCase {
        value,
        whens,
        default,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_searched_case<R: Rewriter + ?Sized>(r: &mut R, node: &SearchedCase) -> Result<Expr> {
    let whens = node
        .whens
        .iter()
        .map(|when| r.rewrite_searched_case_when(when))
        .collect::<Result<Vec<_>>>()?;
    let default = rewrite_opt_box(r, node.default.as_deref())?;
    Ok(Expr::SearchedCase(SearchedCase {
        whens,
        default,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_struct<R: Rewriter + ?Sized>(r: &mut R, node: &Struct) -> Result<Expr> {
    let fields = node
        .fields
        .iter()
        .enumerate()
        .map(|(index, field)| r.rewrite_struct_field(field, index))
        .collect::<Result<Vec<_>>>()?;
    Ok(Expr::Struct(Struct {
        fields,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

pub fn walk_struct_field<R: Rewriter + ?Sized>(
    r: &mut R,
    field: &StructField,
    _index: usize,
) -> Result<StructField> {
    Ok(StructField {
        name: r.rewrite_expr(&field.name)?,
        value: r.rewrite_expr(&field.value)?,
    })
}

pub fn walk_seq<R: Rewriter + ?Sized>(r: &mut R, node: &Seq) -> Result<Expr> {
    Ok(Expr::Seq(Seq {
        kind: r.rewrite_seq_kind(node.kind)?,
        values: rewrite_all(r, &node.values)?,
        metas: r.rewrite_metas(&node.metas)?,
    }))
}

/// Base `SELECT` traversal, in semantic order:
///
/// 1. `FROM`
/// 2. `LET`
/// 3. `WHERE`
/// 4. `GROUP BY`
/// 5. `HAVING`
/// 6. projection
/// 7. `ORDER BY`
/// 8. `OFFSET`
/// 9. `LIMIT`
/// 10. metas
pub fn walk_select<R: Rewriter + ?Sized>(r: &mut R, node: &Select) -> Result<Select> {
    let from = node
        .from
        .as_ref()
        .map(|from| r.rewrite_from_source(from))
        .transpose()?;
    let from_let = node
        .from_let
        .as_ref()
        .map(|from_let| r.rewrite_let_source(from_let))
        .transpose()?;
    let where_clause = node
        .where_clause
        .as_ref()
        .map(|expr| r.rewrite_select_where(expr))
        .transpose()?;
    let group_by = node
        .group_by
        .as_ref()
        .map(|group_by| r.rewrite_group_by(group_by))
        .transpose()?;
    let having = node
        .having
        .as_ref()
        .map(|expr| r.rewrite_select_having(expr))
        .transpose()?;
    let projection = r.rewrite_projection(&node.projection)?;
    let order_by = node
        .order_by
        .as_ref()
        .map(|order_by| r.rewrite_order_by(order_by))
        .transpose()?;
    let offset = node
        .offset
        .as_ref()
        .map(|expr| r.rewrite_select_offset(expr))
        .transpose()?;
    let limit = node
        .limit
        .as_ref()
        .map(|expr| r.rewrite_select_limit(expr))
        .transpose()?;
    let metas = r.rewrite_select_metas(node)?;
    Ok(Select {
        setq: node.setq,
        projection,
        from,
        from_let,
        where_clause,
        group_by,
        having,
        order_by,
        offset,
        limit,
        metas,
    })
}

pub fn walk_projection<R: Rewriter + ?Sized>(
    r: &mut R,
    projection: &SelectProjection,
) -> Result<SelectProjection> {
    match projection {
        SelectProjection::List { items, metas } => {
            let items = items
                .iter()
                .map(|item| r.rewrite_select_list_item(item))
                .collect::<Result<Vec<_>>>()?;
            Ok(SelectProjection::List {
                items,
                metas: r.rewrite_metas(metas)?,
            })
        }
        SelectProjection::Value { expr, metas } => Ok(SelectProjection::Value {
            expr: r.rewrite_expr(expr)?,
            metas: r.rewrite_metas(metas)?,
        }),
        SelectProjection::Pivot { name, value, metas } => Ok(SelectProjection::Pivot {
            name: r.rewrite_expr(name)?,
            value: r.rewrite_expr(value)?,
            metas: r.rewrite_metas(metas)?,
        }),
    }
}

pub fn walk_select_list_item<R: Rewriter + ?Sized>(
    r: &mut R,
    item: &SelectListItem,
) -> Result<SelectListItem> {
    match item {
        SelectListItem::Star { metas } => Ok(SelectListItem::Star {
            metas: r.rewrite_metas(metas)?,
        }),
        SelectListItem::Expr { expr, as_name } => Ok(SelectListItem::Expr {
            expr: r.rewrite_expr(expr)?,
            as_name: rewrite_opt_name(r, as_name.as_ref())?,
        }),
        SelectListItem::ProjectAll { expr } => Ok(SelectListItem::ProjectAll {
            expr: r.rewrite_expr(expr)?,
        }),
    }
}

pub fn walk_from_source<R: Rewriter + ?Sized>(r: &mut R, source: &FromSource) -> Result<FromSource> {
    match source {
        FromSource::Expr(source) => r.rewrite_from_source_expr(source),
        FromSource::Join(source) => r.rewrite_from_source_join(source),
        FromSource::Unpivot(source) => r.rewrite_from_source_unpivot(source),
    }
}

/// Base DML traversal: `FROM`, `WHERE`, `RETURNING`, the operation list, then
/// metas.
pub fn walk_data_manipulation<R: Rewriter + ?Sized>(
    r: &mut R,
    node: &DataManipulation,
) -> Result<DataManipulation> {
    let from = node
        .from
        .as_ref()
        .map(|from| r.rewrite_from_source(from))
        .transpose()?;
    let where_clause = node
        .where_clause
        .as_ref()
        .map(|expr| r.rewrite_dml_where(expr))
        .transpose()?;
    let returning = node
        .returning
        .as_ref()
        .map(|returning| r.rewrite_returning(returning))
        .transpose()?;
    let ops = r.rewrite_dml_ops(&node.ops)?;
    let metas = r.rewrite_metas(&node.metas)?;
    Ok(DataManipulation {
        ops,
        from,
        where_clause,
        returning,
        metas,
    })
}

pub fn walk_dml_op<R: Rewriter + ?Sized>(r: &mut R, op: &DmlOp) -> Result<DmlOp> {
    match op {
        DmlOp::Insert(op) => r.rewrite_insert(op),
        DmlOp::InsertValue(op) => r.rewrite_insert_value(op),
        DmlOp::Assignment(op) => r.rewrite_assignment(op),
        DmlOp::Remove(op) => r.rewrite_remove(op),
        DmlOp::Delete(op) => r.rewrite_delete(op),
    }
}

fn rewrite_all<R: Rewriter + ?Sized>(r: &mut R, exprs: &[Expr]) -> Result<Vec<Expr>> {
    exprs.iter().map(|expr| r.rewrite_expr(expr)).collect()
}

fn rewrite_opt_box<R: Rewriter + ?Sized>(r: &mut R, expr: Option<&Expr>) -> Result<Option<Box<Expr>>> {
    expr.map(|expr| r.rewrite_expr(expr).map(Box::new)).transpose()
}

fn rewrite_opt_name<R: Rewriter + ?Sized>(
    r: &mut R,
    name: Option<&SymbolicName>,
) -> Result<Option<SymbolicName>> {
    name.map(|name| r.rewrite_symbolic_name(name)).transpose()
}

/// Rewriter that copies the tree unchanged, optionally honouring a
/// cancellation token.
#[derive(Debug, Default)]
pub struct IdentityRewriter {
    token: Option<CancellationToken>,
}

impl IdentityRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self { token: Some(token) }
    }
}

impl Rewriter for IdentityRewriter {
    fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }
}
