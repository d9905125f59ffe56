#![allow(missing_docs)]

//! Read-only traversal of the expression tree.
//!
//! Same node taxonomy and child order as [`crate::query::rewrite`], without
//! rebuilding anything. Hooks return `Result<()>` so a visitor can stop at the
//! first failure; defaults delegate to the free `walk_*` functions.

use crate::error::Result;
use crate::query::ast::*;

/// Overridable read-only traversal.
pub trait Visitor {
    fn visit_expr(&mut self, node: &Expr) -> Result<()> {
        walk_expr(self, node)
    }

    fn visit_lit(&mut self, _node: &Lit) -> Result<()> {
        Ok(())
    }

    fn visit_var_ref(&mut self, _node: &VarRef) -> Result<()> {
        Ok(())
    }

    fn visit_nary(&mut self, node: &NAry) -> Result<()> {
        walk_all(self, &node.args)
    }

    fn visit_call_agg(&mut self, node: &CallAgg) -> Result<()> {
        self.visit_expr(&node.func)?;
        self.visit_expr(&node.arg)
    }

    fn visit_typed(&mut self, node: &Typed) -> Result<()> {
        self.visit_expr(&node.expr)?;
        self.visit_data_type(&node.data_type)
    }

    fn visit_data_type(&mut self, _data_type: &DataType) -> Result<()> {
        Ok(())
    }

    fn visit_path(&mut self, node: &Path) -> Result<()> {
        self.visit_expr(&node.root)?;
        for component in &node.components {
            self.visit_path_component(component)?;
        }
        Ok(())
    }

    fn visit_path_component(&mut self, component: &PathComponent) -> Result<()> {
        match component {
            PathComponent::Expr { expr, .. } => self.visit_expr(expr),
            PathComponent::Unpivot { .. } | PathComponent::Wildcard { .. } => Ok(()),
        }
    }

    fn visit_simple_case(&mut self, node: &SimpleCase) -> Result<()> {
        self.visit_expr(&node.value)?;
        for when in &node.whens {
            self.visit_expr(&when.value)?;
            self.visit_expr(&when.then)?;
        }
        walk_opt(self, node.default.as_deref())
    }

    fn visit_searched_case(&mut self, node: &SearchedCase) -> Result<()> {
        for when in &node.whens {
            self.visit_expr(&when.condition)?;
            self.visit_expr(&when.then)?;
        }
        walk_opt(self, node.default.as_deref())
    }

    fn visit_struct(&mut self, node: &Struct) -> Result<()> {
        walk_struct(self, node)
    }

    fn visit_seq(&mut self, node: &Seq) -> Result<()> {
        walk_all(self, &node.values)
    }

    fn visit_select(&mut self, node: &Select) -> Result<()> {
        walk_select(self, node)
    }

    fn visit_projection(&mut self, projection: &SelectProjection) -> Result<()> {
        walk_projection(self, projection)
    }

    fn visit_from_source(&mut self, source: &FromSource) -> Result<()> {
        walk_from_source(self, source)
    }

    fn visit_let_binding(&mut self, binding: &LetBinding) -> Result<()> {
        self.visit_expr(&binding.expr)
    }

    fn visit_group_by(&mut self, group_by: &GroupBy) -> Result<()> {
        for item in &group_by.items {
            self.visit_expr(&item.expr)?;
        }
        Ok(())
    }

    fn visit_sort_spec(&mut self, spec: &SortSpec) -> Result<()> {
        self.visit_expr(&spec.expr)
    }

    fn visit_parameter(&mut self, _node: &Parameter) -> Result<()> {
        Ok(())
    }

    fn visit_data_manipulation(&mut self, node: &DataManipulation) -> Result<()> {
        walk_data_manipulation(self, node)
    }

    fn visit_dml_op(&mut self, op: &DmlOp) -> Result<()> {
        walk_dml_op(self, op)
    }

    fn visit_ddl(&mut self, node: &Expr) -> Result<()> {
        match node {
            Expr::CreateIndex(node) => walk_all(self, &node.keys),
            _ => Ok(()),
        }
    }

    fn visit_null_if(&mut self, node: &NullIf) -> Result<()> {
        self.visit_expr(&node.left)?;
        self.visit_expr(&node.right)
    }

    fn visit_coalesce(&mut self, node: &Coalesce) -> Result<()> {
        walk_all(self, &node.args)
    }

    fn visit_exec(&mut self, node: &Exec) -> Result<()> {
        walk_all(self, &node.args)
    }

    /// `MISSING`, `DATE` and `TIME` literals.
    fn visit_leaf(&mut self, _node: &Expr) -> Result<()> {
        Ok(())
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, node: &Expr) -> Result<()> {
    match node {
        Expr::Lit(node) => v.visit_lit(node),
        Expr::Missing(_) | Expr::Date(_) | Expr::Time(_) => v.visit_leaf(node),
        Expr::Id(node) => v.visit_var_ref(node),
        Expr::NAry(node) => v.visit_nary(node),
        Expr::CallAgg(node) => v.visit_call_agg(node),
        Expr::Typed(node) => v.visit_typed(node),
        Expr::Path(node) => v.visit_path(node),
        Expr::SimpleCase(node) => v.visit_simple_case(node),
        Expr::SearchedCase(node) => v.visit_searched_case(node),
        Expr::Struct(node) => v.visit_struct(node),
        Expr::Seq(node) => v.visit_seq(node),
        Expr::Select(node) => v.visit_select(node),
        Expr::Parameter(node) => v.visit_parameter(node),
        Expr::Dml(node) => v.visit_data_manipulation(node),
        Expr::CreateTable(_) | Expr::CreateIndex(_) | Expr::DropTable(_) | Expr::DropIndex(_) => {
            v.visit_ddl(node)
        }
        Expr::NullIf(node) => v.visit_null_if(node),
        Expr::Coalesce(node) => v.visit_coalesce(node),
        Expr::Exec(node) => v.visit_exec(node),
    }
}

pub fn walk_struct<V: Visitor + ?Sized>(v: &mut V, node: &Struct) -> Result<()> {
    for field in &node.fields {
        v.visit_expr(&field.name)?;
        v.visit_expr(&field.value)?;
    }
    Ok(())
}

/// Visits `SELECT` clauses in the same order as
/// [`crate::query::rewrite::walk_select`].
pub fn walk_select<V: Visitor + ?Sized>(v: &mut V, node: &Select) -> Result<()> {
    if let Some(from) = &node.from {
        v.visit_from_source(from)?;
    }
    if let Some(from_let) = &node.from_let {
        for binding in &from_let.bindings {
            v.visit_let_binding(binding)?;
        }
    }
    walk_opt(v, node.where_clause.as_ref())?;
    if let Some(group_by) = &node.group_by {
        v.visit_group_by(group_by)?;
    }
    walk_opt(v, node.having.as_ref())?;
    v.visit_projection(&node.projection)?;
    if let Some(order_by) = &node.order_by {
        for spec in &order_by.sort_specs {
            v.visit_sort_spec(spec)?;
        }
    }
    walk_opt(v, node.offset.as_ref())?;
    walk_opt(v, node.limit.as_ref())
}

pub fn walk_projection<V: Visitor + ?Sized>(v: &mut V, projection: &SelectProjection) -> Result<()> {
    match projection {
        SelectProjection::List { items, .. } => {
            for item in items {
                match item {
                    SelectListItem::Star { .. } => {}
                    SelectListItem::Expr { expr, .. } | SelectListItem::ProjectAll { expr } => {
                        v.visit_expr(expr)?
                    }
                }
            }
            Ok(())
        }
        SelectProjection::Value { expr, .. } => v.visit_expr(expr),
        SelectProjection::Pivot { name, value, .. } => {
            v.visit_expr(name)?;
            v.visit_expr(value)
        }
    }
}

pub fn walk_from_source<V: Visitor + ?Sized>(v: &mut V, source: &FromSource) -> Result<()> {
    match source {
        FromSource::Expr(source) => v.visit_expr(&source.expr),
        FromSource::Unpivot(source) => v.visit_expr(&source.expr),
        FromSource::Join(join) => {
            v.visit_from_source(&join.left)?;
            v.visit_from_source(&join.right)?;
            v.visit_expr(&join.condition)
        }
    }
}

pub fn walk_data_manipulation<V: Visitor + ?Sized>(v: &mut V, node: &DataManipulation) -> Result<()> {
    if let Some(from) = &node.from {
        v.visit_from_source(from)?;
    }
    walk_opt(v, node.where_clause.as_ref())?;
    if let Some(returning) = &node.returning {
        for elem in &returning.elems {
            if let ReturningColumn::Expr(expr) = &elem.column {
                v.visit_expr(expr)?;
            }
        }
    }
    for op in &node.ops {
        v.visit_dml_op(op)?;
    }
    Ok(())
}

pub fn walk_dml_op<V: Visitor + ?Sized>(v: &mut V, op: &DmlOp) -> Result<()> {
    match op {
        DmlOp::Insert(op) => {
            v.visit_expr(&op.lvalue)?;
            v.visit_expr(&op.values)
        }
        DmlOp::InsertValue(op) => {
            v.visit_expr(&op.lvalue)?;
            v.visit_expr(&op.value)?;
            walk_opt(v, op.position.as_ref())?;
            match &op.on_conflict {
                Some(on_conflict) => v.visit_expr(&on_conflict.condition),
                None => Ok(()),
            }
        }
        DmlOp::Assignment(op) => {
            v.visit_expr(&op.lvalue)?;
            v.visit_expr(&op.rvalue)
        }
        DmlOp::Remove(op) => v.visit_expr(&op.lvalue),
        DmlOp::Delete(_) => Ok(()),
    }
}

fn walk_all<V: Visitor + ?Sized>(v: &mut V, exprs: &[Expr]) -> Result<()> {
    for expr in exprs {
        v.visit_expr(expr)?;
    }
    Ok(())
}

fn walk_opt<V: Visitor + ?Sized>(v: &mut V, expr: Option<&Expr>) -> Result<()> {
    match expr {
        Some(expr) => v.visit_expr(expr),
        None => Ok(()),
    }
}
