#![allow(missing_docs)]

//! Fluent helpers for constructing expression trees in code.
//!
//! The parser is the usual producer of trees; these helpers exist for tools,
//! tests and benchmarks that need to build queries programmatically.

use crate::query::ast::*;
use crate::query::metadata::{MetaContainer, SourceLocation, COUNT_STAR};
use crate::query::value::Value;

/// Literal node.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Lit(Lit {
        value: value.into(),
        metas: MetaContainer::new(),
    })
}

/// `MISSING` literal.
pub fn missing() -> Expr {
    Expr::Missing(Missing::default())
}

/// Case-insensitive, unqualified variable reference.
pub fn id(name: impl Into<String>) -> Expr {
    Expr::Id(VarRef {
        name: name.into(),
        case: CaseSensitivity::Insensitive,
        qualifier: ScopeQualifier::Unqualified,
        metas: MetaContainer::new(),
    })
}

pub fn nary(op: NAryOp, args: Vec<Expr>) -> Expr {
    Expr::NAry(NAry {
        op,
        args,
        metas: MetaContainer::new(),
    })
}

/// Positional parameter, numbered from 1.
pub fn param(position: usize) -> Expr {
    Expr::Parameter(Parameter {
        position,
        metas: MetaContainer::new(),
    })
}

pub fn seq(kind: SeqKind, values: Vec<Expr>) -> Expr {
    Expr::Seq(Seq {
        kind,
        values,
        metas: MetaContainer::new(),
    })
}

/// Struct constructor from `(name, value)` pairs.
pub fn struct_of(fields: Vec<(Expr, Expr)>) -> Expr {
    Expr::Struct(Struct {
        fields: fields
            .into_iter()
            .map(|(name, value)| StructField { name, value })
            .collect(),
        metas: MetaContainer::new(),
    })
}

/// Aggregate call such as `SUM(DISTINCT x)`.
pub fn call_agg(func: &str, setq: SetQuantifier, arg: Expr) -> Expr {
    Expr::CallAgg(CallAgg {
        func: Box::new(id(func)),
        setq,
        arg: Box::new(arg),
        metas: MetaContainer::new(),
    })
}

/// `COUNT(*)`, or `COUNT(DISTINCT *)` when `setq` is distinct.
pub fn count_star(setq: SetQuantifier) -> Expr {
    let mut call = call_agg("count", setq, lit(1));
    let metas = call.metas_mut();
    *metas = std::mem::take(metas).with_flag(COUNT_STAR);
    call
}

/// `CAST(expr AS type)`.
pub fn cast(expr: Expr, kind: SqlDataType) -> Expr {
    Expr::Typed(Typed {
        op: TypedOp::Cast,
        expr: Box::new(expr),
        data_type: DataType {
            kind,
            metas: MetaContainer::new(),
        },
        metas: MetaContainer::new(),
    })
}

/// Replaces the node's location with `line:column`.
pub fn located(mut expr: Expr, line: i64, column: i64) -> Expr {
    let metas = expr.metas_mut();
    *metas = std::mem::take(metas).with_location(SourceLocation::new(line, column));
    expr
}

pub fn symbol(name: impl Into<String>) -> SymbolicName {
    SymbolicName {
        name: name.into(),
        metas: MetaContainer::new(),
    }
}

/// `FROM expr AS name`.
pub fn scan(expr: Expr, as_name: &str) -> FromSource {
    FromSource::Expr(FromSourceExpr {
        expr,
        variables: LetVariables {
            as_name: Some(symbol(as_name)),
            ..LetVariables::default()
        },
    })
}

/// `FROM expr AS name AT ordinal`.
pub fn scan_at(expr: Expr, as_name: &str, at_name: &str) -> FromSource {
    FromSource::Expr(FromSourceExpr {
        expr,
        variables: LetVariables {
            as_name: Some(symbol(as_name)),
            at_name: Some(symbol(at_name)),
            by_name: None,
        },
    })
}

pub fn join(op: JoinOp, left: FromSource, right: FromSource, condition: Expr) -> FromSource {
    FromSource::Join(FromSourceJoin {
        op,
        left: Box::new(left),
        right: Box::new(right),
        condition,
        metas: MetaContainer::new(),
    })
}

/// `SELECT VALUE expr`.
pub fn select_value(expr: Expr) -> SelectBuilder {
    SelectBuilder::new(SelectProjection::Value {
        expr,
        metas: MetaContainer::new(),
    })
}

/// `SELECT e1, e2 AS n, ...` from `(expr, alias)` pairs.
pub fn select_list(items: Vec<(Expr, Option<&str>)>) -> SelectBuilder {
    let items = items
        .into_iter()
        .map(|(expr, as_name)| SelectListItem::Expr {
            expr,
            as_name: as_name.map(symbol),
        })
        .collect();
    SelectBuilder::new(SelectProjection::List {
        items,
        metas: MetaContainer::new(),
    })
}

/// `PIVOT value AT name`.
pub fn pivot(value: Expr, name: Expr) -> SelectBuilder {
    SelectBuilder::new(SelectProjection::Pivot {
        name,
        value,
        metas: MetaContainer::new(),
    })
}

/// Accumulates `SELECT` clauses.
#[derive(Clone, Debug)]
pub struct SelectBuilder {
    select: Select,
}

impl SelectBuilder {
    fn new(projection: SelectProjection) -> Self {
        Self {
            select: Select {
                setq: SetQuantifier::All,
                projection,
                from: None,
                from_let: None,
                where_clause: None,
                group_by: None,
                having: None,
                order_by: None,
                offset: None,
                limit: None,
                metas: MetaContainer::new(),
            },
        }
    }

    pub fn distinct(mut self) -> Self {
        self.select.setq = SetQuantifier::Distinct;
        self
    }

    pub fn from(mut self, source: FromSource) -> Self {
        self.select.from = Some(source);
        self
    }

    /// Appends a `LET expr AS name` binding.
    pub fn let_binding(mut self, expr: Expr, name: &str) -> Self {
        let binding = LetBinding {
            expr,
            name: symbol(name),
        };
        match &mut self.select.from_let {
            Some(source) => source.bindings.push(binding),
            None => {
                self.select.from_let = Some(LetSource {
                    bindings: vec![binding],
                })
            }
        }
        self
    }

    pub fn where_clause(mut self, predicate: Expr) -> Self {
        self.select.where_clause = Some(predicate);
        self
    }

    /// `GROUP BY` over the given keys.
    pub fn group_by(self, keys: Vec<Expr>) -> Self {
        self.grouping(GroupingStrategy::Full, keys)
    }

    /// `GROUP PARTIAL BY` over the given keys.
    pub fn group_partial(self, keys: Vec<Expr>) -> Self {
        self.grouping(GroupingStrategy::Partial, keys)
    }

    fn grouping(mut self, strategy: GroupingStrategy, keys: Vec<Expr>) -> Self {
        self.select.group_by = Some(GroupBy {
            strategy,
            items: keys
                .into_iter()
                .map(|expr| GroupByItem {
                    expr,
                    as_name: None,
                })
                .collect(),
            group_as: None,
        });
        self
    }

    pub fn having(mut self, predicate: Expr) -> Self {
        self.select.having = Some(predicate);
        self
    }

    /// Appends an ascending sort key.
    pub fn order_by(mut self, expr: Expr) -> Self {
        let spec = SortSpec {
            expr,
            ordering: Some(OrderingSpec::Asc),
            nulls: None,
        };
        self.select
            .order_by
            .get_or_insert_with(|| OrderBy {
                sort_specs: Vec::new(),
            })
            .sort_specs
            .push(spec);
        self
    }

    pub fn offset(mut self, count: Expr) -> Self {
        self.select.offset = Some(count);
        self
    }

    pub fn limit(mut self, count: Expr) -> Self {
        self.select.limit = Some(count);
        self
    }

    /// Sets the location of the `SELECT` node.
    pub fn at(mut self, line: i64, column: i64) -> Self {
        self.select.metas = MetaContainer::at(line, column);
        self
    }

    /// Finishes the builder, returning the `SELECT` as the concrete node.
    pub fn finish(self) -> Select {
        self.select
    }

    /// Finishes the builder, returning the `SELECT` as an expression.
    pub fn build(self) -> Expr {
        Expr::Select(Box::new(self.select))
    }
}
