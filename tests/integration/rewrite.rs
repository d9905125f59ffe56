mod support;

use penumbra::query::ast::*;
use penumbra::query::builder::*;
use penumbra::query::metadata::MetaContainer;
use penumbra::query::rewrite::{
    walk_data_manipulation, walk_from_source, walk_projection, walk_select, IdentityRewriter,
};
use penumbra::query::{CancellationToken, Rewriter, Value};
use penumbra::{Error, Result};

use support::{dml, one_of_each_kind};

#[test]
fn identity_preserves_every_kind() {
    for node in one_of_each_kind() {
        let copy = IdentityRewriter::new().rewrite_expr(&node).unwrap();
        assert_eq!(copy.kind_name(), node.kind_name());
        assert_eq!(copy, node, "{}", node.kind_name());
    }
}

/// Records the order in which SELECT clauses are visited.
#[derive(Default)]
struct ClauseOrder {
    seen: Vec<&'static str>,
}

impl Rewriter for ClauseOrder {
    fn rewrite_from_source(&mut self, source: &FromSource) -> Result<FromSource> {
        self.seen.push("from");
        walk_from_source(self, source)
    }

    fn rewrite_let_source(&mut self, source: &LetSource) -> Result<LetSource> {
        self.seen.push("let");
        Ok(source.clone())
    }

    fn rewrite_select_where(&mut self, node: &Expr) -> Result<Expr> {
        self.seen.push("where");
        self.rewrite_expr(node)
    }

    fn rewrite_group_by(&mut self, group_by: &GroupBy) -> Result<GroupBy> {
        self.seen.push("group by");
        Ok(group_by.clone())
    }

    fn rewrite_select_having(&mut self, node: &Expr) -> Result<Expr> {
        self.seen.push("having");
        self.rewrite_expr(node)
    }

    fn rewrite_projection(&mut self, projection: &SelectProjection) -> Result<SelectProjection> {
        self.seen.push("projection");
        walk_projection(self, projection)
    }

    fn rewrite_order_by(&mut self, order_by: &OrderBy) -> Result<OrderBy> {
        self.seen.push("order by");
        Ok(order_by.clone())
    }

    fn rewrite_select_offset(&mut self, node: &Expr) -> Result<Expr> {
        self.seen.push("offset");
        self.rewrite_expr(node)
    }

    fn rewrite_select_limit(&mut self, node: &Expr) -> Result<Expr> {
        self.seen.push("limit");
        self.rewrite_expr(node)
    }

    fn rewrite_select_metas(&mut self, node: &Select) -> Result<MetaContainer> {
        self.seen.push("metas");
        Ok(node.metas.clone())
    }

    fn rewrite_dml_where(&mut self, node: &Expr) -> Result<Expr> {
        self.seen.push("where");
        self.rewrite_expr(node)
    }

    fn rewrite_returning(&mut self, returning: &Returning) -> Result<Returning> {
        self.seen.push("returning");
        Ok(returning.clone())
    }

    fn rewrite_dml_ops(&mut self, ops: &[DmlOp]) -> Result<Vec<DmlOp>> {
        self.seen.push("ops");
        ops.iter().map(|op| self.rewrite_dml_op(op)).collect()
    }
}

#[test]
fn select_clauses_follow_semantic_order() {
    let query = select_list(vec![(id("k"), None)])
        .limit(lit(10))
        .offset(lit(2))
        .order_by(id("k"))
        .having(nary(NAryOp::Gt, vec![id("k"), lit(0)]))
        .group_by(vec![id("k")])
        .where_clause(lit(true))
        .let_binding(lit(1), "one")
        .from(scan(id("t"), "r"))
        .build();
    let mut order = ClauseOrder::default();
    let copy = order.rewrite_expr(&query).unwrap();
    assert_eq!(copy, query);
    assert_eq!(
        order.seen,
        [
            "from",
            "let",
            "where",
            "group by",
            "having",
            "projection",
            "order by",
            "offset",
            "limit",
            "metas"
        ]
    );
}

#[test]
fn absent_clauses_are_skipped() {
    let query = select_value(id("x")).build();
    let mut order = ClauseOrder::default();
    order.rewrite_expr(&query).unwrap();
    assert_eq!(order.seen, ["projection", "metas"]);
}

#[test]
fn dml_follows_semantic_order() {
    let mut order = ClauseOrder::default();
    let statement = dml();
    let copy = order.rewrite_expr(&statement).unwrap();
    assert_eq!(copy, statement);
    assert_eq!(order.seen, ["from", "where", "returning", "ops"]);
}

#[test]
fn dml_operation_order_is_kept() {
    struct ReverseAttempt;
    impl Rewriter for ReverseAttempt {
        fn rewrite_data_manipulation(&mut self, node: &DataManipulation) -> Result<Expr> {
            let mut rewritten = walk_data_manipulation(self, node)?;
            rewritten.metas = rewritten.metas.with_flag("visited");
            Ok(Expr::Dml(Box::new(rewritten)))
        }
    }
    let Expr::Dml(original) = dml() else {
        unreachable!()
    };
    let Expr::Dml(copy) = ReverseAttempt.rewrite_expr(&dml()).unwrap() else {
        panic!("expected a DML statement");
    };
    assert_eq!(copy.ops, original.ops);
    assert!(copy.metas.contains("visited"));
}

/// Marks every SELECT as DISTINCT, nested ones included.
struct MakeDistinct;

impl Rewriter for MakeDistinct {
    fn rewrite_select(&mut self, node: &Select) -> Result<Expr> {
        let mut select = walk_select(self, node)?;
        select.setq = SetQuantifier::Distinct;
        Ok(Expr::Select(Box::new(select)))
    }
}

#[test]
fn derived_rewriter_reuses_inner_traversal() {
    let inner = select_value(id("y")).from(scan(id("u"), "y")).build();
    let outer = select_value(id("x"))
        .from(scan(id("t"), "x"))
        .where_clause(nary(NAryOp::In, vec![id("x"), inner]))
        .build();
    let Expr::Select(rewritten) = MakeDistinct.rewrite_expr(&outer).unwrap() else {
        panic!("expected a SELECT");
    };
    assert_eq!(rewritten.setq, SetQuantifier::Distinct);
    let Some(Expr::NAry(condition)) = &rewritten.where_clause else {
        panic!("expected the IN predicate");
    };
    let Expr::Select(nested) = &condition.args[1] else {
        panic!("expected the nested SELECT");
    };
    assert_eq!(nested.setq, SetQuantifier::Distinct);
}

/// Drops every source location.
struct StripLocations {
    calls: usize,
}

impl Rewriter for StripLocations {
    fn rewrite_metas(&mut self, _metas: &MetaContainer) -> Result<MetaContainer> {
        self.calls += 1;
        Ok(MetaContainer::new())
    }
}

#[test]
fn metas_hook_runs_for_every_node() {
    let tree = located(
        nary(
            NAryOp::Add,
            vec![located(id("a"), 1, 1), located(lit(1), 1, 5)],
        ),
        1,
        3,
    );
    let mut strip = StripLocations { calls: 0 };
    let Expr::NAry(rewritten) = strip.rewrite_expr(&tree).unwrap() else {
        panic!("expected an n-ary node");
    };
    assert_eq!(strip.calls, 3);
    assert!(rewritten.metas.location().is_none());
    assert!(rewritten.args.iter().all(|arg| arg.metas().location().is_none()));
}

#[test]
fn struct_fields_carry_their_index() {
    struct Indexer;
    impl Rewriter for Indexer {
        fn rewrite_struct_field(&mut self, field: &StructField, index: usize) -> Result<StructField> {
            Ok(StructField {
                name: field.name.clone(),
                value: lit(index as i64),
            })
        }
    }
    let tree = struct_of(vec![(lit("a"), lit("x")), (lit("b"), lit("y"))]);
    let rewritten = Indexer.rewrite_expr(&tree).unwrap();
    assert_eq!(
        rewritten,
        struct_of(vec![(lit("a"), lit(0i64)), (lit("b"), lit(1i64))])
    );
}

/// Cancels its own token after a number of variable references.
struct CancelAfter {
    token: CancellationToken,
    remaining: usize,
}

impl Rewriter for CancelAfter {
    fn cancellation_token(&self) -> Option<&CancellationToken> {
        Some(&self.token)
    }

    fn rewrite_var_ref(&mut self, node: &VarRef) -> Result<Expr> {
        self.remaining -= 1;
        if self.remaining == 0 {
            self.token.cancel();
        }
        Ok(Expr::Id(node.clone()))
    }
}

#[test]
fn cancellation_mid_rewrite_interrupts() {
    let wide = seq(SeqKind::List, (0..100).map(|i| id(format!("v{i}"))).collect());
    let mut rewriter = CancelAfter {
        token: CancellationToken::new(),
        remaining: 10,
    };
    let err = rewriter.rewrite_expr(&wide).unwrap_err();
    assert!(matches!(err, Error::Interrupted));
    assert!(!err.is_internal());
}

#[test]
fn uncancelled_token_is_transparent() {
    let token = CancellationToken::new();
    let tree = nary(NAryOp::And, vec![lit(true), lit(Value::Null)]);
    let copy = IdentityRewriter::with_cancellation(token)
        .rewrite_expr(&tree)
        .unwrap();
    assert_eq!(copy, tree);
}
