#![allow(dead_code)]

use std::sync::Arc;

use penumbra::query::ast::*;
use penumbra::query::builder::*;
use penumbra::query::metadata::MetaContainer;
use penumbra::query::physical::{self, Bexpr, Impl, JoinType, VarDecl};
use penumbra::query::relation::for_each_row;
use penumbra::query::scalar::BasicExprCompiler;
use penumbra::query::state::EvaluatorState;
use penumbra::query::{CompiledPlan, OperatorRegistry, PlanCompiler, Value};
use penumbra::Result;

/// One node of every expression kind, each with at least one child where the
/// kind allows it.
pub fn one_of_each_kind() -> Vec<Expr> {
    let metas = MetaContainer::at(1, 1);
    let table = Identifier {
        name: "t".into(),
        case: CaseSensitivity::Insensitive,
        metas: metas.clone(),
    };
    vec![
        lit(1),
        missing(),
        id("x"),
        nary(NAryOp::Add, vec![id("a"), lit(2)]),
        call_agg("sum", SetQuantifier::All, id("a")),
        cast(id("a"), SqlDataType::Decimal {
            precision: Some(5),
            scale: Some(2),
        }),
        Expr::Path(Path {
            root: Box::new(id("t")),
            components: vec![
                PathComponent::Expr {
                    expr: lit("a"),
                    case: CaseSensitivity::Sensitive,
                    metas: metas.clone(),
                },
                PathComponent::Wildcard {
                    metas: metas.clone(),
                },
                PathComponent::Unpivot {
                    metas: metas.clone(),
                },
            ],
            metas: metas.clone(),
        }),
        Expr::SimpleCase(SimpleCase {
            value: Box::new(id("a")),
            whens: vec![SimpleCaseWhen {
                value: lit(1),
                then: lit("one"),
            }],
            default: Some(Box::new(lit("other"))),
            metas: metas.clone(),
        }),
        Expr::SearchedCase(SearchedCase {
            whens: vec![SearchedCaseWhen {
                condition: nary(NAryOp::Gt, vec![id("a"), lit(0)]),
                then: lit("positive"),
            }],
            default: None,
            metas: metas.clone(),
        }),
        struct_of(vec![(lit("k"), id("v"))]),
        seq(SeqKind::Bag, vec![lit(1), lit(2)]),
        select_value(id("x")).from(scan(id("t"), "x")).build(),
        param(1),
        dml(),
        Expr::CreateTable(CreateTable {
            name: "t".into(),
            metas: metas.clone(),
        }),
        Expr::CreateIndex(CreateIndex {
            table: table.clone(),
            keys: vec![id("a")],
            metas: metas.clone(),
        }),
        Expr::DropTable(DropTable {
            table: table.clone(),
            metas: metas.clone(),
        }),
        Expr::DropIndex(DropIndex {
            table: table.clone(),
            index: Identifier {
                name: "idx".into(),
                case: CaseSensitivity::Sensitive,
                metas: metas.clone(),
            },
            metas: metas.clone(),
        }),
        Expr::NullIf(NullIf {
            left: Box::new(id("a")),
            right: Box::new(lit(0)),
            metas: metas.clone(),
        }),
        Expr::Coalesce(Coalesce {
            args: vec![id("a"), lit(0)],
            metas: metas.clone(),
        }),
        Expr::Exec(Exec {
            procedure: symbol("proc"),
            args: vec![lit(1)],
            metas: metas.clone(),
        }),
        Expr::Date(DateLiteral {
            year: 2024,
            month: 2,
            day: 29,
            metas: metas.clone(),
        }),
        Expr::Time(TimeLiteral {
            hour: 23,
            minute: 59,
            second: 1,
            nano: 500,
            precision: 3,
            tz_minutes: Some(-300),
            with_time_zone: true,
            metas,
        }),
    ]
}

/// `FROM t AS r WHERE r.a > 1 SET r.b = 1, REMOVE r.c RETURNING ALL NEW *`
pub fn dml() -> Expr {
    let metas = MetaContainer::at(2, 1);
    Expr::Dml(Box::new(DataManipulation {
        ops: vec![
            DmlOp::Assignment(AssignmentOp {
                lvalue: id("b"),
                rvalue: lit(1),
                metas: metas.clone(),
            }),
            DmlOp::InsertValue(InsertValueOp {
                lvalue: id("t"),
                value: struct_of(vec![(lit("a"), lit(1))]),
                position: None,
                on_conflict: Some(OnConflict {
                    condition: lit(true),
                    action: ConflictAction::DoNothing,
                }),
                metas: metas.clone(),
            }),
            DmlOp::Remove(RemoveOp {
                lvalue: id("c"),
                metas: metas.clone(),
            }),
            DmlOp::Delete(DeleteOp::default()),
        ],
        from: Some(scan(id("t"), "r")),
        where_clause: Some(nary(NAryOp::Gt, vec![id("a"), lit(1)])),
        returning: Some(Returning {
            elems: vec![ReturningElem {
                mapping: ReturningMapping::AllNew,
                column: ReturningColumn::Wildcard,
            }],
        }),
        metas,
    }))
}

pub fn compiler() -> PlanCompiler {
    compiler_with(OperatorRegistry::with_defaults(), BasicExprCompiler::new())
}

pub fn compiler_with(registry: OperatorRegistry, exprs: BasicExprCompiler) -> PlanCompiler {
    PlanCompiler::new(Arc::new(registry), Arc::new(exprs))
}

pub fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}

pub fn list(values: &[i32]) -> physical::Expr {
    physical::Expr::lit(Value::List(ints(values)))
}

pub fn pscan(source: physical::Expr, register: usize) -> Bexpr {
    Bexpr::Scan {
        imp: Impl::default(),
        expr: source,
        as_decl: VarDecl::new(register),
        at_decl: None,
        by_decl: None,
        metas: MetaContainer::new(),
    }
}

pub fn pfilter(predicate: physical::Expr, source: Bexpr) -> Bexpr {
    Bexpr::Filter {
        imp: Impl::default(),
        predicate,
        source: Box::new(source),
        metas: MetaContainer::new(),
    }
}

pub fn pjoin(join_type: JoinType, left: Bexpr, right: Bexpr, predicate: Option<physical::Expr>) -> Bexpr {
    Bexpr::Join {
        imp: Impl::default(),
        join_type,
        left: Box::new(left),
        right: Box::new(right),
        predicate,
        metas: MetaContainer::new(),
    }
}

pub fn binary(op: NAryOp, left: physical::Expr, right: physical::Expr) -> physical::Expr {
    physical::Expr::NAry {
        op,
        args: vec![left, right],
        metas: MetaContainer::new(),
    }
}

/// Runs `plan` and snapshots `registers` after every row.
pub fn run(plan: &CompiledPlan, registers: &[usize]) -> Result<Vec<Vec<Value>>> {
    let mut state = plan.new_state();
    rows_in(plan, &mut state, registers)
}

pub fn rows_in(
    plan: &CompiledPlan,
    state: &mut EvaluatorState,
    registers: &[usize],
) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    for_each_row(plan.root(), state, |state| {
        rows.push(
            registers
                .iter()
                .map(|index| state.register(*index).cloned())
                .collect::<Result<Vec<_>>>()?,
        );
        Ok(())
    })?;
    Ok(rows)
}
