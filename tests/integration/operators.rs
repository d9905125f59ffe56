mod support;

use penumbra::diagnostics::Property;
use penumbra::query::ast::{NAryOp, SeqKind};
use penumbra::query::errors::ErrorCode;
use penumbra::query::metadata::MetaContainer;
use penumbra::query::physical::{Bexpr, Expr, Impl, JoinType, LetBinding, VarDecl};
use penumbra::query::Value;

use support::*;

fn scan_at(source: Expr, register: usize, at: usize) -> Bexpr {
    let Bexpr::Scan {
        imp,
        expr,
        as_decl,
        by_decl,
        metas,
        ..
    } = pscan(source, register)
    else {
        unreachable!()
    };
    Bexpr::Scan {
        imp,
        expr,
        as_decl,
        at_decl: Some(VarDecl::new(at)),
        by_decl,
        metas,
    }
}

fn eq(left: usize, right: usize) -> Expr {
    binary(NAryOp::Eq, Expr::local(left), Expr::local(right))
}

fn limit(row_count: Expr, source: Bexpr) -> Bexpr {
    Bexpr::Limit {
        imp: Impl::default(),
        row_count,
        source: Box::new(source),
        metas: MetaContainer::new(),
    }
}

fn offset(row_count: Expr, source: Bexpr) -> Bexpr {
    Bexpr::Offset {
        imp: Impl::default(),
        row_count,
        source: Box::new(source),
        metas: MetaContainer::new(),
    }
}

fn rows_of(plan: &Bexpr, registers: &[usize]) -> Vec<Vec<Value>> {
    let compiled = compiler().compile_plan(plan).unwrap();
    run(&compiled, registers).unwrap()
}

#[test]
fn scan_positions_follow_collection_kind() {
    let listed = scan_at(list(&[7, 8]), 0, 1);
    assert_eq!(
        rows_of(&listed, &[0, 1]),
        vec![ints(&[7, 0]), ints(&[8, 1])]
    );

    let bagged = scan_at(Expr::lit(Value::Bag(ints(&[7]))), 0, 1);
    assert_eq!(
        rows_of(&bagged, &[0, 1]),
        vec![vec![Value::from(7), Value::Missing]]
    );
}

#[test]
fn left_join_pads_every_register_of_the_right_side() {
    let plan = pjoin(
        JoinType::Left,
        pscan(list(&[1, 2, 3]), 0),
        scan_at(list(&[2, 3, 4]), 1, 2),
        Some(eq(0, 1)),
    );
    assert_eq!(
        rows_of(&plan, &[0, 1, 2]),
        vec![
            vec![Value::from(1), Value::Null, Value::Null],
            ints(&[2, 2, 0]),
            ints(&[3, 3, 1]),
        ]
    );
}

#[test]
fn right_join_is_driven_by_the_right_side() {
    let plan = pjoin(
        JoinType::Right,
        pscan(list(&[1, 2]), 0),
        pscan(list(&[2, 3]), 1),
        Some(eq(0, 1)),
    );
    assert_eq!(
        rows_of(&plan, &[0, 1]),
        vec![ints(&[2, 2]), vec![Value::Null, Value::from(3)]]
    );
}

#[test]
fn full_join_emits_unmatched_rows_of_both_sides() {
    let plan = pjoin(
        JoinType::Full,
        pscan(list(&[1, 2]), 0),
        pscan(list(&[2, 3]), 1),
        Some(eq(0, 1)),
    );
    assert_eq!(
        rows_of(&plan, &[0, 1]),
        vec![
            vec![Value::from(1), Value::Null],
            ints(&[2, 2]),
            vec![Value::Null, Value::from(3)],
        ]
    );
}

#[test]
fn unknown_join_condition_does_not_match() {
    let plan = pjoin(
        JoinType::Inner,
        pscan(list(&[1]), 0),
        pscan(Expr::lit(Value::List(vec![Value::Null, Value::from(1)])), 1),
        Some(eq(0, 1)),
    );
    assert_eq!(rows_of(&plan, &[0, 1]), vec![ints(&[1, 1])]);
}

#[test]
fn offset_and_limit_bounds() {
    let source = || pscan(list(&[1, 2, 3]), 0);
    assert!(rows_of(&offset(Expr::lit(5), source()), &[0]).is_empty());
    assert!(rows_of(&limit(Expr::lit(0), source()), &[0]).is_empty());
    assert_eq!(
        rows_of(&limit(Expr::lit(10), offset(Expr::lit(1), source())), &[0]),
        vec![ints(&[2]), ints(&[3])]
    );
}

#[test]
fn limit_from_parameter_is_type_checked() {
    let plan = limit(
        Expr::Parameter {
            position: 1,
            metas: MetaContainer::new(),
        },
        pscan(list(&[1, 2, 3]), 0),
    );
    let compiled = compiler().compile_plan(&plan).unwrap();

    let mut state = compiled.new_state_with_parameters(vec![Value::from(2)]);
    assert_eq!(rows_in(&compiled, &mut state, &[0]).unwrap().len(), 2);

    let mut state = compiled.new_state_with_parameters(vec![Value::from("two")]);
    let err = rows_in(&compiled, &mut state, &[0]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EvaluatorNonIntLimitValue));
    let actual = err
        .context()
        .and_then(|c| c.get(Property::ActualType))
        .and_then(|v| v.as_str().map(str::to_owned));
    assert_eq!(actual.as_deref(), Some("STRING"));
}

#[test]
fn negative_offset_is_reported() {
    let plan = offset(Expr::lit(-1), pscan(list(&[1]), 0));
    let compiled = compiler().compile_plan(&plan).unwrap();
    let err = run(&compiled, &[0]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EvaluatorNegativeOffset));
}

#[test]
fn let_binds_a_correlated_subquery() {
    // LET smaller = (SELECT VALUE y FROM [1, 2, 3] AS y WHERE y < x)
    let smaller = Expr::BindingsToValues {
        exp: Box::new(Expr::local(2)),
        query: Box::new(pfilter(
            binary(NAryOp::Lt, Expr::local(2), Expr::local(0)),
            pscan(list(&[1, 2, 3]), 2),
        )),
        metas: MetaContainer::new(),
    };
    let plan = Bexpr::Let {
        imp: Impl::default(),
        source: Box::new(pscan(list(&[1, 2, 3]), 0)),
        bindings: vec![LetBinding {
            value: smaller,
            decl: VarDecl::new(1),
        }],
        metas: MetaContainer::new(),
    };
    let compiled = compiler().compile_plan(&plan).unwrap();
    assert_eq!(compiled.register_count(), 3);
    let smaller: Vec<Value> = run(&compiled, &[1])
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(
        smaller,
        vec![
            Value::Bag(Vec::new()),
            Value::Bag(ints(&[1])),
            Value::Bag(ints(&[1, 2])),
        ]
    );
}

#[test]
fn project_binds_its_arguments_as_a_list() {
    let plan = Bexpr::Project {
        imp: Impl::default(),
        binding: VarDecl::new(0),
        args: vec![
            Expr::lit("a"),
            Expr::Collection {
                kind: SeqKind::Bag,
                values: vec![Expr::lit(1)],
                metas: MetaContainer::new(),
            },
        ],
        metas: MetaContainer::new(),
    };
    assert_eq!(
        rows_of(&plan, &[0]),
        vec![vec![Value::List(vec![
            Value::from("a"),
            Value::Bag(ints(&[1]))
        ])]]
    );
}

#[test]
fn compiled_plans_can_run_again() {
    let plan = pfilter(
        binary(NAryOp::Gt, Expr::local(0), Expr::lit(1)),
        pscan(list(&[1, 2, 3]), 0),
    );
    let compiled = compiler().compile_plan(&plan).unwrap();
    let first = run(&compiled, &[0]).unwrap();
    let mut state = compiled.new_state();
    rows_in(&compiled, &mut state, &[0]).unwrap();
    let again = rows_in(&compiled, &mut state, &[0]).unwrap();
    assert_eq!(first, vec![ints(&[2]), ints(&[3])]);
    assert_eq!(again, first);
}
