mod support;

use penumbra::diagnostics::{ErrorCategory, Property};
use penumbra::query::ast::*;
use penumbra::query::builder::*;
use penumbra::query::errors::ErrorCode;
use penumbra::query::metadata::COUNT_STAR;
use penumbra::query::{validate, CompileOptions, Value};
use penumbra::Error;

use support::one_of_each_kind;

fn rejection(expr: &Expr, options: CompileOptions) -> Error {
    validate(expr, options).expect_err("query should be rejected")
}

#[test]
fn well_formed_trees_pass() {
    for node in one_of_each_kind() {
        validate(&node, CompileOptions::standard())
            .unwrap_or_else(|err| panic!("{} rejected: {err}", node.kind_name()));
    }
}

#[test]
fn having_without_group_by_is_semantic() {
    let query = select_value(id("x"))
        .from(scan(id("t"), "x"))
        .having(lit(true))
        .at(4, 2)
        .build();
    let err = rejection(&query, CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::SemanticHavingUsedWithoutGroupBy));
    assert_eq!(err.category(), Some(ErrorCategory::Semantic));
    let location = err.context().and_then(|c| c.source_location()).unwrap();
    assert_eq!((location.line, location.column), (4, 2));
}

#[test]
fn having_with_empty_key_list_is_rejected() {
    let query = select_value(id("x"))
        .from(scan(id("t"), "x"))
        .group_by(Vec::new())
        .having(lit(true))
        .build();
    let err = rejection(&query, CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::SemanticHavingUsedWithoutGroupBy));
}

#[test]
fn having_with_group_by_passes() {
    let query = select_value(id("k"))
        .from(scan(id("t"), "x"))
        .group_by(vec![id("k")])
        .having(nary(NAryOp::Gt, vec![id("k"), lit(1)]))
        .build();
    validate(&query, CompileOptions::default()).unwrap();
}

#[test]
fn struct_key_reports_actual_type_and_location() {
    let tree = struct_of(vec![
        (lit("ok"), lit(1)),
        (located(lit(42), 7, 9), lit(2)),
    ]);
    let err = rejection(&tree, CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::SemanticNonTextStructFieldKey));
    let context = err.context().unwrap();
    assert_eq!(
        context.get(Property::ActualType).and_then(|v| v.as_str()),
        Some("INT")
    );
    assert_eq!(context.get(Property::LineNumber).and_then(|v| v.as_long()), Some(7));
    assert_eq!(context.get(Property::ColumnNumber).and_then(|v| v.as_long()), Some(9));
}

#[test]
fn missing_struct_key_is_rejected() {
    let err = rejection(&struct_of(vec![(missing(), lit(1))]), CompileOptions::default());
    let actual = err
        .context()
        .and_then(|c| c.get(Property::ActualType))
        .and_then(|v| v.as_str().map(str::to_owned));
    assert_eq!(actual.as_deref(), Some("MISSING"));
}

#[test]
fn non_literal_struct_key_is_left_to_runtime() {
    validate(&struct_of(vec![(id("k"), lit(1))]), CompileOptions::default()).unwrap();
}

#[test]
fn decimal_parameters_depend_on_options() {
    let tree = cast(
        lit(1),
        SqlDataType::Decimal {
            precision: Some(2),
            scale: Some(5),
        },
    );
    validate(&tree, CompileOptions::legacy()).unwrap();
    let err = rejection(&tree, CompileOptions::standard());
    assert_eq!(err.code(), Some(ErrorCode::SemanticInvalidDecimalArguments));

    let numeric = cast(
        lit(1),
        SqlDataType::Numeric {
            precision: Some(4),
            scale: Some(-1),
        },
    );
    let err = rejection(&numeric, CompileOptions::standard());
    assert_eq!(err.code(), Some(ErrorCode::SemanticInvalidDecimalArguments));
}

#[test]
fn integer_literal_overflow() {
    let tree = nary(NAryOp::Add, vec![lit(Value::Int(i64::MAX as i128 + 1)), lit(1)]);
    let err = rejection(&tree, CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::SemanticLiteralIntOverflow));
    validate(&lit(Value::Int(i64::MIN as i128)), CompileOptions::default()).unwrap();
}

#[test]
fn count_distinct_star_is_rejected_only_for_the_star_form() {
    let err = rejection(&count_star(SetQuantifier::Distinct), CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::EvaluatorCountDistinctStar));
    assert_eq!(err.category(), Some(ErrorCategory::Evaluator));
    validate(&count_star(SetQuantifier::All), CompileOptions::default()).unwrap();
    validate(
        &call_agg("count", SetQuantifier::Distinct, id("a")),
        CompileOptions::default(),
    )
    .unwrap();
    assert!(count_star(SetQuantifier::All).metas().contains(COUNT_STAR));
}

#[test]
fn unsupported_features_name_themselves() {
    let partial = select_value(id("k"))
        .from(scan(id("t"), "x"))
        .group_partial(vec![id("k")])
        .build();
    let pivoted = pivot(id("v"), id("k"))
        .from(scan(id("t"), "x"))
        .group_by(vec![id("k")])
        .build();
    for (tree, feature) in [(partial, "GROUP PARTIAL"), (pivoted, "PIVOT with GROUP BY")] {
        let err = rejection(&tree, CompileOptions::default());
        assert_eq!(err.code(), Some(ErrorCode::EvaluatorFeatureNotSupportedYet));
        let name = err
            .context()
            .and_then(|c| c.get(Property::FeatureName))
            .and_then(|v| v.as_str().map(str::to_owned));
        assert_eq!(name.as_deref(), Some(feature));
    }
}

#[test]
fn list_projection_with_group_by_is_fine() {
    let query = select_list(vec![(id("k"), Some("key"))])
        .from(scan(id("t"), "x"))
        .group_by(vec![id("k")])
        .build();
    validate(&query, CompileOptions::default()).unwrap();
}

#[test]
fn first_failure_wins() {
    // FROM is checked before WHERE.
    let query = select_value(id("x"))
        .from(scan(struct_of(vec![(lit(1), lit(1))]), "x"))
        .where_clause(lit(Value::Int(i128::MAX)))
        .build();
    let err = rejection(&query, CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::SemanticNonTextStructFieldKey));
}

#[test]
fn errors_deep_inside_dml_are_found() {
    let Expr::Dml(mut statement) = support::dml() else {
        unreachable!()
    };
    statement.ops.push(DmlOp::Remove(RemoveOp {
        lvalue: struct_of(vec![(lit(false), lit(1))]),
        metas: Default::default(),
    }));
    let err = rejection(&Expr::Dml(statement), CompileOptions::default());
    assert_eq!(err.code(), Some(ErrorCode::SemanticNonTextStructFieldKey));
}
