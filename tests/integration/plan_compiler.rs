mod support;

use std::sync::{Arc, Mutex};

use penumbra::diagnostics::Property;
use penumbra::query::ast::NAryOp;
use penumbra::query::compiler::{accessible_var_decls, register_count};
use penumbra::query::errors::ErrorCode;
use penumbra::query::metadata::MetaContainer;
use penumbra::query::operators::{default_factories, DefaultJoin};
use penumbra::query::physical::{Bexpr, Expr, Impl, JoinType, LetBinding, StructField, VarDecl};
use penumbra::query::registry::{JoinFactory, JoinInputs, OperatorFactory, OperatorKind};
use penumbra::query::relation::{BoxRelationExpression, ValueExpression};
use penumbra::query::scalar::BasicExprCompiler;
use penumbra::query::{ExprCompiler, OperatorRegistry, PlanCompiler, Value};
use penumbra::{Error, InternalError, Result};

use support::*;

#[derive(Debug, Clone, PartialEq)]
struct JoinCall {
    left_padding: Vec<usize>,
    right_padding: Vec<usize>,
    has_predicate: bool,
}

/// Join factory that records what the compiler hands it, then defers to the
/// default join.
#[derive(Default)]
struct RecordingJoin {
    calls: Mutex<Vec<JoinCall>>,
}

impl JoinFactory for RecordingJoin {
    fn name(&self) -> &str {
        "recording"
    }

    fn create(&self, imp: &Impl, inputs: JoinInputs) -> Result<BoxRelationExpression> {
        self.calls.lock().unwrap().push(JoinCall {
            left_padding: inputs.left_padding.registers().to_vec(),
            right_padding: inputs.right_padding.registers().to_vec(),
            has_predicate: inputs.predicate.is_some(),
        });
        DefaultJoin.create(imp, inputs)
    }
}

fn recording_compiler() -> (PlanCompiler, Arc<RecordingJoin>) {
    let recorder = Arc::new(RecordingJoin::default());
    let mut builder = OperatorRegistry::builder().with_defaults();
    builder.register(OperatorFactory::Join(recorder.clone()));
    (compiler_with(builder.build(), BasicExprCompiler::new()), recorder)
}

fn recorded_join(join_type: JoinType, left: Bexpr, right: Bexpr, predicate: Option<Expr>) -> Bexpr {
    Bexpr::Join {
        imp: Impl::new("recording"),
        join_type,
        left: Box::new(left),
        right: Box::new(right),
        predicate,
        metas: MetaContainer::new(),
    }
}

#[test]
fn scan_and_filter_end_to_end() {
    let plan = pfilter(
        binary(NAryOp::Gt, Expr::local(0), Expr::lit(2)),
        pscan(list(&[1, 2, 3, 4]), 0),
    );
    let compiled = compiler().compile_plan(&plan).unwrap();
    assert_eq!(compiled.register_count(), 1);
    assert_eq!(run(&compiled, &[0]).unwrap(), vec![ints(&[3]), ints(&[4])]);
}

#[test]
fn join_pads_exactly_the_side_registers() {
    // Left declares 0 (AS) and 1 (AT); the right side is a LET over a scan,
    // declaring 2 and 3. A sub-query in the right filter declares 7, which
    // must not be padded.
    let left = Bexpr::Scan {
        imp: Impl::default(),
        expr: list(&[1, 2]),
        as_decl: VarDecl::new(0),
        at_decl: Some(VarDecl::new(1)),
        by_decl: None,
        metas: MetaContainer::new(),
    };
    let subquery = Expr::BindingsToValues {
        exp: Box::new(Expr::local(7)),
        query: Box::new(pscan(list(&[9]), 7)),
        metas: MetaContainer::new(),
    };
    let right = Bexpr::Let {
        imp: Impl::default(),
        source: Box::new(pfilter(
            binary(NAryOp::Ne, subquery, Expr::lit(Value::Bag(Vec::new()))),
            pscan(list(&[2, 5]), 2),
        )),
        bindings: vec![LetBinding {
            value: Expr::local(2),
            decl: VarDecl::new(3),
        }],
        metas: MetaContainer::new(),
    };
    let plan = recorded_join(
        JoinType::Left,
        left,
        right,
        Some(binary(NAryOp::Eq, Expr::local(0), Expr::local(2))),
    );

    let (compiler, recorder) = recording_compiler();
    let compiled = compiler.compile_plan(&plan).unwrap();
    assert_eq!(compiled.register_count(), 8);
    assert_eq!(
        recorder.calls.lock().unwrap().as_slice(),
        &[JoinCall {
            left_padding: vec![0, 1],
            right_padding: vec![3, 2],
            has_predicate: true,
        }]
    );

    let rows = run(&compiled, &[0, 1, 2, 3]).unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::from(1), Value::Int(0), Value::Null, Value::Null],
            vec![Value::from(2), Value::Int(1), Value::from(2), Value::from(2)],
        ]
    );
}

#[test]
fn literal_true_predicate_is_not_compiled() {
    let (compiler, recorder) = recording_compiler();
    let plan = recorded_join(
        JoinType::Inner,
        pscan(list(&[1, 2]), 0),
        pscan(list(&[3]), 1),
        Some(Expr::lit(true)),
    );
    let compiled = compiler.compile_plan(&plan).unwrap();
    assert_eq!(run(&compiled, &[0, 1]).unwrap().len(), 2);

    let plan = recorded_join(
        JoinType::Inner,
        pscan(list(&[1, 2]), 0),
        pscan(list(&[3]), 1),
        Some(Expr::lit(false)),
    );
    let compiled = compiler.compile_plan(&plan).unwrap();
    assert!(run(&compiled, &[0, 1]).unwrap().is_empty());

    let calls = recorder.calls.lock().unwrap();
    assert!(!calls[0].has_predicate);
    assert!(calls[1].has_predicate);
}

/// Expression compiler that counts how often it is asked to compile.
#[derive(Default)]
struct CountingExprs {
    compiled: Mutex<Vec<String>>,
}

impl ExprCompiler for CountingExprs {
    fn compile(&self, expr: &Expr, plans: &PlanCompiler) -> Result<ValueExpression> {
        let label = match expr {
            Expr::Lit { value, .. } => value.to_string(),
            Expr::LocalId { index, .. } => format!("r{index}"),
            other => format!("{other:?}").chars().take(8).collect(),
        };
        self.compiled.lock().unwrap().push(label);
        BasicExprCompiler::new().compile(expr, plans)
    }
}

#[test]
fn compile_order_follows_the_node_contract() {
    let exprs = Arc::new(CountingExprs::default());
    let compiler = PlanCompiler::new(Arc::new(OperatorRegistry::with_defaults()), exprs.clone());
    // LIMIT 'limit' (OFFSET 'offset' (FILTER 'pred' (LET 'let' (SCAN 'scan'))))
    let plan = Bexpr::Limit {
        imp: Impl::default(),
        row_count: Expr::lit("limit"),
        source: Box::new(Bexpr::Offset {
            imp: Impl::default(),
            row_count: Expr::lit("offset"),
            source: Box::new(pfilter(
                Expr::lit("pred"),
                Bexpr::Let {
                    imp: Impl::default(),
                    source: Box::new(pscan(Expr::lit("scan"), 0)),
                    bindings: vec![LetBinding {
                        value: Expr::lit("let"),
                        decl: VarDecl::new(1),
                    }],
                    metas: MetaContainer::new(),
                },
            )),
            metas: MetaContainer::new(),
        }),
        metas: MetaContainer::new(),
    };
    compiler.compile_plan(&plan).unwrap();
    assert_eq!(
        exprs.compiled.lock().unwrap().as_slice(),
        ["'limit'", "'offset'", "'pred'", "'scan'", "'let'"]
    );
}

fn internal(err: Error) -> InternalError {
    match err {
        Error::Internal(err) => err,
        other => panic!("expected an internal error, got {other}"),
    }
}

fn scan_with(name: &str) -> Bexpr {
    Bexpr::Scan {
        imp: Impl::new(name),
        expr: list(&[1]),
        as_decl: VarDecl::new(0),
        at_decl: None,
        by_decl: None,
        metas: MetaContainer::at(1, 1),
    }
}

#[test]
fn unknown_factory_is_internal() {
    let err = compiler().compile_plan(&scan_with("vectorised")).unwrap_err();
    assert!(err.is_internal());
    assert!(err.code().is_none());
    assert_eq!(
        internal(err),
        InternalError::FactoryNotFound {
            kind: OperatorKind::Scan,
            name: "vectorised".into(),
        }
    );
}

#[test]
fn wrong_capability_is_internal() {
    let filter = default_factories()
        .into_iter()
        .find(|factory| factory.kind() == OperatorKind::Filter)
        .unwrap();
    let mut builder = OperatorRegistry::builder().with_defaults();
    assert!(!builder.insert(OperatorKind::Scan, "odd", filter));
    let compiler = compiler_with(builder.build(), BasicExprCompiler::new());
    let err = compiler.compile_plan(&scan_with("odd")).unwrap_err();
    assert_eq!(
        internal(err),
        InternalError::FactoryKindMismatch {
            kind: OperatorKind::Scan,
            name: "odd".into(),
            found: OperatorKind::Filter,
        }
    );
}

#[test]
fn malformed_selector_is_internal() {
    for name in ["", "two words", "semi;colon"] {
        let err = compiler().compile_plan(&scan_with(name)).unwrap_err();
        assert!(matches!(
            internal(err),
            InternalError::MalformedSelector {
                kind: OperatorKind::Scan,
                ..
            }
        ));
    }
}

#[test]
fn unsupported_by_variable_is_internal() {
    let plan = Bexpr::Scan {
        imp: Impl::default(),
        expr: list(&[1]),
        as_decl: VarDecl::new(0),
        at_decl: None,
        by_decl: Some(VarDecl::new(1)),
        metas: MetaContainer::new(),
    };
    let err = compiler().compile_plan(&plan).unwrap_err();
    assert!(matches!(internal(err), InternalError::Unsupported { .. }));
}

#[test]
fn runtime_failures_wait_for_execution() {
    let plan = pfilter(
        Expr::GlobalId {
            name: "nowhere".into(),
            metas: MetaContainer::at(2, 8),
        },
        pscan(list(&[1]), 0),
    );
    let compiled = compiler().compile_plan(&plan).unwrap();
    let err = run(&compiled, &[0]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EvaluatorUnboundVariable));
    let context = err.context().unwrap();
    assert_eq!(
        context.get(Property::BindingName).and_then(|v| v.as_str()),
        Some("nowhere")
    );
    let location = context.source_location().unwrap();
    assert_eq!((location.line, location.column), (2, 8));
}

#[test]
fn operator_errors_carry_the_node_location() {
    let plan = Bexpr::Limit {
        imp: Impl::default(),
        row_count: Expr::lit(-3),
        source: Box::new(pscan(list(&[1]), 0)),
        metas: MetaContainer::at(5, 1),
    };
    let compiled = compiler().compile_plan(&plan).unwrap();
    let err = run(&compiled, &[0]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EvaluatorNegativeLimit));
    let location = err.context().and_then(|c| c.source_location()).unwrap();
    assert_eq!((location.line, location.column), (5, 1));
}

#[test]
fn row_count_location_wins_over_the_node() {
    let plan = Bexpr::Offset {
        imp: Impl::default(),
        row_count: Expr::Lit {
            value: Value::from("x"),
            metas: MetaContainer::at(6, 20),
        },
        source: Box::new(pscan(list(&[1]), 0)),
        metas: MetaContainer::at(6, 1),
    };
    let compiled = compiler().compile_plan(&plan).unwrap();
    let err = run(&compiled, &[0]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::EvaluatorNonIntOffsetValue));
    let location = err.context().and_then(|c| c.source_location()).unwrap();
    assert_eq!((location.line, location.column), (6, 20));
}

#[test]
fn subquery_values_and_projection() {
    // PROJECT [ <<x * 10 FOR x IN [1, 2]>>, { 'k': $1 } ]
    let subquery = Expr::BindingsToValues {
        exp: Box::new(binary(NAryOp::Mul, Expr::local(1), Expr::lit(10))),
        query: Box::new(pscan(list(&[1, 2]), 1)),
        metas: MetaContainer::new(),
    };
    let record = Expr::Struct {
        fields: vec![StructField {
            name: Expr::lit("k"),
            value: Expr::Parameter {
                position: 1,
                metas: MetaContainer::new(),
            },
        }],
        metas: MetaContainer::new(),
    };
    let plan = Bexpr::Project {
        imp: Impl::default(),
        binding: VarDecl::new(0),
        args: vec![subquery, record],
        metas: MetaContainer::new(),
    };
    let compiled = compiler().compile_plan(&plan).unwrap();
    assert_eq!(compiled.register_count(), 2);
    let mut state = compiled.new_state_with_parameters(vec![Value::from("p")]);
    let rows = rows_in(&compiled, &mut state, &[0]).unwrap();
    let expected_struct = Value::Struct([("k".to_owned(), Value::from("p"))].into_iter().collect());
    assert_eq!(
        rows,
        vec![vec![Value::List(vec![
            Value::Bag(vec![Value::Int(10), Value::Int(20)]),
            expected_struct,
        ])]]
    );
}

#[test]
fn plans_round_trip_through_json() {
    let plan = pjoin(
        JoinType::Full,
        pscan(list(&[1, 2]), 0),
        pscan(list(&[2, 3]), 1),
        Some(binary(NAryOp::Eq, Expr::local(0), Expr::local(1))),
    );
    let json = serde_json::to_string(&plan).unwrap();
    let decoded: Bexpr = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, plan);

    let original = compiler().compile_plan(&plan).unwrap();
    let reloaded = compiler().compile_plan(&decoded).unwrap();
    assert_eq!(run(&original, &[0, 1]).unwrap(), run(&reloaded, &[0, 1]).unwrap());
    assert_eq!(run(&reloaded, &[0, 1]).unwrap().len(), 3);
}

#[test]
fn compiled_plans_are_shared_across_executions() {
    let plan = pjoin(
        JoinType::Inner,
        pscan(list(&[1, 2, 3]), 0),
        pscan(list(&[1, 2, 3]), 1),
        Some(binary(NAryOp::Lt, Expr::local(0), Expr::local(1))),
    );
    let compiled = compiler().compile_plan(&plan).unwrap();
    let expected = run(&compiled, &[0, 1]).unwrap();
    assert_eq!(expected.len(), 3);
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| run(&compiled, &[0, 1]).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn accessible_decls_follow_relational_children_only() {
    let plan = pjoin(
        JoinType::Inner,
        pscan(list(&[1]), 4),
        Bexpr::Let {
            imp: Impl::default(),
            source: Box::new(pscan(list(&[1]), 5)),
            bindings: vec![LetBinding {
                value: Expr::BindingsToValues {
                    exp: Box::new(Expr::local(9)),
                    query: Box::new(pscan(list(&[1]), 9)),
                    metas: MetaContainer::new(),
                },
                decl: VarDecl::new(6),
            }],
            metas: MetaContainer::new(),
        },
        None,
    );
    let indices: Vec<_> = accessible_var_decls(&plan).iter().map(|d| d.index).collect();
    assert_eq!(indices, vec![4, 6, 5]);
    assert_eq!(register_count(&plan), 10);
}
