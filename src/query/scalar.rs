#![allow(missing_docs)]

//! A small scalar expression compiler.
//!
//! Covers what relational plans need to be useful on their own: constants,
//! register and parameter reads, globals, constructors, comparison, boolean
//! logic, integer and float arithmetic and sub-queries. Everything else
//! compiles to an expression that fails with
//! `EVALUATOR_FEATURE_NOT_SUPPORTED_YET` when it runs, so a plan using it
//! still compiles.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::diagnostics::{Property, PropertyValueMap};
use crate::error::{Error, QueryError, Result};
use crate::query::ast::{NAryOp, SeqKind};
use crate::query::compiler::{ExprCompiler, PlanCompiler};
use crate::query::errors::ErrorCode;
use crate::query::metadata::SourceLocation;
use crate::query::physical::Expr;
use crate::query::relation::{for_each_row, ValueExpression};
use crate::query::state::EvaluatorState;
use crate::query::value::Value;

/// Expression compiler with a fixed set of global bindings.
#[derive(Clone, Debug, Default)]
pub struct BasicExprCompiler {
    globals: FxHashMap<String, Value>,
}

impl BasicExprCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a global name, replacing any previous value.
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }
}

impl ExprCompiler for BasicExprCompiler {
    fn compile(&self, expr: &Expr, plans: &PlanCompiler) -> Result<ValueExpression> {
        let location = expr.metas().location();
        Ok(match expr {
            Expr::Lit { value, .. } => {
                let value = value.clone();
                ValueExpression::new(location, move |_| Ok(value.clone()))
            }
            Expr::Missing { .. } => ValueExpression::new(location, |_| Ok(Value::Missing)),
            Expr::LocalId { index, .. } => {
                let index = *index;
                ValueExpression::new(location, move |state| state.register(index).cloned())
            }
            Expr::GlobalId { name, .. } => {
                let name = name.clone();
                let bound = self.globals.get(&name).cloned();
                ValueExpression::new(location, move |_| match &bound {
                    Some(value) => Ok(value.clone()),
                    None => Err(unbound_variable(&name)?),
                })
            }
            Expr::Parameter { position, .. } => {
                let position = *position;
                ValueExpression::new(location, move |state| match state.parameter(position) {
                    Some(value) => Ok(value.clone()),
                    None => unbound_parameter(position, state),
                })
            }
            Expr::NAry { op, args, .. } => {
                let op = *op;
                let args = args
                    .iter()
                    .map(|arg| self.compile(arg, plans))
                    .collect::<Result<Vec<_>>>()?;
                ValueExpression::new(location, move |state| {
                    let values = args
                        .iter()
                        .map(|arg| arg.evaluate(state))
                        .collect::<Result<Vec<_>>>()?;
                    apply(op, values)
                })
            }
            Expr::Struct { fields, .. } => {
                let fields = fields
                    .iter()
                    .map(|field| {
                        Ok((
                            self.compile(&field.name, plans)?,
                            self.compile(&field.value, plans)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                ValueExpression::new(location, move |state| {
                    let mut out = BTreeMap::new();
                    for (name, value) in &fields {
                        let key = match name.evaluate(state)? {
                            Value::String(key) | Value::Symbol(key) => key,
                            other => {
                                return Err(evaluation_error(
                                    "struct field name must be text",
                                    Some(&other),
                                    name.location(),
                                )?)
                            }
                        };
                        out.insert(key, value.evaluate(state)?);
                    }
                    Ok(Value::Struct(out))
                })
            }
            Expr::Collection { kind, values, .. } => {
                let kind = *kind;
                let values = values
                    .iter()
                    .map(|value| self.compile(value, plans))
                    .collect::<Result<Vec<_>>>()?;
                ValueExpression::new(location, move |state| {
                    let items = values
                        .iter()
                        .map(|value| value.evaluate(state))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(match kind {
                        SeqKind::List | SeqKind::Sexp => Value::List(items),
                        SeqKind::Bag => Value::Bag(items),
                    })
                })
            }
            Expr::BindingsToValues { exp, query, .. } => {
                let query = plans.compile_bexpr(query)?;
                let exp = self.compile(exp, plans)?;
                ValueExpression::new(location, move |state| {
                    let mut values = Vec::new();
                    for_each_row(query.as_ref(), state, |state| {
                        values.push(exp.evaluate(state)?);
                        Ok(())
                    })?;
                    Ok(Value::Bag(values))
                })
            }
        })
    }
}

fn unbound_variable(name: &str) -> Result<Error> {
    let context = PropertyValueMap::new().with(Property::BindingName, name)?;
    Ok(QueryError::new(
        ErrorCode::EvaluatorUnboundVariable,
        format!("no such binding: {name}"),
        context,
    )
    .into())
}

fn unbound_parameter(position: usize, state: &EvaluatorState) -> Result<Value> {
    let ordinal = i32::try_from(position).unwrap_or(i32::MAX);
    let bound = i32::try_from(state.parameters().len()).unwrap_or(i32::MAX);
    let context = PropertyValueMap::new()
        .with(Property::ExpectedParameterOrdinal, ordinal)?
        .with(Property::BoundParameterCount, bound)?;
    Err(QueryError::new(
        ErrorCode::EvaluatorGenericException,
        format!("no value bound for parameter {position}"),
        context,
    )
    .into())
}

fn evaluation_error(
    message: &str,
    actual: Option<&Value>,
    location: Option<SourceLocation>,
) -> Result<Error> {
    let mut context = PropertyValueMap::from_location(location);
    if let Some(actual) = actual {
        context.set(Property::ActualType, actual.type_name())?;
    }
    Ok(QueryError::new(ErrorCode::EvaluatorGenericException, message, context).into())
}

fn not_supported(op: NAryOp) -> Result<Value> {
    let context = PropertyValueMap::new().with(Property::FeatureName, op.name())?;
    Err(QueryError::new(
        ErrorCode::EvaluatorFeatureNotSupportedYet,
        format!("operator '{}' not supported yet", op.name()),
        context,
    )
    .into())
}

fn apply(op: NAryOp, values: Vec<Value>) -> Result<Value> {
    match op {
        NAryOp::Eq | NAryOp::Ne | NAryOp::Lt | NAryOp::Lte | NAryOp::Gt | NAryOp::Gte => {
            let [left, right] = binary(op, values)?;
            Ok(compare(op, &left, &right))
        }
        NAryOp::And => Ok(values.iter().fold(Value::Bool(true), |acc, v| and(&acc, v))),
        NAryOp::Or => Ok(values.iter().fold(Value::Bool(false), |acc, v| or(&acc, v))),
        NAryOp::Not => {
            let [operand] = unary(op, values)?;
            Ok(match operand {
                Value::Bool(b) => Value::Bool(!b),
                _ => Value::Null,
            })
        }
        NAryOp::Add | NAryOp::Sub | NAryOp::Mul => {
            let [left, right] = binary(op, values)?;
            arithmetic(op, &left, &right)
        }
        NAryOp::Div
        | NAryOp::Mod
        | NAryOp::Like
        | NAryOp::Between
        | NAryOp::In
        | NAryOp::Concat
        | NAryOp::Call
        | NAryOp::Union
        | NAryOp::Intersect
        | NAryOp::Except => not_supported(op),
    }
}

fn arity(op: NAryOp, expected: usize, actual: usize) -> Result<Error> {
    let context = PropertyValueMap::new()
        .with(Property::NaryOp, op.name())?
        .with(Property::ActualArity, i32::try_from(actual).unwrap_or(i32::MAX))?;
    Ok(QueryError::new(
        ErrorCode::EvaluatorGenericException,
        format!("operator '{}' takes {expected} operands", op.name()),
        context,
    )
    .into())
}

fn unary(op: NAryOp, values: Vec<Value>) -> Result<[Value; 1]> {
    let len = values.len();
    match <[Value; 1]>::try_from(values) {
        Ok(values) => Ok(values),
        Err(_) => Err(arity(op, 1, len)?),
    }
}

fn binary(op: NAryOp, values: Vec<Value>) -> Result<[Value; 2]> {
    let len = values.len();
    match <[Value; 2]>::try_from(values) {
        Ok(values) => Ok(values),
        Err(_) => Err(arity(op, 2, len)?),
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::Int(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
        (Value::Float(l), Value::Int(r)) => l.partial_cmp(&(*r as f64)),
        (Value::String(l), Value::String(r)) | (Value::Symbol(l), Value::Symbol(r)) => {
            Some(l.cmp(r))
        }
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn compare(op: NAryOp, left: &Value, right: &Value) -> Value {
    if left == &Value::Missing || right == &Value::Missing {
        return Value::Missing;
    }
    if left.is_unknown() || right.is_unknown() {
        return Value::Null;
    }
    let ordering = order(left, right);
    match op {
        NAryOp::Eq => Value::Bool(ordering == Some(Ordering::Equal) || left == right),
        NAryOp::Ne => Value::Bool(!(ordering == Some(Ordering::Equal) || left == right)),
        _ => match ordering {
            Some(ordering) => Value::Bool(match op {
                NAryOp::Lt => ordering.is_lt(),
                NAryOp::Lte => ordering.is_le(),
                NAryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }),
            None => Value::Null,
        },
    }
}

fn and(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
        (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn or(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
        (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn arithmetic(op: NAryOp, left: &Value, right: &Value) -> Result<Value> {
    if left == &Value::Missing || right == &Value::Missing {
        return Ok(Value::Missing);
    }
    if left.is_unknown() || right.is_unknown() {
        return Ok(Value::Null);
    }
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => {
            let result = match op {
                NAryOp::Add => l.checked_add(*r),
                NAryOp::Sub => l.checked_sub(*r),
                _ => l.checked_mul(*r),
            };
            match result.filter(|v| i64::try_from(*v).is_ok()) {
                Some(v) => Ok(Value::Int(v)),
                None => Err(evaluation_error("integer overflow", None, None)?),
            }
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let l = as_f64(left);
            let r = as_f64(right);
            Ok(Value::Float(match op {
                NAryOp::Add => l + r,
                NAryOp::Sub => l - r,
                _ => l * r,
            }))
        }
        (Value::Int(_) | Value::Float(_), other) | (other, _) => Err(evaluation_error(
            &format!("operator '{}' expects numbers", op.name()),
            Some(other),
            None,
        )?),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(v) => *v as f64,
        Value::Float(v) => *v,
        _ => f64::NAN,
    }
}
