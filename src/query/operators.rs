#![allow(missing_docs)]

//! The `default` implementation of every relational operator kind.
//!
//! All of them are pull-based cursors over the register file. Row order is
//! the natural nested-loop order; no operator buffers rows.

use std::sync::Arc;

use tracing::trace;

use crate::diagnostics::{Property, PropertyValueMap};
use crate::error::{Error, InternalError, QueryError, Result};
use crate::query::errors::ErrorCode;
use crate::query::physical::{Impl, JoinType, DEFAULT_IMPL};
use crate::query::registry::{
    FilterFactory, JoinFactory, JoinInputs, LetFactory, LimitFactory, OffsetFactory,
    OperatorFactory, OperatorKind, ProjectFactory, ScanFactory,
};
use crate::query::relation::{
    BoxRelationExpression, BoxRelationIterator, RelationExpression, RelationIterator,
    ValueExpression, VariableBinding,
};
use crate::query::state::{EvaluatorState, NullPadding, SetVariable};
use crate::query::value::Value;

/// One factory per kind, all named `default`.
pub fn default_factories() -> Vec<OperatorFactory> {
    vec![
        OperatorFactory::Scan(Arc::new(DefaultScan)),
        OperatorFactory::Project(Arc::new(DefaultProject)),
        OperatorFactory::Filter(Arc::new(DefaultFilter)),
        OperatorFactory::Join(Arc::new(DefaultJoin)),
        OperatorFactory::Offset(Arc::new(DefaultOffset)),
        OperatorFactory::Limit(Arc::new(DefaultLimit)),
        OperatorFactory::Let(Arc::new(DefaultLet)),
    ]
}

#[derive(Debug, Default)]
pub struct DefaultScan;

impl ScanFactory for DefaultScan {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(
        &self,
        imp: &Impl,
        expr: ValueExpression,
        set_as: SetVariable,
        set_at: Option<SetVariable>,
        set_by: Option<SetVariable>,
    ) -> Result<BoxRelationExpression> {
        if set_by.is_some() {
            return Err(InternalError::Unsupported {
                kind: OperatorKind::Scan,
                name: imp.name.clone(),
                feature: "BY variables",
            }
            .into());
        }
        Ok(Box::new(ScanOperator {
            expr,
            set_as,
            set_at,
        }))
    }
}

struct ScanOperator {
    expr: ValueExpression,
    set_as: SetVariable,
    set_at: Option<SetVariable>,
}

impl RelationExpression for ScanOperator {
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        let (items, ordered) = match self.expr.evaluate(state)? {
            Value::List(items) => (items, true),
            Value::Bag(items) => (items, false),
            other => (vec![other], false),
        };
        Ok(Box::new(ScanIter {
            items: items.into_iter(),
            ordinal: 0,
            ordered,
            set_as: self.set_as,
            set_at: self.set_at,
        }))
    }
}

struct ScanIter {
    items: std::vec::IntoIter<Value>,
    ordinal: usize,
    ordered: bool,
    set_as: SetVariable,
    set_at: Option<SetVariable>,
}

impl RelationIterator for ScanIter {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        let Some(item) = self.items.next() else {
            return Ok(false);
        };
        self.set_as.set(state, item)?;
        if let Some(set_at) = self.set_at {
            let at = if self.ordered {
                Value::Int(self.ordinal as i128)
            } else {
                Value::Missing
            };
            set_at.set(state, at)?;
        }
        self.ordinal += 1;
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct DefaultProject;

impl ProjectFactory for DefaultProject {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(
        &self,
        _imp: &Impl,
        set_binding: SetVariable,
        args: Vec<ValueExpression>,
    ) -> Result<BoxRelationExpression> {
        Ok(Box::new(ProjectOperator { set_binding, args }))
    }
}

struct ProjectOperator {
    set_binding: SetVariable,
    args: Vec<ValueExpression>,
}

impl RelationExpression for ProjectOperator {
    fn evaluate<'a>(&'a self, _state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        Ok(Box::new(ProjectIter {
            op: self,
            done: false,
        }))
    }
}

struct ProjectIter<'a> {
    op: &'a ProjectOperator,
    done: bool,
}

impl RelationIterator for ProjectIter<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        self.done = true;
        let values = self
            .op
            .args
            .iter()
            .map(|arg| arg.evaluate(state))
            .collect::<Result<Vec<_>>>()?;
        self.op.set_binding.set(state, Value::List(values))?;
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct DefaultFilter;

impl FilterFactory for DefaultFilter {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(
        &self,
        _imp: &Impl,
        predicate: ValueExpression,
        source: BoxRelationExpression,
    ) -> Result<BoxRelationExpression> {
        Ok(Box::new(FilterOperator { predicate, source }))
    }
}

struct FilterOperator {
    predicate: ValueExpression,
    source: BoxRelationExpression,
}

impl RelationExpression for FilterOperator {
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        Ok(Box::new(FilterIter {
            source: self.source.evaluate(state)?,
            predicate: &self.predicate,
        }))
    }
}

struct FilterIter<'a> {
    source: BoxRelationIterator<'a>,
    predicate: &'a ValueExpression,
}

impl RelationIterator for FilterIter<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        while self.source.next_row(state)? {
            if self.predicate.evaluate(state)?.is_true() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[derive(Debug, Default)]
pub struct DefaultJoin;

impl JoinFactory for DefaultJoin {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(&self, _imp: &Impl, inputs: JoinInputs) -> Result<BoxRelationExpression> {
        Ok(Box::new(JoinOperator { inputs }))
    }
}

struct JoinOperator {
    inputs: JoinInputs,
}

impl RelationExpression for JoinOperator {
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        let JoinInputs {
            join_type,
            left,
            right,
            predicate,
            left_padding,
            right_padding,
        } = &self.inputs;
        let predicate = predicate.as_ref();
        let rows: BoxRelationIterator<'a> = match join_type {
            JoinType::Inner => Box::new(NestedLoop::start(
                LoopMode::Inner,
                left.as_ref(),
                right.as_ref(),
                predicate,
                right_padding,
                state,
            )?),
            JoinType::Left => Box::new(NestedLoop::start(
                LoopMode::Outer,
                left.as_ref(),
                right.as_ref(),
                predicate,
                right_padding,
                state,
            )?),
            JoinType::Right => Box::new(NestedLoop::start(
                LoopMode::Outer,
                right.as_ref(),
                left.as_ref(),
                predicate,
                left_padding,
                state,
            )?),
            JoinType::Full => Box::new(FullJoinIter {
                first: NestedLoop::start(
                    LoopMode::Outer,
                    left.as_ref(),
                    right.as_ref(),
                    predicate,
                    right_padding,
                    state,
                )?,
                second: None,
                op: self,
            }),
        };
        Ok(rows)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LoopMode {
    /// Matching pairs only.
    Inner,
    /// Matching pairs, plus each unmatched outer row with the inner side padded.
    Outer,
    /// Only unmatched outer rows, inner side padded.
    Anti,
}

/// Nested-loop join: `inner` is re-evaluated for every `outer` row.
struct NestedLoop<'a> {
    mode: LoopMode,
    outer: BoxRelationIterator<'a>,
    inner_relation: &'a dyn RelationExpression,
    inner: Option<BoxRelationIterator<'a>>,
    matched: bool,
    predicate: Option<&'a ValueExpression>,
    padding: &'a NullPadding,
}

impl<'a> NestedLoop<'a> {
    fn start(
        mode: LoopMode,
        outer: &'a dyn RelationExpression,
        inner: &'a dyn RelationExpression,
        predicate: Option<&'a ValueExpression>,
        padding: &'a NullPadding,
        state: &mut EvaluatorState,
    ) -> Result<Self> {
        Ok(Self {
            mode,
            outer: outer.evaluate(state)?,
            inner_relation: inner,
            inner: None,
            matched: false,
            predicate,
            padding,
        })
    }

    fn matches(&self, state: &mut EvaluatorState) -> Result<bool> {
        match self.predicate {
            Some(predicate) => Ok(predicate.evaluate(state)?.is_true()),
            None => Ok(true),
        }
    }
}

impl RelationIterator for NestedLoop<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        loop {
            if self.inner.is_none() {
                if !self.outer.next_row(state)? {
                    return Ok(false);
                }
                self.matched = false;
                self.inner = Some(self.inner_relation.evaluate(state)?);
            }
            let Some(inner) = self.inner.as_mut() else {
                continue;
            };
            if inner.next_row(state)? {
                if !self.matches(state)? {
                    continue;
                }
                self.matched = true;
                if self.mode == LoopMode::Anti {
                    self.inner = None;
                    continue;
                }
                return Ok(true);
            }
            self.inner = None;
            if !self.matched && self.mode != LoopMode::Inner {
                trace!(mode = ?self.mode, "join.pad");
                self.padding.apply(state)?;
                return Ok(true);
            }
        }
    }
}

/// Left outer pass, then every right row that matched nothing, left padded.
struct FullJoinIter<'a> {
    first: NestedLoop<'a>,
    second: Option<NestedLoop<'a>>,
    op: &'a JoinOperator,
}

impl RelationIterator for FullJoinIter<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        if self.second.is_none() {
            if self.first.next_row(state)? {
                return Ok(true);
            }
            let inputs = &self.op.inputs;
            self.second = Some(NestedLoop::start(
                LoopMode::Anti,
                inputs.right.as_ref(),
                inputs.left.as_ref(),
                inputs.predicate.as_ref(),
                &inputs.left_padding,
                state,
            )?);
        }
        match self.second.as_mut() {
            Some(second) => second.next_row(state),
            None => Ok(false),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum RowCountKind {
    Offset,
    Limit,
}

impl RowCountKind {
    fn non_int(self) -> ErrorCode {
        match self {
            RowCountKind::Offset => ErrorCode::EvaluatorNonIntOffsetValue,
            RowCountKind::Limit => ErrorCode::EvaluatorNonIntLimitValue,
        }
    }

    fn negative(self) -> ErrorCode {
        match self {
            RowCountKind::Offset => ErrorCode::EvaluatorNegativeOffset,
            RowCountKind::Limit => ErrorCode::EvaluatorNegativeLimit,
        }
    }

    fn clause(self) -> &'static str {
        match self {
            RowCountKind::Offset => "OFFSET",
            RowCountKind::Limit => "LIMIT",
        }
    }
}

/// Evaluates a row count and checks it is a non-negative integer.
fn row_count(
    kind: RowCountKind,
    expr: &ValueExpression,
    state: &mut EvaluatorState,
) -> Result<usize> {
    let value = expr.evaluate(state)?;
    let context = PropertyValueMap::from_location(expr.location());
    match value {
        Value::Int(n) if n < 0 => Err(QueryError::new(
            kind.negative(),
            format!("{} value must be non-negative, got {n}", kind.clause()),
            context,
        )
        .into()),
        Value::Int(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
        other => {
            let context = context.with(Property::ActualType, other.type_name())?;
            Err(Error::from(QueryError::new(
                kind.non_int(),
                format!("{} value must be an integer", kind.clause()),
                context,
            )))
        }
    }
}

#[derive(Debug, Default)]
pub struct DefaultOffset;

impl OffsetFactory for DefaultOffset {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(
        &self,
        _imp: &Impl,
        row_count: ValueExpression,
        source: BoxRelationExpression,
    ) -> Result<BoxRelationExpression> {
        Ok(Box::new(RowCountOperator {
            kind: RowCountKind::Offset,
            row_count,
            source,
        }))
    }
}

#[derive(Debug, Default)]
pub struct DefaultLimit;

impl LimitFactory for DefaultLimit {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(
        &self,
        _imp: &Impl,
        row_count: ValueExpression,
        source: BoxRelationExpression,
    ) -> Result<BoxRelationExpression> {
        Ok(Box::new(RowCountOperator {
            kind: RowCountKind::Limit,
            row_count,
            source,
        }))
    }
}

struct RowCountOperator {
    kind: RowCountKind,
    row_count: ValueExpression,
    source: BoxRelationExpression,
}

impl RelationExpression for RowCountOperator {
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        Ok(Box::new(RowCountIter {
            op: self,
            source: self.source.evaluate(state)?,
            remaining: None,
        }))
    }
}

struct RowCountIter<'a> {
    op: &'a RowCountOperator,
    source: BoxRelationIterator<'a>,
    /// Rows still to skip (offset) or emit (limit); set on first pull.
    remaining: Option<usize>,
}

impl RelationIterator for RowCountIter<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        let remaining = match self.remaining {
            Some(remaining) => remaining,
            None => row_count(self.op.kind, &self.op.row_count, state)?,
        };
        match self.op.kind {
            RowCountKind::Offset => {
                let mut skip = remaining;
                while skip > 0 {
                    if !self.source.next_row(state)? {
                        self.remaining = Some(0);
                        return Ok(false);
                    }
                    skip -= 1;
                }
                self.remaining = Some(0);
                self.source.next_row(state)
            }
            RowCountKind::Limit => {
                if remaining == 0 {
                    self.remaining = Some(0);
                    return Ok(false);
                }
                let advanced = self.source.next_row(state)?;
                self.remaining = Some(if advanced { remaining - 1 } else { 0 });
                Ok(advanced)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct DefaultLet;

impl LetFactory for DefaultLet {
    fn name(&self) -> &str {
        DEFAULT_IMPL
    }

    fn create(
        &self,
        _imp: &Impl,
        source: BoxRelationExpression,
        bindings: Vec<VariableBinding>,
    ) -> Result<BoxRelationExpression> {
        Ok(Box::new(LetOperator { source, bindings }))
    }
}

struct LetOperator {
    source: BoxRelationExpression,
    bindings: Vec<VariableBinding>,
}

impl RelationExpression for LetOperator {
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        Ok(Box::new(LetIter {
            source: self.source.evaluate(state)?,
            bindings: &self.bindings,
        }))
    }
}

struct LetIter<'a> {
    source: BoxRelationIterator<'a>,
    bindings: &'a [VariableBinding],
}

impl RelationIterator for LetIter<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        if !self.source.next_row(state)? {
            return Ok(false);
        }
        for binding in self.bindings {
            binding.bind(state)?;
        }
        Ok(true)
    }
}
