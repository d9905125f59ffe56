#![allow(missing_docs)]

//! Executable building blocks produced by the plan compiler.
//!
//! A [`RelationExpression`] is a compiled relational operator; evaluating it
//! against an [`EvaluatorState`] yields a [`RelationIterator`], a pull cursor
//! whose rows are the register assignments made before each successful
//! [`RelationIterator::next_row`]. A [`ValueExpression`] is a compiled scalar.

use std::fmt;

use crate::error::Result;
use crate::query::metadata::SourceLocation;
use crate::query::state::{EvaluatorState, SetVariable};
use crate::query::value::Value;

/// Pull cursor over the rows of a relation.
pub trait RelationIterator {
    /// Advances to the next row, assigning its variables into `state`.
    /// Returns `false` once the relation is exhausted.
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool>;
}

/// Boxed cursor borrowing from the compiled plan that created it.
pub type BoxRelationIterator<'a> = Box<dyn RelationIterator + 'a>;

/// Compiled relational operator. Shared and reusable across executions.
pub trait RelationExpression: Send + Sync {
    /// Starts a new iteration. Inputs that depend on variables set by an
    /// enclosing operator are read from `state` at this point.
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>>;
}

/// Boxed, shareable relational operator.
pub type BoxRelationExpression = Box<dyn RelationExpression>;

type ValueFn = dyn Fn(&mut EvaluatorState) -> Result<Value> + Send + Sync;

/// Compiled scalar expression together with the location it came from.
///
/// Errors raised while evaluating are annotated with that location unless
/// they already carry one.
pub struct ValueExpression {
    func: Box<ValueFn>,
    location: Option<SourceLocation>,
}

impl ValueExpression {
    pub fn new<F>(location: Option<SourceLocation>, func: F) -> Self
    where
        F: Fn(&mut EvaluatorState) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
            location,
        }
    }

    /// Expression that always yields `value`.
    pub fn constant(value: Value) -> Self {
        Self::new(None, move |_| Ok(value.clone()))
    }

    pub fn evaluate(&self, state: &mut EvaluatorState) -> Result<Value> {
        (self.func)(state).map_err(|err| err.or_location(self.location))
    }

    pub fn location(&self) -> Option<SourceLocation> {
        self.location
    }
}

impl fmt::Debug for ValueExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueExpression")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// `LET` binding after compilation: evaluate `expr`, store with `setter`.
#[derive(Debug)]
pub struct VariableBinding {
    pub setter: SetVariable,
    pub expr: ValueExpression,
}

impl VariableBinding {
    pub fn new(setter: SetVariable, expr: ValueExpression) -> Self {
        Self { setter, expr }
    }

    /// Evaluates the value and assigns it.
    pub fn bind(&self, state: &mut EvaluatorState) -> Result<()> {
        let value = self.expr.evaluate(state)?;
        self.setter.set(state, value)
    }
}

/// Relation produced for a plan node: the operator plus the node's location.
pub(crate) struct LocatedRelation {
    inner: BoxRelationExpression,
    location: Option<SourceLocation>,
}

impl LocatedRelation {
    pub(crate) fn new(inner: BoxRelationExpression, location: Option<SourceLocation>) -> Self {
        Self { inner, location }
    }
}

impl RelationExpression for LocatedRelation {
    fn evaluate<'a>(&'a self, state: &mut EvaluatorState) -> Result<BoxRelationIterator<'a>> {
        let inner = self
            .inner
            .evaluate(state)
            .map_err(|err| err.or_location(self.location))?;
        Ok(Box::new(LocatedIterator {
            inner,
            location: self.location,
        }))
    }
}

struct LocatedIterator<'a> {
    inner: BoxRelationIterator<'a>,
    location: Option<SourceLocation>,
}

impl RelationIterator for LocatedIterator<'_> {
    fn next_row(&mut self, state: &mut EvaluatorState) -> Result<bool> {
        self.inner
            .next_row(state)
            .map_err(|err| err.or_location(self.location))
    }
}

/// Drains `relation`, calling `row` after every successful advance.
pub fn for_each_row<F>(
    relation: &dyn RelationExpression,
    state: &mut EvaluatorState,
    mut row: F,
) -> Result<()>
where
    F: FnMut(&mut EvaluatorState) -> Result<()>,
{
    let mut rows = relation.evaluate(state)?;
    while rows.next_row(state)? {
        row(state)?;
    }
    Ok(())
}
