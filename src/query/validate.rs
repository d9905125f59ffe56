//! Semantic checks the grammar cannot express.
//!
//! The validator runs after the rewrite passes and before planning. Every
//! later stage may assume a tree that passed it; a failure here usually points
//! at the parser or a rewrite pass rather than at the user's query, but the
//! errors are reported as ordinary query errors so the user sees the location.

use tracing::debug;

use crate::diagnostics::{Property, PropertyValueMap};
use crate::error::{Error, QueryError, Result};
use crate::query::ast::*;
use crate::query::config::{CompileOptions, TypedOpBehavior};
use crate::query::errors::ErrorCode;
use crate::query::metadata::{MetaContainer, COUNT_STAR};
use crate::query::value::Value;
use crate::query::visit::{self, Visitor};

/// Validates `statement`, stopping at the first violation.
pub fn validate(statement: &Expr, options: CompileOptions) -> Result<()> {
    Validator::new(options).validate(statement)
}

/// Read-only pass enforcing the semantic rules.
#[derive(Clone, Debug, Default)]
pub struct Validator {
    options: CompileOptions,
}

impl Validator {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Walks the statement; the first violation is returned.
    pub fn validate(&mut self, statement: &Expr) -> Result<()> {
        self.visit_expr(statement).inspect_err(|err| {
            if let Some(code) = err.code() {
                debug!(%code, node = statement.kind_name(), "validate.reject");
            }
        })
    }

    fn check_decimal_parameters(
        &self,
        precision: Option<i64>,
        scale: Option<i64>,
        metas: &MetaContainer,
    ) -> Result<()> {
        if self.options.typed_op_behavior != TypedOpBehavior::HonorParameters {
            return Ok(());
        }
        if let (Some(precision), Some(scale)) = (precision, scale) {
            if !(0..=precision).contains(&scale) {
                return Err(reject(
                    ErrorCode::SemanticInvalidDecimalArguments,
                    format!("Scale {scale} should be between 0 and precision {precision}"),
                    context_of(metas),
                ));
            }
        }
        Ok(())
    }
}

impl Visitor for Validator {
    fn visit_lit(&mut self, node: &Lit) -> Result<()> {
        if let Value::Int(value) = node.value {
            if i64::try_from(value).is_err() {
                return Err(reject(
                    ErrorCode::SemanticLiteralIntOverflow,
                    "Int overflow or underflow at compile time",
                    context_of(&node.metas),
                ));
            }
        }
        Ok(())
    }

    fn visit_data_type(&mut self, data_type: &DataType) -> Result<()> {
        match data_type.kind {
            SqlDataType::Decimal { precision, scale } | SqlDataType::Numeric { precision, scale } => {
                self.check_decimal_parameters(precision, scale, &data_type.metas)
            }
            _ => Ok(()),
        }
    }

    fn visit_call_agg(&mut self, node: &CallAgg) -> Result<()> {
        if node.setq == SetQuantifier::Distinct && node.metas.contains(COUNT_STAR) {
            return Err(reject(
                ErrorCode::EvaluatorCountDistinctStar,
                "COUNT(DISTINCT *) is not supported",
                context_of(&node.metas),
            ));
        }
        self.visit_expr(&node.func)?;
        self.visit_expr(&node.arg)
    }

    fn visit_select(&mut self, node: &Select) -> Result<()> {
        if let Some(group_by) = &node.group_by {
            if group_by.strategy == GroupingStrategy::Partial {
                return Err(not_supported("GROUP PARTIAL", &node.metas)?);
            }
            match node.projection {
                SelectProjection::Pivot { .. } => {
                    return Err(not_supported("PIVOT with GROUP BY", &node.metas)?);
                }
                SelectProjection::List { .. } | SelectProjection::Value { .. } => {}
            }
        }

        let has_keys = node
            .group_by
            .as_ref()
            .is_some_and(|group_by| !group_by.items.is_empty());
        if node.having.is_some() && !has_keys {
            return Err(reject(
                ErrorCode::SemanticHavingUsedWithoutGroupBy,
                "HAVING used without GROUP BY (or grouping expressions)",
                context_of(&node.metas),
            ));
        }

        visit::walk_select(self, node)
    }

    fn visit_struct(&mut self, node: &Struct) -> Result<()> {
        for field in &node.fields {
            let actual = match &field.name {
                Expr::Missing(_) => Some("MISSING"),
                Expr::Lit(lit) if !lit.value.is_text() => Some(lit.value.type_name()),
                _ => None,
            };
            if let Some(actual) = actual {
                let mut context = context_of(field.name.metas());
                context.set(Property::ActualType, actual)?;
                return Err(reject(
                    ErrorCode::SemanticNonTextStructFieldKey,
                    format!("Found struct field to be of type {actual}"),
                    context,
                ));
            }
        }
        visit::walk_struct(self, node)
    }
}

fn context_of(metas: &MetaContainer) -> PropertyValueMap {
    PropertyValueMap::from_location(metas.location())
}

fn reject(code: ErrorCode, message: impl Into<String>, context: PropertyValueMap) -> Error {
    QueryError::new(code, message, context).into()
}

fn not_supported(feature: &str, metas: &MetaContainer) -> Result<Error> {
    let context = context_of(metas).with(Property::FeatureName, feature)?;
    Ok(reject(
        ErrorCode::EvaluatorFeatureNotSupportedYet,
        format!("{feature} not supported yet"),
        context,
    ))
}
