#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{ErrorCategory, Property};

/// Stable, machine-readable identifiers for user-facing query errors.
///
/// Codes are grouped by the stage that raises them. The string returned by
/// [`ErrorCode::code`] is part of the public contract and never changes for
/// an existing variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Integer literal does not fit the supported 64-bit range.
    SemanticLiteralIntOverflow,
    /// `DECIMAL(p, s)`/`NUMERIC(p, s)` with a scale outside `[0, p]`.
    SemanticInvalidDecimalArguments,
    /// `HAVING` without a `GROUP BY` (or with no grouping keys).
    SemanticHavingUsedWithoutGroupBy,
    /// Struct constructor field name is not text.
    SemanticNonTextStructFieldKey,
    /// `COUNT(DISTINCT *)`.
    EvaluatorCountDistinctStar,
    /// Recognised language feature that is not implemented.
    EvaluatorFeatureNotSupportedYet,
    /// `LIMIT` evaluated to a negative number.
    EvaluatorNegativeLimit,
    /// `LIMIT` evaluated to something other than an integer.
    EvaluatorNonIntLimitValue,
    /// `OFFSET` evaluated to a negative number.
    EvaluatorNegativeOffset,
    /// `OFFSET` evaluated to something other than an integer.
    EvaluatorNonIntOffsetValue,
    /// A register was read before any operator assigned it.
    EvaluatorUnboundVariable,
    /// Catch-all for failures raised by scalar evaluation.
    EvaluatorGenericException,
}

impl ErrorCode {
    /// Returns the stable code string.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::SemanticLiteralIntOverflow => "SEMANTIC_LITERAL_INT_OVERFLOW",
            ErrorCode::SemanticInvalidDecimalArguments => "SEMANTIC_INVALID_DECIMAL_ARGUMENTS",
            ErrorCode::SemanticHavingUsedWithoutGroupBy => {
                "SEMANTIC_HAVING_USED_WITHOUT_GROUP_BY"
            }
            ErrorCode::SemanticNonTextStructFieldKey => "SEMANTIC_NON_TEXT_STRUCT_FIELD_KEY",
            ErrorCode::EvaluatorCountDistinctStar => "EVALUATOR_COUNT_DISTINCT_STAR",
            ErrorCode::EvaluatorFeatureNotSupportedYet => "EVALUATOR_FEATURE_NOT_SUPPORTED_YET",
            ErrorCode::EvaluatorNegativeLimit => "EVALUATOR_NEGATIVE_LIMIT",
            ErrorCode::EvaluatorNonIntLimitValue => "EVALUATOR_NON_INT_LIMIT_VALUE",
            ErrorCode::EvaluatorNegativeOffset => "EVALUATOR_NEGATIVE_OFFSET",
            ErrorCode::EvaluatorNonIntOffsetValue => "EVALUATOR_NON_INT_OFFSET_VALUE",
            ErrorCode::EvaluatorUnboundVariable => "EVALUATOR_UNBOUND_VARIABLE",
            ErrorCode::EvaluatorGenericException => "EVALUATOR_GENERIC_EXCEPTION",
        }
    }

    /// Stage that raises this code.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::SemanticLiteralIntOverflow
            | ErrorCode::SemanticInvalidDecimalArguments
            | ErrorCode::SemanticHavingUsedWithoutGroupBy
            | ErrorCode::SemanticNonTextStructFieldKey => ErrorCategory::Semantic,
            ErrorCode::EvaluatorCountDistinctStar
            | ErrorCode::EvaluatorFeatureNotSupportedYet
            | ErrorCode::EvaluatorNegativeLimit
            | ErrorCode::EvaluatorNonIntLimitValue
            | ErrorCode::EvaluatorNegativeOffset
            | ErrorCode::EvaluatorNonIntOffsetValue
            | ErrorCode::EvaluatorUnboundVariable
            | ErrorCode::EvaluatorGenericException => ErrorCategory::Evaluator,
        }
    }

    /// Properties an error with this code is expected to carry.
    ///
    /// Every code carries the source location; the rest are code specific.
    pub fn properties(&self) -> &'static [Property] {
        const LOCATION: &[Property] = &[Property::LineNumber, Property::ColumnNumber];
        match self {
            ErrorCode::EvaluatorFeatureNotSupportedYet => &[
                Property::LineNumber,
                Property::ColumnNumber,
                Property::FeatureName,
            ],
            ErrorCode::SemanticNonTextStructFieldKey
            | ErrorCode::EvaluatorNonIntLimitValue
            | ErrorCode::EvaluatorNonIntOffsetValue => &[
                Property::LineNumber,
                Property::ColumnNumber,
                Property::ActualType,
            ],
            ErrorCode::EvaluatorUnboundVariable => &[
                Property::LineNumber,
                Property::ColumnNumber,
                Property::BindingName,
            ],
            _ => LOCATION,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
