use serde_json::json;
use thiserror::Error;

use crate::diagnostics::{ErrorCategory, PropertyTypeError, PropertyValue, PropertyValueMap};
use crate::query::errors::ErrorCode;
use crate::query::metadata::SourceLocation;
use crate::query::registry::OperatorKind;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the compiler core can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The query itself is at fault; carries a code and diagnostic context.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// A rewrite observed its cancellation token and stopped.
    #[error("rewrite interrupted")]
    Interrupted,
    /// The compiler was handed something no valid pipeline produces.
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

impl Error {
    /// True for failures that indicate a bug upstream of the query.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// Stable code for user-facing errors.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Query(err) => Some(err.code),
            Error::Interrupted | Error::Internal(_) => None,
        }
    }

    /// Category of user-facing errors.
    pub fn category(&self) -> Option<ErrorCategory> {
        self.code().map(|code| code.category())
    }

    /// Diagnostic context of a user-facing error.
    pub fn context(&self) -> Option<&PropertyValueMap> {
        match self {
            Error::Query(err) => Some(&err.context),
            Error::Interrupted | Error::Internal(_) => None,
        }
    }

    /// Attaches `location` to a user-facing error that does not carry one yet.
    pub fn or_location(self, location: Option<SourceLocation>) -> Self {
        match (self, location) {
            (Error::Query(mut err), Some(location)) if err.context.source_location().is_none() => {
                err.context.add_source_location(location);
                Error::Query(err)
            }
            (other, _) => other,
        }
    }
}

impl From<PropertyTypeError> for Error {
    fn from(value: PropertyTypeError) -> Self {
        Error::Internal(InternalError::PropertyType(value))
    }
}

/// User-facing error raised by validation or evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}: {message} [{code}] {context}", .code.category())]
pub struct QueryError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Short English description, for logs.
    pub message: String,
    /// Facts needed to render a precise message.
    pub context: PropertyValueMap,
}

impl QueryError {
    /// Creates an error from its parts.
    pub fn new(code: ErrorCode, message: impl Into<String>, context: PropertyValueMap) -> Self {
        Self {
            code,
            message: message.into(),
            context,
        }
    }

    /// Stage that raised the error.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Machine-readable form handed to message renderers: category, code,
    /// message and every property keyed by its external name.
    pub fn to_json(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .context
            .iter()
            .map(|(property, value)| (property.name().to_owned(), property_json(value)))
            .collect();
        json!({
            "category": self.category().to_string(),
            "code": self.code.code(),
            "message": self.message,
            "properties": properties,
        })
    }
}

fn property_json(value: &PropertyValue) -> serde_json::Value {
    match value {
        PropertyValue::Long(v) => json!(v),
        PropertyValue::Integer(v) => json!(v),
        PropertyValue::String(v) => json!(v),
        PropertyValue::Token(token) => json!(token.0),
        PropertyValue::Value(v) => json!(v.to_string()),
    }
}

/// Fatal inconsistencies between the plan and the compiler's configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InternalError {
    /// No factory is registered for the selector.
    #[error("factory for operator {kind} named '{name}' does not exist")]
    FactoryNotFound { kind: OperatorKind, name: String },
    /// A factory is registered under the selector but implements another kind.
    #[error("operator factory {kind} named '{name}' is a {found} factory")]
    FactoryKindMismatch {
        kind: OperatorKind,
        name: String,
        found: OperatorKind,
    },
    /// The selector name cannot name any factory.
    #[error("malformed {kind} implementation name '{name}'")]
    MalformedSelector { kind: OperatorKind, name: String },
    /// A factory refused the arguments the plan gave it.
    #[error("{kind} implementation '{name}' does not support {feature}")]
    Unsupported {
        kind: OperatorKind,
        name: String,
        feature: &'static str,
    },
    /// A plan addressed a register the evaluation state does not have.
    #[error("register {index} out of range for state with {len} registers")]
    RegisterOutOfRange { index: usize, len: usize },
    /// A diagnostic was built with a wrongly typed property.
    #[error(transparent)]
    PropertyType(#[from] PropertyTypeError),
}
