#![allow(missing_docs)]

//! Typed diagnostic context attached to every user-facing error.
//!
//! Each [`Property`] declares the [`PropertyType`] its values must have. A
//! [`PropertyValueMap`] refuses values of the wrong type, so a reader can
//! rely on the type of whatever it finds. A missing key means "no
//! information", never a sentinel; test with [`PropertyValueMap::contains`]
//! before reading.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::metadata::SourceLocation;
use crate::query::value::Value;

/// Compiler stage that detected an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Tokenizer.
    Lexer,
    /// Parser.
    Parser,
    /// Semantic checks and rewrites.
    Semantic,
    /// Plan compilation and evaluation.
    Evaluator,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorCategory::Lexer => "Lexer Error",
            ErrorCategory::Parser => "Parser Error",
            ErrorCategory::Semantic => "Semantic Error",
            ErrorCategory::Evaluator => "Evaluator Error",
        })
    }
}

/// Declared value type of a [`Property`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// Signed 64-bit integer.
    Long,
    /// UTF-8 text.
    String,
    /// Signed 32-bit integer.
    Integer,
    /// Lexer token kind.
    Token,
    /// Structured value.
    Value,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PropertyType::Long => "i64",
            PropertyType::String => "string",
            PropertyType::Integer => "i32",
            PropertyType::Token => "token",
            PropertyType::Value => "value",
        })
    }
}

macro_rules! properties {
    ($($(#[$doc:meta])* $variant:ident => ($name:literal, $ty:ident),)*) => {
        /// Keys that may appear in a [`PropertyValueMap`].
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum Property {
            $($(#[$doc])* $variant,)*
        }

        impl Property {
            /// Every property, in declaration order.
            pub const ALL: &'static [Property] = &[$(Property::$variant,)*];

            /// Stable external name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Property::$variant => $name,)*
                }
            }

            /// Type every value stored under this key must have.
            pub fn value_type(self) -> PropertyType {
                match self {
                    $(Property::$variant => PropertyType::$ty,)*
                }
            }
        }
    };
}

properties! {
    /// Line of the offending source text.
    LineNumber => ("line_no", Long),
    /// Column of the offending source text.
    ColumnNumber => ("column_no", Long),
    TokenString => ("token_string", String),
    CastTo => ("cast_to", String),
    CastFrom => ("cast_from", String),
    Keyword => ("keyword", String),
    TokenType => ("token_type", Token),
    ExpectedTokenType => ("expected_token_type", Token),
    ExpectedTokenType1Of2 => ("expected_token_type_1_of_2", Token),
    ExpectedTokenType2Of2 => ("expected_token_type_2_of_2", Token),
    TokenValue => ("token_value", Value),
    ExpectedArityMin => ("arity_min", Integer),
    ExpectedArityMax => ("arity_max", Integer),
    ActualArity => ("actual_arity", Integer),
    ExpectedParameterOrdinal => ("expected_parameter_ordinal", Integer),
    BoundParameterCount => ("bound_parameter_count", Integer),
    TimestampFormatPattern => ("timestamp_format_pattern", String),
    TimestampFormatPatternFields => ("timestamp_format_pattern_fields", String),
    TimestampString => ("timestamp_string", String),
    BindingName => ("binding_name", String),
    BindingNameMatches => ("binding_name_matches", String),
    LikeValue => ("value_to_match", String),
    LikePattern => ("pattern", String),
    LikeEscape => ("escape_char", String),
    FunctionName => ("function_name", String),
    ArgumentPosition => ("argument_position", Integer),
    NaryOp => ("nary_op", String),
    ProcedureName => ("procedure_name", String),
    ExpectedArgumentTypes => ("expected_types", String),
    ActualArgumentTypes => ("actual_types", String),
    /// Name of a language feature that is recognised but not implemented.
    FeatureName => ("FEATURE_NAME", String),
    /// Type name of an offending value.
    ActualType => ("ACTUAL_TYPE", String),
    IntSizeInBytes => ("INT_SIZE", Integer),
    ExpectedStaticType => ("EXPECTED_STATIC_TYPE", String),
    Constant => ("CONSTANT", String),
    Message => ("MESSAGE", String),
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque token kind supplied by the lexer.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TokenType(pub String);

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single typed property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Long(i64),
    String(String),
    Integer(i32),
    Token(TokenType),
    Value(Value),
}

impl PropertyValue {
    /// Declared type of this value.
    pub fn value_type(&self) -> PropertyType {
        match self {
            PropertyValue::Long(_) => PropertyType::Long,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Token(_) => PropertyType::Token,
            PropertyValue::Value(_) => PropertyType::Value,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            PropertyValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&TokenType> {
        match self {
            PropertyValue::Token(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropertyValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Long(v) => write!(f, "{v}"),
            PropertyValue::String(v) => write!(f, "\"{v}\""),
            PropertyValue::Integer(v) => write!(f, "{v}"),
            PropertyValue::Token(v) => write!(f, "{v}"),
            PropertyValue::Value(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_owned())
    }
}

impl From<TokenType> for PropertyValue {
    fn from(value: TokenType) -> Self {
        PropertyValue::Token(value)
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::Value(value)
    }
}

/// Attempt to store a value whose type does not match the key's declaration.
///
/// This is a bug in the code building the diagnostic, never a problem with
/// the query being compiled.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("property {property} requires a value of type {expected} but was given {actual}")]
pub struct PropertyTypeError {
    /// Key that was being set.
    pub property: Property,
    /// Type declared by the key.
    pub expected: PropertyType,
    /// Type of the rejected value.
    pub actual: PropertyType,
}

/// Typed map of contextual facts about an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyValueMap {
    map: BTreeMap<Property, PropertyValue>,
}

impl PropertyValueMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map holding `LINE_NUMBER`/`COLUMN_NUMBER` for `location`, or empty.
    pub fn from_location(location: Option<SourceLocation>) -> Self {
        let mut map = Self::new();
        if let Some(location) = location {
            map.add_source_location(location);
        }
        map
    }

    /// Stores `value` under `property`.
    ///
    /// Fails, leaving the map untouched, when the value's type differs from
    /// the property's declared type.
    pub fn set(
        &mut self,
        property: Property,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyTypeError> {
        let value = value.into();
        let actual = value.value_type();
        let expected = property.value_type();
        if actual != expected {
            return Err(PropertyTypeError {
                property,
                expected,
                actual,
            });
        }
        self.map.insert(property, value);
        Ok(())
    }

    /// Builder form of [`PropertyValueMap::set`].
    pub fn with(
        mut self,
        property: Property,
        value: impl Into<PropertyValue>,
    ) -> Result<Self, PropertyTypeError> {
        self.set(property, value)?;
        Ok(self)
    }

    /// Records the line and column of `location`.
    pub fn add_source_location(&mut self, location: SourceLocation) {
        self.map
            .insert(Property::LineNumber, PropertyValue::Long(location.line));
        self.map
            .insert(Property::ColumnNumber, PropertyValue::Long(location.column));
    }

    pub fn get(&self, property: Property) -> Option<&PropertyValue> {
        self.map.get(&property)
    }

    pub fn contains(&self, property: Property) -> bool {
        self.map.contains_key(&property)
    }

    /// Keys present, in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        self.map.keys().copied()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Property, &PropertyValue)> + '_ {
        self.map.iter().map(|(property, value)| (*property, value))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Source location recorded in the map, if both coordinates are present.
    pub fn source_location(&self) -> Option<SourceLocation> {
        let line = self.get(Property::LineNumber)?.as_long()?;
        let column = self.get(Property::ColumnNumber)?.as_long()?;
        Some(SourceLocation::new(line, column))
    }
}

impl fmt::Display for PropertyValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}: {value}")?;
        }
        write!(f, "}}")
    }
}
