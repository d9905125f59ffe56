//! Canonical value representation shared by literals in the expression tree,
//! physical plans and the evaluation registers.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Typed value tagged with explicit type information so serialized plans stay
/// unambiguous.
///
/// Integers are carried as `i128` so the parser can hand over literals that do
/// not fit the 64-bit range the evaluator supports; the validator rejects them
/// before they reach compilation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Absent value.
    Missing,
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal, possibly wider than 64 bits.
    Int(i128),
    /// 64-bit floating point literal.
    Float(f64),
    /// Arbitrary precision decimal kept in its textual form.
    Decimal(String),
    /// UTF-8 string literal.
    String(String),
    /// Symbol (identifier-like text) literal.
    Symbol(String),
    /// Arbitrary binary payload.
    Bytes(Vec<u8>),
    /// Ordered collection.
    List(Vec<Value>),
    /// Unordered collection.
    Bag(Vec<Value>),
    /// Named fields.
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the type name used in diagnostics (`ACTUAL_TYPE`).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Missing => "MISSING",
            Value::Null => "NULL",
            Value::Bool(_) => "BOOL",
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Decimal(_) => "DECIMAL",
            Value::String(_) => "STRING",
            Value::Symbol(_) => "SYMBOL",
            Value::Bytes(_) => "BLOB",
            Value::List(_) => "LIST",
            Value::Bag(_) => "BAG",
            Value::Struct(_) => "STRUCT",
        }
    }

    /// Text values (strings and symbols) can name struct fields.
    pub fn is_text(&self) -> bool {
        matches!(self, Value::String(_) | Value::Symbol(_))
    }

    /// True for the literal boolean `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// Null or missing.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Null | Value::Missing)
    }

    /// Returns the integer when it fits the signed 64-bit range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => write!(f, "MISSING"),
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Symbol(v) => write!(f, "`{v}`"),
            Value::Bytes(v) => write!(f, "<<{} bytes>>", v.len()),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Bag(items) => {
                write!(f, "<<")?;
                write_items(f, items)?;
                write!(f, ">>")
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{name}': {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}
