#![allow(missing_docs)]

//! Metadata attached to every expression tree and physical plan node.
//!
//! The parser records where a node came from; later passes may attach
//! semantic annotations (for example, that an aggregate call was written as
//! `COUNT(*)`). Rewrites carry the container forward unless a pass chooses to
//! transform it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Annotation tag set by the parser on `COUNT(*)` aggregate calls.
pub const COUNT_STAR: &str = "is_count_star";

/// One-based line/column position in the source text.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number, starting at 1.
    pub line: i64,
    /// Column number, starting at 1.
    pub column: i64,
    /// Length of the source span in characters.
    pub length: i64,
}

impl SourceLocation {
    /// Creates a location with an unknown span length.
    pub fn new(line: i64, column: i64) -> Self {
        Self {
            line,
            column,
            length: 0,
        }
    }
}

/// Value of a semantic annotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    /// The annotation is present and carries no payload.
    Flag,
    /// Text payload.
    Text(String),
    /// Integer payload.
    Int(i64),
}

/// Source location plus arbitrary tagged annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaContainer {
    location: Option<SourceLocation>,
    annotations: BTreeMap<String, MetaValue>,
}

impl MetaContainer {
    /// Empty container with no location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container pointing at `line:column`.
    pub fn at(line: i64, column: i64) -> Self {
        Self::default().with_location(SourceLocation::new(line, column))
    }

    /// Sets the source location.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Adds (or replaces) an annotation.
    pub fn with(mut self, tag: impl Into<String>, value: MetaValue) -> Self {
        self.annotations.insert(tag.into(), value);
        self
    }

    /// Adds a payload-less annotation.
    pub fn with_flag(self, tag: impl Into<String>) -> Self {
        self.with(tag, MetaValue::Flag)
    }

    pub fn location(&self) -> Option<SourceLocation> {
        self.location
    }

    pub fn get(&self, tag: &str) -> Option<&MetaValue> {
        self.annotations.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.annotations.contains_key(tag)
    }

    /// Iterates annotations in tag order.
    pub fn annotations(&self) -> impl Iterator<Item = (&str, &MetaValue)> {
        self.annotations.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.annotations.is_empty()
    }
}
