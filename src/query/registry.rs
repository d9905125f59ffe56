//! Registry of relational operator implementations.
//!
//! Every physical plan node names the implementation that should run it. The
//! registry maps `(kind, name)` to a factory that builds the executable
//! operator from the node's compiled inputs. It is assembled once with
//! [`OperatorRegistryBuilder`] and then shared read-only.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::error::{InternalError, Result};
use crate::query::operators;
use crate::query::physical::{Impl, JoinType};
use crate::query::relation::{BoxRelationExpression, ValueExpression, VariableBinding};
use crate::query::state::{NullPadding, SetVariable};

/// The seven relational operator kinds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum OperatorKind {
    Scan,
    Project,
    Filter,
    Join,
    Offset,
    Limit,
    Let,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 7] = [
        OperatorKind::Scan,
        OperatorKind::Project,
        OperatorKind::Filter,
        OperatorKind::Join,
        OperatorKind::Offset,
        OperatorKind::Limit,
        OperatorKind::Let,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorKind::Scan => "SCAN",
            OperatorKind::Project => "PROJECT",
            OperatorKind::Filter => "FILTER",
            OperatorKind::Join => "JOIN",
            OperatorKind::Offset => "OFFSET",
            OperatorKind::Limit => "LIMIT",
            OperatorKind::Let => "LET",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds scan operators.
pub trait ScanFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        imp: &Impl,
        expr: ValueExpression,
        set_as: SetVariable,
        set_at: Option<SetVariable>,
        set_by: Option<SetVariable>,
    ) -> Result<BoxRelationExpression>;
}

/// Builds project operators.
pub trait ProjectFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        imp: &Impl,
        set_binding: SetVariable,
        args: Vec<ValueExpression>,
    ) -> Result<BoxRelationExpression>;
}

/// Builds filter operators.
pub trait FilterFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        imp: &Impl,
        predicate: ValueExpression,
        source: BoxRelationExpression,
    ) -> Result<BoxRelationExpression>;
}

/// Inputs of a join operator.
pub struct JoinInputs {
    pub join_type: JoinType,
    pub left: BoxRelationExpression,
    pub right: BoxRelationExpression,
    /// `None` when every pair matches.
    pub predicate: Option<ValueExpression>,
    /// Sets every left-side variable to `NULL`.
    pub left_padding: NullPadding,
    /// Sets every right-side variable to `NULL`.
    pub right_padding: NullPadding,
}

/// Builds join operators.
pub trait JoinFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, imp: &Impl, inputs: JoinInputs) -> Result<BoxRelationExpression>;
}

/// Builds offset operators.
pub trait OffsetFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        imp: &Impl,
        row_count: ValueExpression,
        source: BoxRelationExpression,
    ) -> Result<BoxRelationExpression>;
}

/// Builds limit operators.
pub trait LimitFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        imp: &Impl,
        row_count: ValueExpression,
        source: BoxRelationExpression,
    ) -> Result<BoxRelationExpression>;
}

/// Builds let operators.
pub trait LetFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(
        &self,
        imp: &Impl,
        source: BoxRelationExpression,
        bindings: Vec<VariableBinding>,
    ) -> Result<BoxRelationExpression>;
}

/// A factory of any kind.
#[derive(Clone)]
pub enum OperatorFactory {
    Scan(Arc<dyn ScanFactory>),
    Project(Arc<dyn ProjectFactory>),
    Filter(Arc<dyn FilterFactory>),
    Join(Arc<dyn JoinFactory>),
    Offset(Arc<dyn OffsetFactory>),
    Limit(Arc<dyn LimitFactory>),
    Let(Arc<dyn LetFactory>),
}

impl OperatorFactory {
    /// Kind of operator this factory builds.
    pub fn kind(&self) -> OperatorKind {
        match self {
            OperatorFactory::Scan(_) => OperatorKind::Scan,
            OperatorFactory::Project(_) => OperatorKind::Project,
            OperatorFactory::Filter(_) => OperatorKind::Filter,
            OperatorFactory::Join(_) => OperatorKind::Join,
            OperatorFactory::Offset(_) => OperatorKind::Offset,
            OperatorFactory::Limit(_) => OperatorKind::Limit,
            OperatorFactory::Let(_) => OperatorKind::Let,
        }
    }

    /// Name the factory registers itself under.
    pub fn name(&self) -> &str {
        match self {
            OperatorFactory::Scan(f) => f.name(),
            OperatorFactory::Project(f) => f.name(),
            OperatorFactory::Filter(f) => f.name(),
            OperatorFactory::Join(f) => f.name(),
            OperatorFactory::Offset(f) => f.name(),
            OperatorFactory::Limit(f) => f.name(),
            OperatorFactory::Let(f) => f.name(),
        }
    }
}

impl fmt::Debug for OperatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorFactory")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Why a typed lookup failed.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum LookupError {
    #[error("no factory registered")]
    NotFound,
    #[error("registered factory builds {found} operators")]
    WrongCapability { found: OperatorKind },
    #[error("malformed implementation name")]
    MalformedName,
}

impl LookupError {
    /// Converts into the fatal error reported by the compiler.
    pub fn into_internal(self, kind: OperatorKind, name: &str) -> InternalError {
        let name = name.to_owned();
        match self {
            LookupError::NotFound => InternalError::FactoryNotFound { kind, name },
            LookupError::WrongCapability { found } => {
                InternalError::FactoryKindMismatch { kind, name, found }
            }
            LookupError::MalformedName => InternalError::MalformedSelector { kind, name },
        }
    }
}

/// True when `name` can name a factory: non-empty ASCII alphanumerics plus
/// `_`, `-` and `.`.
pub fn is_well_formed_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
}

type Key = (OperatorKind, String);

/// Immutable `(kind, name) -> factory` map.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    factories: FxHashMap<Key, OperatorFactory>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("factories", &self.factories.len())
            .finish()
    }
}

macro_rules! typed_lookup {
    ($(#[$doc:meta])* $fn_name:ident, $kind:ident, $trait_name:ident) => {
        $(#[$doc])*
        pub fn $fn_name(&self, name: &str) -> std::result::Result<Arc<dyn $trait_name>, LookupError> {
            match self.lookup(OperatorKind::$kind, name)? {
                OperatorFactory::$kind(factory) => Ok(Arc::clone(factory)),
                other => Err(LookupError::WrongCapability { found: other.kind() }),
            }
        }
    };
}

impl OperatorRegistry {
    /// Starts an empty builder.
    pub fn builder() -> OperatorRegistryBuilder {
        OperatorRegistryBuilder::default()
    }

    /// Registry holding the `default` implementation of every kind.
    pub fn with_defaults() -> Self {
        Self::builder().with_defaults().build()
    }

    /// Raw lookup.
    pub fn get(&self, kind: OperatorKind, name: &str) -> Option<&OperatorFactory> {
        self.factories.get(&(kind, name.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered keys, sorted by kind then name.
    pub fn keys(&self) -> Vec<(OperatorKind, String)> {
        let mut keys: Vec<_> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lookup(&self, kind: OperatorKind, name: &str) -> std::result::Result<&OperatorFactory, LookupError> {
        if !is_well_formed_name(name) {
            return Err(LookupError::MalformedName);
        }
        self.get(kind, name).ok_or(LookupError::NotFound)
    }

    typed_lookup!(
        /// Scan factory registered under `name`.
        scan_factory, Scan, ScanFactory
    );
    typed_lookup!(
        /// Project factory registered under `name`.
        project_factory, Project, ProjectFactory
    );
    typed_lookup!(
        /// Filter factory registered under `name`.
        filter_factory, Filter, FilterFactory
    );
    typed_lookup!(
        /// Join factory registered under `name`.
        join_factory, Join, JoinFactory
    );
    typed_lookup!(
        /// Offset factory registered under `name`.
        offset_factory, Offset, OffsetFactory
    );
    typed_lookup!(
        /// Limit factory registered under `name`.
        limit_factory, Limit, LimitFactory
    );
    typed_lookup!(
        /// Let factory registered under `name`.
        let_factory, Let, LetFactory
    );
}

/// Assembles an [`OperatorRegistry`].
#[derive(Default)]
pub struct OperatorRegistryBuilder {
    factories: FxHashMap<Key, OperatorFactory>,
}

impl OperatorRegistryBuilder {
    /// Registers `factory` under its own kind and name.
    ///
    /// Returns `true` when an existing factory with the same key was replaced.
    pub fn register(&mut self, factory: OperatorFactory) -> bool {
        let kind = factory.kind();
        let name = factory.name().to_owned();
        self.insert(kind, name, factory)
    }

    /// Registers `factory` under an explicit key, which need not match the
    /// factory's own kind or name.
    ///
    /// Returns `true` when an existing factory with the same key was replaced.
    pub fn insert(&mut self, kind: OperatorKind, name: impl Into<String>, factory: OperatorFactory) -> bool {
        let name = name.into();
        debug!(kind = %kind, name = %name, "registry.register");
        self.factories.insert((kind, name), factory).is_some()
    }

    /// Registers the `default` implementation of every kind.
    pub fn with_defaults(mut self) -> Self {
        for factory in operators::default_factories() {
            self.register(factory);
        }
        self
    }

    pub fn build(self) -> OperatorRegistry {
        OperatorRegistry {
            factories: self.factories,
        }
    }
}
