#![allow(missing_docs)]

//! Expression tree produced by the parser and consumed by the rewrite passes
//! and the semantic validator.
//!
//! The tree is a closed set of node kinds. Every node owns a
//! [`MetaContainer`]; nodes are never mutated in place, a pass that wants to
//! change something builds a new tree (see [`crate::query::rewrite`]).

use serde::{Deserialize, Serialize};

use crate::query::metadata::MetaContainer;
use crate::query::value::Value;

/// Whether an identifier is matched case sensitively.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum CaseSensitivity {
    /// Quoted identifiers.
    Sensitive,
    /// Regular identifiers.
    #[default]
    Insensitive,
}

/// Where a variable reference is resolved first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum ScopeQualifier {
    /// Global scope first, then locals.
    #[default]
    Unqualified,
    /// `@name`: local scope only.
    LexicalLocal,
}

/// `ALL` or `DISTINCT`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum SetQuantifier {
    #[default]
    All,
    Distinct,
}

/// Operators applied to an argument list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NAryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Not,
    And,
    Or,
    Like,
    Between,
    In,
    Concat,
    /// Function call; the first argument names the function.
    Call,
    Union,
    Intersect,
    Except,
}

impl NAryOp {
    /// Operator as written in queries, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NAryOp::Add => "+",
            NAryOp::Sub => "-",
            NAryOp::Mul => "*",
            NAryOp::Div => "/",
            NAryOp::Mod => "%",
            NAryOp::Eq => "=",
            NAryOp::Ne => "<>",
            NAryOp::Lt => "<",
            NAryOp::Lte => "<=",
            NAryOp::Gt => ">",
            NAryOp::Gte => ">=",
            NAryOp::Not => "not",
            NAryOp::And => "and",
            NAryOp::Or => "or",
            NAryOp::Like => "like",
            NAryOp::Between => "between",
            NAryOp::In => "in",
            NAryOp::Concat => "||",
            NAryOp::Call => "call",
            NAryOp::Union => "union",
            NAryOp::Intersect => "intersect",
            NAryOp::Except => "except",
        }
    }
}

/// Type operators that take a data type as their second operand.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TypedOp {
    Cast,
    CanCast,
    CanLosslessCast,
    Is,
}

/// Kind of collection built by a sequence constructor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SeqKind {
    List,
    Sexp,
    Bag,
}

/// SQL data types, with the parameters the grammar allows.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SqlDataType {
    Missing,
    Null,
    Boolean,
    SmallInt,
    Integer4,
    Integer8,
    Integer,
    Float { precision: Option<i64> },
    Real,
    DoublePrecision,
    Decimal { precision: Option<i64>, scale: Option<i64> },
    Numeric { precision: Option<i64>, scale: Option<i64> },
    Timestamp,
    Character { length: Option<i64> },
    CharacterVarying { length: Option<i64> },
    String,
    Symbol,
    Clob,
    Blob,
    Struct,
    Tuple,
    List,
    Sexp,
    Bag,
    Any,
    Date,
    Time { precision: Option<i64> },
    TimeWithTimeZone { precision: Option<i64> },
}

/// A data type as written in the query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    pub kind: SqlDataType,
    pub metas: MetaContainer,
}

/// A name introduced by the query (`AS x`, `AT i`, `LET ... AS y`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolicName {
    pub name: String,
    pub metas: MetaContainer,
}

/// A catalog identifier (table or index name) in DDL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub case: CaseSensitivity,
    pub metas: MetaContainer,
}

/// Node of the expression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Lit(Lit),
    Missing(Missing),
    Id(VarRef),
    NAry(NAry),
    CallAgg(CallAgg),
    Typed(Typed),
    Path(Path),
    SimpleCase(SimpleCase),
    SearchedCase(SearchedCase),
    Struct(Struct),
    Seq(Seq),
    Select(Box<Select>),
    Parameter(Parameter),
    Dml(Box<DataManipulation>),
    CreateTable(CreateTable),
    CreateIndex(CreateIndex),
    DropTable(DropTable),
    DropIndex(DropIndex),
    NullIf(NullIf),
    Coalesce(Coalesce),
    Exec(Exec),
    Date(DateLiteral),
    Time(TimeLiteral),
}

impl Expr {
    /// Metadata of the node itself (not its children).
    pub fn metas(&self) -> &MetaContainer {
        match self {
            Expr::Lit(node) => &node.metas,
            Expr::Missing(node) => &node.metas,
            Expr::Id(node) => &node.metas,
            Expr::NAry(node) => &node.metas,
            Expr::CallAgg(node) => &node.metas,
            Expr::Typed(node) => &node.metas,
            Expr::Path(node) => &node.metas,
            Expr::SimpleCase(node) => &node.metas,
            Expr::SearchedCase(node) => &node.metas,
            Expr::Struct(node) => &node.metas,
            Expr::Seq(node) => &node.metas,
            Expr::Select(node) => &node.metas,
            Expr::Parameter(node) => &node.metas,
            Expr::Dml(node) => &node.metas,
            Expr::CreateTable(node) => &node.metas,
            Expr::CreateIndex(node) => &node.metas,
            Expr::DropTable(node) => &node.metas,
            Expr::DropIndex(node) => &node.metas,
            Expr::NullIf(node) => &node.metas,
            Expr::Coalesce(node) => &node.metas,
            Expr::Exec(node) => &node.metas,
            Expr::Date(node) => &node.metas,
            Expr::Time(node) => &node.metas,
        }
    }

    /// Mutable access to the node's own metadata.
    pub fn metas_mut(&mut self) -> &mut MetaContainer {
        match self {
            Expr::Lit(node) => &mut node.metas,
            Expr::Missing(node) => &mut node.metas,
            Expr::Id(node) => &mut node.metas,
            Expr::NAry(node) => &mut node.metas,
            Expr::CallAgg(node) => &mut node.metas,
            Expr::Typed(node) => &mut node.metas,
            Expr::Path(node) => &mut node.metas,
            Expr::SimpleCase(node) => &mut node.metas,
            Expr::SearchedCase(node) => &mut node.metas,
            Expr::Struct(node) => &mut node.metas,
            Expr::Seq(node) => &mut node.metas,
            Expr::Select(node) => &mut node.metas,
            Expr::Parameter(node) => &mut node.metas,
            Expr::Dml(node) => &mut node.metas,
            Expr::CreateTable(node) => &mut node.metas,
            Expr::CreateIndex(node) => &mut node.metas,
            Expr::DropTable(node) => &mut node.metas,
            Expr::DropIndex(node) => &mut node.metas,
            Expr::NullIf(node) => &mut node.metas,
            Expr::Coalesce(node) => &mut node.metas,
            Expr::Exec(node) => &mut node.metas,
            Expr::Date(node) => &mut node.metas,
            Expr::Time(node) => &mut node.metas,
        }
    }

    /// Short name of the node kind, used in logs and tests.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Lit(_) => "lit",
            Expr::Missing(_) => "missing",
            Expr::Id(_) => "id",
            Expr::NAry(_) => "nary",
            Expr::CallAgg(_) => "call_agg",
            Expr::Typed(_) => "typed",
            Expr::Path(_) => "path",
            Expr::SimpleCase(_) => "simple_case",
            Expr::SearchedCase(_) => "searched_case",
            Expr::Struct(_) => "struct",
            Expr::Seq(_) => "seq",
            Expr::Select(_) => "select",
            Expr::Parameter(_) => "parameter",
            Expr::Dml(_) => "dml",
            Expr::CreateTable(_) => "create_table",
            Expr::CreateIndex(_) => "create_index",
            Expr::DropTable(_) => "drop_table",
            Expr::DropIndex(_) => "drop_index",
            Expr::NullIf(_) => "null_if",
            Expr::Coalesce(_) => "coalesce",
            Expr::Exec(_) => "exec",
            Expr::Date(_) => "date",
            Expr::Time(_) => "time",
        }
    }
}

/// Constant value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lit {
    pub value: Value,
    pub metas: MetaContainer,
}

/// The `MISSING` literal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Missing {
    pub metas: MetaContainer,
}

/// Reference to a variable in scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarRef {
    pub name: String,
    pub case: CaseSensitivity,
    pub qualifier: ScopeQualifier,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NAry {
    pub op: NAryOp,
    pub args: Vec<Expr>,
    pub metas: MetaContainer,
}

/// Aggregate function call such as `SUM(x)` or `COUNT(DISTINCT x)`.
///
/// `COUNT(*)` is represented as a call whose metas carry
/// [`crate::query::metadata::COUNT_STAR`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallAgg {
    /// Function name, as a variable reference.
    pub func: Box<Expr>,
    pub setq: SetQuantifier,
    pub arg: Box<Expr>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Typed {
    pub op: TypedOp,
    pub expr: Box<Expr>,
    pub data_type: DataType,
    pub metas: MetaContainer,
}

/// Navigation into a value: `a.b[0].*`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub root: Box<Expr>,
    pub components: Vec<PathComponent>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PathComponent {
    /// `.name` or `[expr]`.
    Expr {
        expr: Expr,
        case: CaseSensitivity,
        metas: MetaContainer,
    },
    /// `.*`
    Unpivot { metas: MetaContainer },
    /// `[*]`
    Wildcard { metas: MetaContainer },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleCase {
    pub value: Box<Expr>,
    pub whens: Vec<SimpleCaseWhen>,
    pub default: Option<Box<Expr>>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimpleCaseWhen {
    pub value: Expr,
    pub then: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchedCase {
    pub whens: Vec<SearchedCaseWhen>,
    pub default: Option<Box<Expr>>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchedCaseWhen {
    pub condition: Expr,
    pub then: Expr,
}

/// Struct constructor: `{ name: value, ... }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Struct {
    pub fields: Vec<StructField>,
    pub metas: MetaContainer,
}

/// One field of a struct constructor. The name is an arbitrary expression;
/// the validator rejects names that are known not to be text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructField {
    pub name: Expr,
    pub value: Expr,
}

/// List, s-expression or bag constructor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Seq {
    pub kind: SeqKind,
    pub values: Vec<Expr>,
    pub metas: MetaContainer,
}

/// Positional bind parameter (`?`), numbered from 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub position: usize,
    pub metas: MetaContainer,
}

/// `SELECT` query. Every clause except the projection is optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub setq: SetQuantifier,
    pub projection: SelectProjection,
    pub from: Option<FromSource>,
    pub from_let: Option<LetSource>,
    pub where_clause: Option<Expr>,
    pub group_by: Option<GroupBy>,
    pub having: Option<Expr>,
    pub order_by: Option<OrderBy>,
    pub offset: Option<Expr>,
    pub limit: Option<Expr>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SelectProjection {
    /// `SELECT a, b AS c, t.*`
    List {
        items: Vec<SelectListItem>,
        metas: MetaContainer,
    },
    /// `SELECT VALUE expr`
    Value { expr: Expr, metas: MetaContainer },
    /// `PIVOT value AT name`
    Pivot {
        name: Expr,
        value: Expr,
        metas: MetaContainer,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SelectListItem {
    /// `*`
    Star { metas: MetaContainer },
    /// `expr [AS name]`
    Expr {
        expr: Expr,
        as_name: Option<SymbolicName>,
    },
    /// `expr.*`
    ProjectAll { expr: Expr },
}

/// Names bound by a `FROM` source.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LetVariables {
    pub as_name: Option<SymbolicName>,
    pub at_name: Option<SymbolicName>,
    pub by_name: Option<SymbolicName>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum JoinOp {
    Inner,
    Left,
    Right,
    Outer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FromSource {
    Expr(FromSourceExpr),
    Join(FromSourceJoin),
    Unpivot(FromSourceUnpivot),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FromSourceExpr {
    pub expr: Expr,
    pub variables: LetVariables,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FromSourceJoin {
    pub op: JoinOp,
    pub left: Box<FromSource>,
    pub right: Box<FromSource>,
    pub condition: Expr,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FromSourceUnpivot {
    pub expr: Expr,
    pub variables: LetVariables,
    pub metas: MetaContainer,
}

/// `LET expr AS name, ...`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LetSource {
    pub bindings: Vec<LetBinding>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LetBinding {
    pub expr: Expr,
    pub name: SymbolicName,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum GroupingStrategy {
    #[default]
    Full,
    Partial,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    pub strategy: GroupingStrategy,
    pub items: Vec<GroupByItem>,
    pub group_as: Option<SymbolicName>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupByItem {
    pub expr: Expr,
    pub as_name: Option<SymbolicName>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OrderingSpec {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum NullsSpec {
    First,
    Last,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub sort_specs: Vec<SortSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub expr: Expr,
    pub ordering: Option<OrderingSpec>,
    pub nulls: Option<NullsSpec>,
}

/// `INSERT`/`UPDATE`/`DELETE`/`REMOVE` statement.
///
/// Operations run in list order; passes must not reorder them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataManipulation {
    pub ops: Vec<DmlOp>,
    pub from: Option<FromSource>,
    pub where_clause: Option<Expr>,
    pub returning: Option<Returning>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DmlOp {
    Insert(InsertOp),
    InsertValue(InsertValueOp),
    Assignment(AssignmentOp),
    Remove(RemoveOp),
    Delete(DeleteOp),
}

/// `INSERT INTO lvalue <values>`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertOp {
    pub lvalue: Expr,
    pub values: Expr,
    pub metas: MetaContainer,
}

/// `INSERT INTO lvalue VALUE value [AT position] [ON CONFLICT ...]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsertValueOp {
    pub lvalue: Expr,
    pub value: Expr,
    pub position: Option<Expr>,
    pub on_conflict: Option<OnConflict>,
    pub metas: MetaContainer,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ConflictAction {
    DoNothing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnConflict {
    pub condition: Expr,
    pub action: ConflictAction,
}

/// `SET lvalue = rvalue`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOp {
    pub lvalue: Expr,
    pub rvalue: Expr,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoveOp {
    pub lvalue: Expr,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteOp {
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Returning {
    pub elems: Vec<ReturningElem>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ReturningMapping {
    ModifiedNew,
    ModifiedOld,
    AllNew,
    AllOld,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturningElem {
    pub mapping: ReturningMapping,
    pub column: ReturningColumn,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ReturningColumn {
    /// `*`
    Wildcard,
    Expr(Expr),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    pub name: String,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateIndex {
    pub table: Identifier,
    pub keys: Vec<Expr>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub table: Identifier,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropIndex {
    pub table: Identifier,
    pub index: Identifier,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NullIf {
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coalesce {
    pub args: Vec<Expr>,
    pub metas: MetaContainer,
}

/// `EXEC procedure args...`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exec {
    pub procedure: SymbolicName,
    pub args: Vec<Expr>,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DateLiteral {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub metas: MetaContainer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeLiteral {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nano: u32,
    pub precision: u32,
    /// Offset from UTC in minutes for `TIME WITH TIME ZONE`.
    pub tz_minutes: Option<i32>,
    pub with_time_zone: bool,
    pub metas: MetaContainer,
}
