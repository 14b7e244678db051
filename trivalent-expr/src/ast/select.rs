use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use triomphe::Arc;

use crate::ast::*;

/// A shared pointer to a full query specification
pub type QueryRef = Arc<SelectSpecification>;

/// A single projected expression, with an optional alias
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinitionExpr {
    pub expr: ExprRef,
    pub alias: Option<SqlIdentifier>,
}

impl fmt::Display for FieldDefinitionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: ExprRef,
    pub order_type: OrderType,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_type {
            OrderType::Asc => write!(f, "{} ASC", self.field),
            OrderType::Desc => write!(f, "{} DESC", self.field),
        }
    }
}

/// The source of rows named in a `FROM` clause or on the right-hand side of a join
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableExprInner {
    Table(SqlIdentifier),
    Subquery(Subquery),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableExpr {
    pub inner: TableExprInner,
    pub alias: Option<SqlIdentifier>,
}

impl TableExpr {
    pub fn table<T: Into<SqlIdentifier>>(name: T) -> Self {
        Self {
            inner: TableExprInner::Table(name.into()),
            alias: None,
        }
    }
}

impl fmt::Display for TableExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            TableExprInner::Table(name) => write!(f, "{name}")?,
            TableExprInner::Subquery(subquery) => write!(f, "({subquery})")?,
        }
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// A join against the rows produced so far
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinClause {
    Inner { right: TableExpr, on: ExprRef },
    Left { right: TableExpr, on: ExprRef },
    Cross { right: TableExpr },
    CrossApply { right: TableExpr },
    OuterApply { right: TableExpr },
}

impl JoinClause {
    pub fn right(&self) -> &TableExpr {
        match self {
            JoinClause::Inner { right, .. }
            | JoinClause::Left { right, .. }
            | JoinClause::Cross { right }
            | JoinClause::CrossApply { right }
            | JoinClause::OuterApply { right } => right,
        }
    }

    /// Returns the join predicate, for the join kinds that have one
    pub fn on(&self) -> Option<&ExprRef> {
        match self {
            JoinClause::Inner { on, .. } | JoinClause::Left { on, .. } => Some(on),
            JoinClause::Cross { .. } | JoinClause::CrossApply { .. } | JoinClause::OuterApply { .. } => {
                None
            }
        }
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinClause::Inner { right, on } => write!(f, "INNER JOIN {right} ON {on}"),
            JoinClause::Left { right, on } => write!(f, "LEFT JOIN {right} ON {on}"),
            JoinClause::Cross { right } => write!(f, "CROSS JOIN {right}"),
            JoinClause::CrossApply { right } => write!(f, "CROSS APPLY {right}"),
            JoinClause::OuterApply { right } => write!(f, "OUTER APPLY {right}"),
        }
    }
}

/// A single `SELECT` query
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub distinct: bool,
    pub fields: Vec<FieldDefinitionExpr>,
    pub tables: Vec<TableExpr>,
    pub join: Vec<JoinClause>,
    pub where_clause: Option<ExprRef>,
    pub group_by: Vec<ExprRef>,
    pub having: Option<ExprRef>,
    pub order: Vec<OrderBy>,
    pub limit: Option<ExprRef>,
    pub offset: Option<ExprRef>,
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        if self.fields.is_empty() {
            f.write_str("*")?;
        } else {
            write!(f, "{}", self.fields.iter().join(", "))?;
        }
        if !self.tables.is_empty() {
            write!(f, " FROM {}", self.tables.iter().join(", "))?;
        }
        for join in &self.join {
            write!(f, " {join}")?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {where_clause}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", self.group_by.iter().join(", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if !self.order.is_empty() {
            write!(f, " ORDER BY {}", self.order.iter().join(", "))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOperator::Union => f.write_str("UNION"),
            SetOperator::Intersect => f.write_str("INTERSECT"),
            SetOperator::Except => f.write_str("EXCEPT"),
        }
    }
}

/// Two query specifications combined with a set operator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOperation {
    pub operator: SetOperator,
    /// `true` for `UNION ALL` and friends, which keep duplicate rows
    pub all: bool,
    pub lhs: QueryRef,
    pub rhs: QueryRef,
}

/// A complete query: either a single `SELECT`, or a set operation over two queries
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectSpecification {
    Simple(SelectStatement),
    SetOperation(SetOperation),
}

impl fmt::Display for SelectSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectSpecification::Simple(select) => write!(f, "{select}"),
            SelectSpecification::SetOperation(SetOperation {
                operator,
                all,
                lhs,
                rhs,
            }) => {
                write!(f, "({lhs}) {operator} ")?;
                if *all {
                    f.write_str("ALL ")?;
                }
                write!(f, "({rhs})")
            }
        }
    }
}
