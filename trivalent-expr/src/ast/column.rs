use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{SqlIdentifier, SqlType};

/// A reference to a column of a table (or of a table alias) in scope
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub table: SqlIdentifier,
    pub name: SqlIdentifier,
    pub ty: SqlType,
    /// Whether the schema allows this column to hold `NULL`
    pub nullable: bool,
}

impl Column {
    pub fn new<T, N>(table: T, name: N, ty: SqlType, nullable: bool) -> Self
    where
        T: Into<SqlIdentifier>,
        N: Into<SqlIdentifier>,
    {
        Self {
            table: table.into(),
            name: name.into(),
            ty,
            nullable,
        }
    }

    /// Returns true if `other` names the same column, regardless of the metadata attached to it
    pub fn refers_to(&self, other: &Column) -> bool {
        self.table == other.table && self.name == other.name
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}
