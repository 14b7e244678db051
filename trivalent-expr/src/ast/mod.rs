mod column;
mod expression;
mod literal;
mod select;
mod sql_type;

use std::fmt;

use derive_more::derive::From;
use proptest::prelude::{any, Arbitrary, BoxedStrategy, Strategy};
use serde::{Deserialize, Serialize};

pub use self::column::Column;
pub use self::expression::{
    BinaryOperator, CaseWhenBranch, Expr, ExprRef, InValue, Subquery, UnaryOperator,
};
pub use self::literal::Literal;
pub use self::select::{
    FieldDefinitionExpr, JoinClause, OrderBy, OrderType, QueryRef, SelectSpecification,
    SelectStatement, SetOperation, SetOperator, TableExpr, TableExprInner,
};
pub use self::sql_type::SqlType;

/// The name of a table, column, alias, function or parameter
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From)]
#[serde(transparent)]
pub struct SqlIdentifier(String);

impl SqlIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SqlIdentifier {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for SqlIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqlIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.0.is_empty()
        {
            f.write_str(&self.0)
        } else {
            write!(f, "\"{}\"", self.0.replace('"', "\"\""))
        }
    }
}

impl Arbitrary for SqlIdentifier {
    type Parameters = ();
    type Strategy = BoxedStrategy<SqlIdentifier>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        any::<String>().prop_map(SqlIdentifier).boxed()
    }
}
