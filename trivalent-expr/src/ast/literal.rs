use std::fmt;

use derive_more::derive::From;
use serde::{Deserialize, Serialize};
use test_strategy::Arbitrary;

/// A constant value appearing in an expression tree, or bound to a parameter
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, From, Arbitrary)]
pub enum Literal {
    /// The SQL `NULL` marker
    #[from(ignore)]
    Null,
    Boolean(bool),
    Integer(i64),
    String(String),
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_owned())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}
