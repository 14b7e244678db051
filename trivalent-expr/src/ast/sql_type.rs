use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use test_strategy::Arbitrary;

/// The static type of an expression, as far as the rewriting passes need to know it
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    Arbitrary,
)]
pub enum SqlType {
    #[display("BOOL")]
    Bool,
    #[display("INT")]
    Int,
    #[display("DOUBLE")]
    Double,
    #[display("TEXT")]
    Text,
    #[display("TIMESTAMP")]
    Timestamp,
    /// The type of an untyped `NULL` literal, or of a parameter whose type was never resolved.
    /// Compatible with every other type.
    #[display("UNKNOWN")]
    Unknown,
}

impl SqlType {
    pub fn is_numeric(self) -> bool {
        matches!(self, SqlType::Int | SqlType::Double)
    }

    /// Returns true if a value of this type may appear in a boolean position
    pub fn is_boolean(self) -> bool {
        matches!(self, SqlType::Bool | SqlType::Unknown)
    }

    /// Returns true if values of the two types can be compared with one another
    pub fn is_compatible_with(self, other: SqlType) -> bool {
        self == other
            || self == SqlType::Unknown
            || other == SqlType::Unknown
            || (self.is_numeric() && other.is_numeric())
    }

    /// Returns the wider of two compatible types, preferring anything known over
    /// [`SqlType::Unknown`]
    pub fn unify(self, other: SqlType) -> SqlType {
        match (self, other) {
            (SqlType::Unknown, t) | (t, SqlType::Unknown) => t,
            (SqlType::Double, SqlType::Int) | (SqlType::Int, SqlType::Double) => SqlType::Double,
            (t, _) => t,
        }
    }
}
