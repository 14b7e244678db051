use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use trivalent_errors::{RewriteError, RewriteResult};

use crate::ast::{Literal, SqlIdentifier};

/// The runtime value bound to a parameter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterValue {
    Scalar(Literal),
    /// A sequence of values, which expands in place when the parameter appears in an `IN` list
    List(Vec<Literal>),
}

impl ParameterValue {
    /// Returns true if the value is the scalar `NULL`. A sequence is never null, even if it is
    /// empty or contains nulls.
    pub fn is_null(&self) -> bool {
        matches!(self, ParameterValue::Scalar(Literal::Null))
    }
}

impl From<Literal> for ParameterValue {
    fn from(value: Literal) -> Self {
        ParameterValue::Scalar(value)
    }
}

impl From<Vec<Literal>> for ParameterValue {
    fn from(values: Vec<Literal>) -> Self {
        ParameterValue::List(values)
    }
}

/// The values bound to every parameter of a query, keyed by parameter name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValues {
    values: HashMap<SqlIdentifier, ParameterValue>,
}

impl ParameterValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N, V>(&mut self, name: N, value: V) -> Option<ParameterValue>
    where
        N: Into<SqlIdentifier>,
        V: Into<ParameterValue>,
    {
        self.values.insert(name.into(), value.into())
    }

    /// Look up the value bound to `name`, returning [`RewriteError::UnknownParameter`] if there is
    /// none
    pub fn get(&self, name: &SqlIdentifier) -> RewriteResult<&ParameterValue> {
        self.values
            .get(name)
            .ok_or_else(|| RewriteError::UnknownParameter {
                name: name.to_string(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl<N, V> FromIterator<(N, V)> for ParameterValues
where
    N: Into<SqlIdentifier>,
    V: Into<ParameterValue>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}
