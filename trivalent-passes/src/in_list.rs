use trivalent_errors::RewriteResult;
use trivalent_expr::{
    Expr, ExprFactory, ExprRef, Literal, ParameterValue, ParameterValues, SqlType,
};

/// The constant values of an `IN` list, with `NULL`s removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInList {
    /// The non-null values, in their original order
    pub values: Vec<ExprRef>,
    /// Whether any `NULL` was removed
    pub had_null: bool,
    /// Whether any value came from a parameter, making the result specific to the parameter
    /// values it was computed from
    pub parameterized: bool,
}

impl NormalizedInList {
    /// Returns true if the list is exactly the one that was normalized
    pub fn is_unchanged(&self) -> bool {
        !self.had_null && !self.parameterized
    }

    fn push_literal<F: ExprFactory>(&mut self, value: &Literal, ty: SqlType, factory: &F) {
        if value.is_null() {
            self.had_null = true;
        } else {
            self.values.push(factory.literal(value.clone(), ty));
        }
    }
}

/// Strip `NULL`s from a list of `IN` values, expanding parameters to the values bound to them.
///
/// Returns `None` if the list contains anything other than literals and parameters. A parameter
/// bound to a sequence contributes each element of the sequence.
pub fn normalize_in_list<F: ExprFactory>(
    values: &[ExprRef],
    parameters: &ParameterValues,
    factory: &F,
) -> RewriteResult<Option<NormalizedInList>> {
    let mut normalized = NormalizedInList {
        values: Vec::with_capacity(values.len()),
        had_null: false,
        parameterized: false,
    };

    for value in values {
        match &**value {
            Expr::Literal {
                value: Literal::Null,
                ..
            } => normalized.had_null = true,
            Expr::Literal { .. } => normalized.values.push(value.clone()),
            Expr::Parameter { name, ty } => {
                normalized.parameterized = true;
                match parameters.get(name)? {
                    ParameterValue::Scalar(literal) => {
                        normalized.push_literal(literal, *ty, factory)
                    }
                    ParameterValue::List(literals) => {
                        for literal in literals {
                            normalized.push_literal(literal, *ty, factory);
                        }
                    }
                }
            }
            _ => return Ok(None),
        }
    }

    Ok(Some(normalized))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use trivalent_errors::RewriteError;
    use trivalent_expr::TypedExprFactory;

    use super::*;

    fn int(i: i64) -> ExprRef {
        TypedExprFactory.literal(Literal::Integer(i), SqlType::Int)
    }

    fn null() -> ExprRef {
        TypedExprFactory.null(SqlType::Int)
    }

    fn normalize(values: &[ExprRef], parameters: &ParameterValues) -> NormalizedInList {
        normalize_in_list(values, parameters, &TypedExprFactory)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn strips_nulls() {
        let result = normalize(&[int(1), int(2), null(), int(3)], &ParameterValues::new());
        assert_eq!(result.values, vec![int(1), int(2), int(3)]);
        assert!(result.had_null);
        assert!(!result.parameterized);
    }

    #[test]
    fn only_null() {
        let result = normalize(&[null()], &ParameterValues::new());
        assert!(result.values.is_empty());
        assert!(result.had_null);
    }

    #[test]
    fn empty() {
        let result = normalize(&[], &ParameterValues::new());
        assert!(result.values.is_empty());
        assert!(!result.had_null);
        assert!(result.is_unchanged());
    }

    #[test]
    fn literal_lists_keep_their_nodes() {
        let one = int(1);
        let result = normalize(&[one.clone()], &ParameterValues::new());
        assert!(ExprRef::ptr_eq(&result.values[0], &one));
        assert!(result.is_unchanged());
    }

    #[test]
    fn expands_parameters() {
        let f = TypedExprFactory;
        let parameters: ParameterValues = [
            ("scalar", ParameterValue::Scalar(Literal::Null)),
            (
                "list",
                ParameterValue::List(vec![Literal::Integer(4), Literal::Null, Literal::Integer(5)]),
            ),
        ]
        .into_iter()
        .collect();
        let result = normalize(
            &[
                int(1),
                f.parameter("scalar".into(), SqlType::Int),
                f.parameter("list".into(), SqlType::Int),
            ],
            &parameters,
        );
        assert_eq!(result.values, vec![int(1), int(4), int(5)]);
        assert!(result.had_null);
        assert!(result.parameterized);
    }

    #[test]
    fn non_constant_lists_are_not_normalized() {
        let column = TypedExprFactory.column(trivalent_expr::Column::new(
            "t",
            "a",
            SqlType::Int,
            true,
        ));
        let result =
            normalize_in_list(&[int(1), column], &ParameterValues::new(), &TypedExprFactory)
                .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn missing_parameter() {
        let err = normalize_in_list(
            &[TypedExprFactory.parameter("p".into(), SqlType::Int)],
            &ParameterValues::new(),
            &TypedExprFactory,
        )
        .unwrap_err();
        assert_eq!(err, RewriteError::UnknownParameter { name: "p".into() });
    }
}
