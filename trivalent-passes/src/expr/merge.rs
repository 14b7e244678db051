use itertools::Itertools;
use trivalent_errors::RewriteResult;
use trivalent_expr::{BinaryOperator, Expr, ExprFactory, ExprRef, InValue, UnaryOperator};

fn as_null_test(expr: &Expr) -> Option<(UnaryOperator, &ExprRef)> {
    match expr {
        Expr::UnaryOp { op, rhs } if op.is_null_test() => Some((*op, rhs)),
        _ => None,
    }
}

/// Merge `x IS [NOT] NULL` with `x IS [NOT] NULL` under `op` (`AND` or `OR`).
///
/// Two identical tests merge into one; opposite tests make the `OR` true and the `AND` false.
pub(super) fn merge_null_tests<F: ExprFactory>(
    factory: &F,
    lhs: &ExprRef,
    op: BinaryOperator,
    rhs: &ExprRef,
) -> Option<ExprRef> {
    let (left_test, left_operand) = as_null_test(lhs)?;
    let (right_test, right_operand) = as_null_test(rhs)?;
    if left_operand != right_operand {
        return None;
    }
    if left_test == right_test {
        Some(lhs.clone())
    } else {
        Some(factory.constant(op == BinaryOperator::Or))
    }
}

/// A test of an operand against a set of constants: `x = c`, `x <> c`, or `x [NOT] IN (c, ...)`
struct PointTest<'a> {
    operand: &'a ExprRef,
    values: Vec<ExprRef>,
    negated: bool,
}

fn is_non_null_literal(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal { value, .. } if !value.is_null())
}

fn as_point_test(expr: &Expr) -> Option<PointTest<'_>> {
    match expr {
        Expr::BinaryOp { lhs, op, rhs } if op.is_equality() => {
            let negated = *op == BinaryOperator::NotEqual;
            let (operand, value) = if is_non_null_literal(rhs) {
                (lhs, rhs)
            } else {
                (rhs, lhs)
            };
            if !is_non_null_literal(value) || matches!(**operand, Expr::Literal { .. }) {
                return None;
            }
            Some(PointTest {
                operand,
                values: vec![value.clone()],
                negated,
            })
        }
        Expr::In {
            lhs,
            rhs: InValue::List(values),
            negated,
        } if !values.is_empty() && values.iter().all(|v| is_non_null_literal(v)) => {
            Some(PointTest {
                operand: lhs,
                values: values.clone(),
                negated: *negated,
            })
        }
        _ => None,
    }
}

/// Merge point tests of the same operand: `x = 1 OR x = 2` becomes `x IN (1, 2)`, and
/// `x <> 1 AND x <> 2` becomes `x NOT IN (1, 2)`. Existing `IN` lists are extended.
pub(super) fn merge_point_tests<F: ExprFactory>(
    factory: &F,
    lhs: &ExprRef,
    op: BinaryOperator,
    rhs: &ExprRef,
) -> RewriteResult<Option<ExprRef>> {
    let (Some(left), Some(right)) = (as_point_test(lhs), as_point_test(rhs)) else {
        return Ok(None);
    };
    let negated = op == BinaryOperator::And;
    if left.negated != negated || right.negated != negated || left.operand != right.operand {
        return Ok(None);
    }
    let values = left.values.into_iter().chain(right.values).unique().collect();
    factory
        .in_list(left.operand.clone(), values, negated)
        .map(Some)
}

#[cfg(test)]
mod tests {
    use trivalent_expr::{Column, Literal, SqlType, TypedExprFactory};

    use super::*;

    fn x() -> ExprRef {
        TypedExprFactory.column(Column::new("t", "x", SqlType::Int, true))
    }

    fn int(i: i64) -> ExprRef {
        TypedExprFactory.literal(Literal::Integer(i), SqlType::Int)
    }

    #[test]
    fn merges_equalities_into_in() {
        let f = TypedExprFactory;
        let merged = merge_point_tests(
            &f,
            &f.equal(x(), int(1)).unwrap(),
            BinaryOperator::Or,
            &f.equal(int(2), x()).unwrap(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged.to_string(), "t.x IN (1, 2)");
    }

    #[test]
    fn merges_inequalities_into_existing_not_in() {
        let f = TypedExprFactory;
        let merged = merge_point_tests(
            &f,
            &f.in_list(x(), vec![int(1), int(2)], true).unwrap(),
            BinaryOperator::And,
            &f.not_equal(x(), int(2)).unwrap(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(merged.to_string(), "t.x NOT IN (1, 2)");
    }

    #[test]
    fn does_not_merge_mismatched_tests() {
        let f = TypedExprFactory;
        // x = 1 AND x = 2 is not a set test
        assert!(merge_point_tests(
            &f,
            &f.equal(x(), int(1)).unwrap(),
            BinaryOperator::And,
            &f.equal(x(), int(2)).unwrap(),
        )
        .unwrap()
        .is_none());
        // NULL is not a constant a column can be tested against
        assert!(merge_point_tests(
            &f,
            &f.equal(x(), int(1)).unwrap(),
            BinaryOperator::Or,
            &f.equal(x(), f.null(SqlType::Int)).unwrap(),
        )
        .unwrap()
        .is_none());
    }

    #[test]
    fn merges_null_tests() {
        let f = TypedExprFactory;
        let is_null = f.is_null(x()).unwrap();
        let is_not_null = f.is_not_null(x()).unwrap();
        assert_eq!(
            merge_null_tests(&f, &is_null, BinaryOperator::Or, &is_not_null),
            Some(f.constant(true))
        );
        assert_eq!(
            merge_null_tests(&f, &is_null, BinaryOperator::And, &is_not_null),
            Some(f.constant(false))
        );
        assert_eq!(
            merge_null_tests(&f, &is_null, BinaryOperator::And, &is_null),
            Some(is_null.clone())
        );
    }
}
