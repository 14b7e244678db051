use trivalent_errors::RewriteResult;
use trivalent_expr::{
    BinaryOperator, Column, Expr, ExprFactory, ExprRef, InValue, Literal, UnaryOperator,
};

use super::NullSemanticsRewriter;

/// Collect the columns that must be non-null whenever `expr` is not false: those tested
/// `IS NOT NULL` in a top-level conjunct.
pub(super) fn columns_proven_by_conjuncts(expr: &Expr, out: &mut Vec<Column>) {
    match expr {
        Expr::UnaryOp {
            op: UnaryOperator::IsNotNull,
            rhs,
        } => out.extend(rhs.as_column().cloned()),
        Expr::BinaryOp {
            lhs,
            op: BinaryOperator::And,
            rhs,
        } => {
            columns_proven_by_conjuncts(lhs, out);
            columns_proven_by_conjuncts(rhs, out);
        }
        _ => {}
    }
}

/// Collect the columns that must be non-null whenever `expr` is not true: those tested `IS NULL`
/// in a top-level disjunct.
pub(super) fn columns_proven_by_disjuncts(expr: &Expr, out: &mut Vec<Column>) {
    match expr {
        Expr::UnaryOp {
            op: UnaryOperator::IsNull,
            rhs,
        } => out.extend(rhs.as_column().cloned()),
        Expr::BinaryOp {
            lhs,
            op: BinaryOperator::Or,
            rhs,
        } => {
            columns_proven_by_disjuncts(lhs, out);
            columns_proven_by_disjuncts(rhs, out);
        }
        _ => {}
    }
}

impl<F: ExprFactory> NullSemanticsRewriter<'_, F> {
    /// A column is nullable if the schema says so and nothing in scope has ruled it out
    pub(super) fn column_nullable(&self, column: &Column) -> bool {
        column.nullable
            && !self
                .non_nullable_columns
                .iter()
                .any(|proven| proven.refers_to(column))
    }

    /// Run `f` with `columns` additionally known to be non-null, forgetting them again afterwards
    /// whether or not `f` succeeds
    pub(super) fn with_non_nullable_columns<T>(
        &mut self,
        columns: Vec<Column>,
        f: impl FnOnce(&mut Self) -> RewriteResult<T>,
    ) -> RewriteResult<T> {
        let mark = self.non_nullable_columns.len();
        self.non_nullable_columns.extend(columns);
        let result = f(self);
        self.non_nullable_columns.truncate(mark);
        result
    }

    /// Compute whether an already-rewritten expression may evaluate to `NULL`
    pub(super) fn is_nullable(&self, expr: &Expr) -> RewriteResult<bool> {
        Ok(match expr {
            Expr::Literal { value, .. } => value.is_null(),
            Expr::Parameter { name, .. } => self.parameters.get(name)?.is_null(),
            Expr::Column(column) => self.column_nullable(column),
            Expr::UnaryOp { op, rhs } => match op {
                UnaryOperator::IsNull | UnaryOperator::IsNotNull => false,
                UnaryOperator::Not | UnaryOperator::Negate | UnaryOperator::Convert(_) => {
                    self.is_nullable(rhs)?
                }
            },
            Expr::BinaryOp { op, .. } if op.is_equality() && !self.use_relational_nulls => false,
            Expr::BinaryOp {
                lhs,
                op: BinaryOperator::Coalesce,
                rhs,
            } => self.is_nullable(lhs)? && self.is_nullable(rhs)?,
            Expr::BinaryOp { lhs, rhs, .. } => self.is_nullable(lhs)? || self.is_nullable(rhs)?,
            Expr::Call { .. } | Expr::NestedSelect { .. } => true,
            Expr::Exists { .. } => false,
            Expr::CaseWhen {
                branches,
                else_expr,
                ..
            } => match else_expr {
                None => true,
                Some(else_expr) => {
                    self.is_nullable(else_expr)?
                        || self.any_nullable(branches.iter().map(|b| &b.body))?
                }
            },
            Expr::In { rhs: InValue::Subquery(_), .. } => true,
            Expr::In {
                lhs,
                rhs: InValue::List(values),
                ..
            } => self.is_nullable(lhs)? || self.any_nullable(values)?,
        })
    }

    fn any_nullable<'e>(
        &self,
        exprs: impl IntoIterator<Item = &'e ExprRef>,
    ) -> RewriteResult<bool> {
        for expr in exprs {
            if self.is_nullable(expr)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rewrite `operand IS [NOT] NULL`, where `operand` has already been rewritten, into the
    /// simplest expression with the same result under two-valued comparison semantics.
    ///
    /// If no simplification applies and `original` is the unary node this is rewriting, the
    /// original node is reused when its operand is unchanged.
    pub(super) fn process_null_not_null(
        &self,
        original: Option<&ExprRef>,
        op: UnaryOperator,
        operand: &ExprRef,
        operand_nullable: bool,
    ) -> RewriteResult<ExprRef> {
        let is_null = op == UnaryOperator::IsNull;
        if !operand_nullable {
            return Ok(self.factory.constant(!is_null));
        }

        match &**operand {
            Expr::Literal {
                value: Literal::Null,
                ..
            } => Ok(self.factory.constant(is_null)),
            Expr::UnaryOp {
                op: UnaryOperator::Not | UnaryOperator::Negate | UnaryOperator::Convert(_),
                rhs,
            } => self.process_null_not_null(None, op, rhs, self.is_nullable(rhs)?),
            // Equality never yields NULL under two-valued semantics
            Expr::BinaryOp { op: bop, .. } if bop.is_equality() => {
                Ok(self.factory.constant(!is_null))
            }
            Expr::BinaryOp { op: bop, .. } if bop.is_logical() => {
                self.null_test(original, op, operand)
            }
            Expr::BinaryOp {
                lhs,
                op: BinaryOperator::Coalesce,
                rhs,
            } => {
                // COALESCE(a, b) is NULL only when both are
                let left = self.process_null_not_null(None, op, lhs, self.is_nullable(lhs)?)?;
                let right = self.process_null_not_null(None, op, rhs, self.is_nullable(rhs)?)?;
                if is_null {
                    self.factory.and(left, right)
                } else {
                    self.factory.or(left, right)
                }
            }
            Expr::BinaryOp { lhs, rhs, .. } => {
                // Any other operator is NULL when either operand is
                let left_nullable = self.is_nullable(lhs)?;
                let right_nullable = self.is_nullable(rhs)?;
                match (left_nullable, right_nullable) {
                    (true, true) => {
                        let left = self.process_null_not_null(None, op, lhs, true)?;
                        let right = self.process_null_not_null(None, op, rhs, true)?;
                        if is_null {
                            self.factory.or(left, right)
                        } else {
                            self.factory.and(left, right)
                        }
                    }
                    (true, false) => self.process_null_not_null(None, op, lhs, true),
                    (false, true) => self.process_null_not_null(None, op, rhs, true),
                    (false, false) => Ok(self.factory.constant(!is_null)),
                }
            }
            Expr::Parameter { .. }
            | Expr::Column(_)
            | Expr::UnaryOp { .. }
            | Expr::Call { .. }
            | Expr::CaseWhen { .. }
            | Expr::In { .. }
            | Expr::Exists { .. }
            | Expr::NestedSelect { .. }
            | Expr::Literal { .. } => self.null_test(original, op, operand),
        }
    }

    fn null_test(
        &self,
        original: Option<&ExprRef>,
        op: UnaryOperator,
        operand: &ExprRef,
    ) -> RewriteResult<ExprRef> {
        match original {
            Some(original) => self.rebuild_unary(original, op, operand.clone()),
            None => self.factory.unary(op, operand.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use trivalent_expr::{ParameterValues, SqlType, TypedExprFactory};

    use super::*;
    use crate::RewriteOptions;

    fn column(name: &str, nullable: bool) -> ExprRef {
        TypedExprFactory.column(Column::new("t", name, SqlType::Int, nullable))
    }

    fn process(op: UnaryOperator, operand: ExprRef) -> String {
        let parameters = ParameterValues::new();
        let rewriter =
            NullSemanticsRewriter::new(&TypedExprFactory, &parameters, RewriteOptions::default());
        let nullable = rewriter.is_nullable(&operand).unwrap();
        rewriter
            .process_null_not_null(None, op, &operand, nullable)
            .unwrap()
            .to_string()
    }

    #[test]
    fn non_nullable_operand_is_constant() {
        assert_eq!(process(UnaryOperator::IsNull, column("b", false)), "FALSE");
        assert_eq!(process(UnaryOperator::IsNotNull, column("b", false)), "TRUE");
    }

    #[test]
    fn null_test_looks_through_negation() {
        let f = TypedExprFactory;
        let negated = f.unary(UnaryOperator::Negate, column("a", true)).unwrap();
        assert_eq!(process(UnaryOperator::IsNull, negated), "t.a IS NULL");
    }

    #[test]
    fn null_test_distributes_over_arithmetic() {
        let f = TypedExprFactory;
        let sum = f
            .binary(column("a", true), BinaryOperator::Add, column("c", true))
            .unwrap();
        assert_eq!(
            process(UnaryOperator::IsNull, sum.clone()),
            "(t.a IS NULL) OR (t.c IS NULL)"
        );
        assert_eq!(
            process(UnaryOperator::IsNotNull, sum),
            "(t.a IS NOT NULL) AND (t.c IS NOT NULL)"
        );

        let half = f
            .binary(column("a", true), BinaryOperator::Add, column("b", false))
            .unwrap();
        assert_eq!(process(UnaryOperator::IsNull, half), "t.a IS NULL");
    }

    #[test]
    fn null_test_of_coalesce_flips_connective() {
        let f = TypedExprFactory;
        let coalesce = f
            .binary(column("a", true), BinaryOperator::Coalesce, column("c", true))
            .unwrap();
        assert_eq!(
            process(UnaryOperator::IsNull, coalesce.clone()),
            "(t.a IS NULL) AND (t.c IS NULL)"
        );
        assert_eq!(
            process(UnaryOperator::IsNotNull, coalesce),
            "(t.a IS NOT NULL) OR (t.c IS NOT NULL)"
        );
    }

    #[test]
    fn null_test_of_equality_is_constant() {
        let f = TypedExprFactory;
        let eq = f.equal(column("a", true), column("c", true)).unwrap();
        assert_eq!(process(UnaryOperator::IsNull, eq), "FALSE");
    }

    #[test]
    fn null_test_of_logical_operator_is_kept() {
        let f = TypedExprFactory;
        let bool_column =
            |name| f.column(Column::new("t", name, SqlType::Bool, true));
        let and = f.and(bool_column("p"), bool_column("r")).unwrap();
        assert_eq!(process(UnaryOperator::IsNull, and), "(t.p AND t.r) IS NULL");
    }

    #[test]
    fn proven_columns() {
        let f = TypedExprFactory;
        let (a, c) = (column("a", true), column("c", true));
        let conjunction = f
            .and(
                f.is_not_null(a.clone()).unwrap(),
                f.and(f.constant(true), f.is_not_null(c.clone()).unwrap())
                    .unwrap(),
            )
            .unwrap();
        let mut proven = vec![];
        columns_proven_by_conjuncts(&conjunction, &mut proven);
        assert_eq!(proven.len(), 2);

        let disjunction = f
            .or(f.is_null(a).unwrap(), f.is_not_null(c).unwrap())
            .unwrap();
        let mut proven = vec![];
        columns_proven_by_disjuncts(&disjunction, &mut proven);
        assert_eq!(proven, vec![Column::new("t", "a", SqlType::Int, true)]);
    }
}
