use trivalent_errors::RewriteResult;
use trivalent_expr::{BinaryOperator, Expr, ExprFactory, ExprRef, UnaryOperator};

use super::NullSemanticsRewriter;

/// If `expr` is `NOT x`, returns `(x, true)`, otherwise `(expr, false)`
fn strip_not(expr: &ExprRef) -> (ExprRef, bool) {
    match expr.as_not() {
        Some(inner) => (inner.clone(), true),
        None => (expr.clone(), false),
    }
}

impl<F: ExprFactory> NullSemanticsRewriter<'_, F> {
    /// Returns true if `expr` is a `NULL` literal, or a parameter bound to `NULL`
    fn is_null_operand(&self, expr: &Expr) -> RewriteResult<bool> {
        Ok(match expr {
            Expr::Literal { value, .. } => value.is_null(),
            Expr::Parameter { name, .. } => self.parameters.get(name)?.is_null(),
            _ => false,
        })
    }

    /// Rewrite `x = NULL` to `x IS NULL` and `x <> NULL` to `x IS NOT NULL`, in either operand
    /// order and in both modes. Returns `None` if neither operand is `NULL`.
    pub(super) fn null_comparison(
        &mut self,
        left: &ExprRef,
        left_nullable: bool,
        op: BinaryOperator,
        right: &ExprRef,
        right_nullable: bool,
    ) -> RewriteResult<Option<ExprRef>> {
        let left_null = self.is_null_operand(left)?;
        if !left_null && !self.is_null_operand(right)? {
            return Ok(None);
        }
        if matches!(**left, Expr::Parameter { .. }) || matches!(**right, Expr::Parameter { .. }) {
            self.do_not_cache("compared against NULL parameter");
        }
        let test = if op == BinaryOperator::Equal {
            UnaryOperator::IsNull
        } else {
            UnaryOperator::IsNotNull
        };
        let (other, other_nullable) = if left_null {
            (right, right_nullable)
        } else {
            (left, left_nullable)
        };
        let result = if self.use_relational_nulls {
            self.factory.unary(test, other.clone())?
        } else {
            self.process_null_not_null(None, test, other, other_nullable)?
        };
        Ok(Some(result))
    }

    /// `operand IS NULL` for a nullable operand, distributed over compound operands
    fn guard_null(&self, operand: &ExprRef) -> RewriteResult<ExprRef> {
        self.process_null_not_null(None, UnaryOperator::IsNull, operand, true)
    }

    /// `operand IS NOT NULL` for a nullable operand, distributed over compound operands
    pub(super) fn guard_not_null(&self, operand: &ExprRef) -> RewriteResult<ExprRef> {
        self.process_null_not_null(None, UnaryOperator::IsNotNull, operand, true)
    }

    /// Rewrite `left op right`, for `op` one of `=` and `<>`, given already-rewritten operands
    /// and their nullability.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn optimize_comparison(
        &mut self,
        original: &ExprRef,
        left: ExprRef,
        left_nullable: bool,
        op: BinaryOperator,
        right: ExprRef,
        right_nullable: bool,
        allow_optimized: bool,
    ) -> RewriteResult<(ExprRef, bool)> {
        if let Some(test) =
            self.null_comparison(&left, left_nullable, op, &right, right_nullable)?
        {
            return Ok((test, false));
        }

        if self.use_relational_nulls {
            return Ok((
                self.rebuild_binary(original, left, op, right)?,
                left_nullable || right_nullable,
            ));
        }

        // `a = TRUE` is `a`, `a = FALSE` is `NOT a`, and conversely for `<>`
        let boolean_literal = match (left.as_bool_literal(), right.as_bool_literal()) {
            (Some(value), _) if !right_nullable => Some((value, &right)),
            (_, Some(value)) if !left_nullable => Some((value, &left)),
            _ => None,
        };
        if let Some((value, other)) = boolean_literal {
            let result = if (op == BinaryOperator::Equal) == value {
                other.clone()
            } else {
                self.factory.not(other.clone())?
            };
            return Ok((result, false));
        }

        if !left_nullable && !right_nullable && left == right {
            return Ok((self.factory.constant(op == BinaryOperator::Equal), false));
        }

        let (left_operand, left_negated) = strip_not(&left);
        let (right_operand, right_negated) = strip_not(&right);
        let negated = left_negated != right_negated;

        if !left_nullable && !right_nullable {
            if left_negated || right_negated {
                let op = if negated { flip(op) } else { op };
                return Ok((
                    self.factory.binary(left_operand, op, right_operand)?,
                    false,
                ));
            }
            return Ok((self.rebuild_binary(original, left, op, right)?, false));
        }

        let f = self.factory;
        if allow_optimized && op == BinaryOperator::Equal && !negated {
            // NULL is as good as false here, so only the case where both sides are NULL needs to
            // be spelled out
            let compare = if left_negated {
                f.equal(left_operand.clone(), right_operand.clone())?
            } else {
                self.rebuild_binary(original, left, op, right)?
            };
            if left_nullable && right_nullable {
                let both_null =
                    f.and(self.guard_null(&left_operand)?, self.guard_null(&right_operand)?)?;
                return Ok((f.or(compare, both_null)?, true));
            }
            return Ok((compare, true));
        }

        let inner_op = if negated { flip(op) } else { op };
        let compare = f.binary(left_operand.clone(), inner_op, right_operand.clone())?;

        let result = match (op, left_nullable && right_nullable) {
            // (a = b AND a IS NOT NULL AND b IS NOT NULL) OR (a IS NULL AND b IS NULL)
            (BinaryOperator::Equal, true) => f.or(
                f.and(
                    f.and(compare, self.guard_not_null(&left_operand)?)?,
                    self.guard_not_null(&right_operand)?,
                )?,
                f.and(self.guard_null(&left_operand)?, self.guard_null(&right_operand)?)?,
            )?,
            // (a <> b OR a IS NULL OR b IS NULL) AND (a IS NOT NULL OR b IS NOT NULL)
            (_, true) => f.and(
                f.or(
                    f.or(compare, self.guard_null(&left_operand)?)?,
                    self.guard_null(&right_operand)?,
                )?,
                f.or(
                    self.guard_not_null(&left_operand)?,
                    self.guard_not_null(&right_operand)?,
                )?,
            )?,
            (op, false) => {
                let nullable = if left_nullable {
                    left_operand
                } else {
                    right_operand
                };
                if op == BinaryOperator::Equal {
                    // a = b AND a IS NOT NULL
                    f.and(compare, self.guard_not_null(&nullable)?)?
                } else {
                    // a <> b OR a IS NULL
                    f.or(compare, self.guard_null(&nullable)?)?
                }
            }
        };
        Ok((result, false))
    }
}

fn flip(op: BinaryOperator) -> BinaryOperator {
    match op {
        BinaryOperator::Equal => BinaryOperator::NotEqual,
        _ => BinaryOperator::Equal,
    }
}
