use std::fmt::Display;

use triomphe::Arc;
use trivalent_errors::{invariant, unsupported, RewriteError, RewriteResult};

use crate::ast::*;

/// Builds new expression nodes on behalf of the rewriting passes.
///
/// Leaves can never be ill-typed, so their constructors are infallible. Compound nodes go through
/// the fallible constructors, which give an implementation the chance to validate operand types
/// and compute result types.
pub trait ExprFactory {
    fn unary(&self, op: UnaryOperator, rhs: ExprRef) -> RewriteResult<ExprRef>;

    fn binary(&self, lhs: ExprRef, op: BinaryOperator, rhs: ExprRef) -> RewriteResult<ExprRef>;

    /// Build `lhs [NOT] IN (values)`. `values` must not be empty.
    fn in_list(&self, lhs: ExprRef, values: Vec<ExprRef>, negated: bool)
        -> RewriteResult<ExprRef>;

    fn in_subquery(&self, lhs: ExprRef, subquery: Subquery, negated: bool)
        -> RewriteResult<ExprRef>;

    fn case_when(
        &self,
        operand: Option<ExprRef>,
        branches: Vec<CaseWhenBranch>,
        else_expr: Option<ExprRef>,
    ) -> RewriteResult<ExprRef>;

    fn call(
        &self,
        receiver: Option<ExprRef>,
        name: SqlIdentifier,
        arguments: Vec<ExprRef>,
        ty: SqlType,
    ) -> RewriteResult<ExprRef>;

    fn literal(&self, value: Literal, ty: SqlType) -> ExprRef {
        Arc::new(Expr::Literal { value, ty })
    }

    fn column(&self, column: Column) -> ExprRef {
        Arc::new(Expr::Column(column))
    }

    fn parameter(&self, name: SqlIdentifier, ty: SqlType) -> ExprRef {
        Arc::new(Expr::Parameter { name, ty })
    }

    fn exists(&self, subquery: Subquery, negated: bool) -> ExprRef {
        Arc::new(Expr::Exists { subquery, negated })
    }

    fn nested_select(&self, subquery: Subquery, ty: SqlType) -> ExprRef {
        Arc::new(Expr::NestedSelect { subquery, ty })
    }

    /// Build the boolean literal `TRUE` or `FALSE`
    fn constant(&self, value: bool) -> ExprRef {
        self.literal(Literal::Boolean(value), SqlType::Bool)
    }

    fn null(&self, ty: SqlType) -> ExprRef {
        self.literal(Literal::Null, ty)
    }

    fn not(&self, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.unary(UnaryOperator::Not, rhs)
    }

    fn is_null(&self, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.unary(UnaryOperator::IsNull, rhs)
    }

    fn is_not_null(&self, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.unary(UnaryOperator::IsNotNull, rhs)
    }

    fn and(&self, lhs: ExprRef, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.binary(lhs, BinaryOperator::And, rhs)
    }

    fn or(&self, lhs: ExprRef, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.binary(lhs, BinaryOperator::Or, rhs)
    }

    fn equal(&self, lhs: ExprRef, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.binary(lhs, BinaryOperator::Equal, rhs)
    }

    fn not_equal(&self, lhs: ExprRef, rhs: ExprRef) -> RewriteResult<ExprRef> {
        self.binary(lhs, BinaryOperator::NotEqual, rhs)
    }
}

/// The default [`ExprFactory`], which rejects operators applied to operands of incompatible types
#[derive(Debug, Default, Clone, Copy)]
pub struct TypedExprFactory;

fn type_mismatch(op: impl Display, lhs: SqlType, rhs: Option<SqlType>) -> RewriteError {
    RewriteError::TypeMismatch {
        op: op.to_string(),
        lhs: lhs.to_string(),
        rhs: rhs.map_or_else(|| "-".to_owned(), |t| t.to_string()),
    }
}

impl ExprFactory for TypedExprFactory {
    fn unary(&self, op: UnaryOperator, rhs: ExprRef) -> RewriteResult<ExprRef> {
        let ty = rhs.ty();
        if op == UnaryOperator::Convert(SqlType::Unknown) {
            unsupported!("CAST({rhs} AS {})", SqlType::Unknown);
        }
        let ok = match op {
            UnaryOperator::Not => ty.is_boolean(),
            UnaryOperator::Negate => ty.is_numeric() || ty == SqlType::Unknown,
            UnaryOperator::IsNull | UnaryOperator::IsNotNull | UnaryOperator::Convert(_) => true,
        };
        if !ok {
            return Err(type_mismatch(format!("{op:?}"), ty, None));
        }
        Ok(Arc::new(Expr::UnaryOp { op, rhs }))
    }

    fn binary(&self, lhs: ExprRef, op: BinaryOperator, rhs: ExprRef) -> RewriteResult<ExprRef> {
        let (lty, rty) = (lhs.ty(), rhs.ty());
        let ok = if op.is_logical() {
            lty.is_boolean() && rty.is_boolean()
        } else if op.is_arithmetic() {
            (lty.is_numeric() || lty == SqlType::Unknown)
                && (rty.is_numeric() || rty == SqlType::Unknown)
        } else {
            lty.is_compatible_with(rty)
        };
        if !ok {
            return Err(type_mismatch(op, lty, Some(rty)));
        }
        Ok(Arc::new(Expr::BinaryOp { lhs, op, rhs }))
    }

    fn in_list(
        &self,
        lhs: ExprRef,
        values: Vec<ExprRef>,
        negated: bool,
    ) -> RewriteResult<ExprRef> {
        invariant!(!values.is_empty(), "IN list for {lhs} must not be empty");
        let lty = lhs.ty();
        if let Some(bad) = values.iter().find(|v| !lty.is_compatible_with(v.ty())) {
            return Err(type_mismatch("IN", lty, Some(bad.ty())));
        }
        Ok(Arc::new(Expr::In {
            lhs,
            rhs: InValue::List(values),
            negated,
        }))
    }

    fn in_subquery(
        &self,
        lhs: ExprRef,
        subquery: Subquery,
        negated: bool,
    ) -> RewriteResult<ExprRef> {
        Ok(Arc::new(Expr::In {
            lhs,
            rhs: InValue::Subquery(subquery),
            negated,
        }))
    }

    fn case_when(
        &self,
        operand: Option<ExprRef>,
        branches: Vec<CaseWhenBranch>,
        else_expr: Option<ExprRef>,
    ) -> RewriteResult<ExprRef> {
        invariant!(!branches.is_empty(), "CASE requires at least one WHEN branch");
        for branch in &branches {
            let cty = branch.condition.ty();
            match &operand {
                Some(operand) if !operand.ty().is_compatible_with(cty) => {
                    return Err(type_mismatch("CASE", operand.ty(), Some(cty)));
                }
                None if !cty.is_boolean() => {
                    return Err(type_mismatch("WHEN", cty, None));
                }
                _ => {}
            }
        }
        branches
            .iter()
            .map(|b| &b.body)
            .chain(&else_expr)
            .try_fold(SqlType::Unknown, |acc, body| {
                let ty = body.ty();
                if acc.is_compatible_with(ty) {
                    Ok(acc.unify(ty))
                } else {
                    Err(type_mismatch("THEN", acc, Some(ty)))
                }
            })?;
        Ok(Arc::new(Expr::CaseWhen {
            operand,
            branches,
            else_expr,
        }))
    }

    fn call(
        &self,
        receiver: Option<ExprRef>,
        name: SqlIdentifier,
        arguments: Vec<ExprRef>,
        ty: SqlType,
    ) -> RewriteResult<ExprRef> {
        Ok(Arc::new(Expr::Call {
            receiver,
            name,
            arguments,
            ty,
        }))
    }
}
