use trivalent_errors::RewriteResult;
use trivalent_expr::{
    BinaryOperator, CaseWhenBranch, Expr, ExprFactory, ExprRef, FieldDefinitionExpr, InValue,
    JoinClause, Literal, OrderBy, QueryRef, SelectSpecification, SelectStatement, SetOperation,
    Subquery, TableExpr, TableExprInner, UnaryOperator,
};
use triomphe::Arc;

use super::merge::{merge_null_tests, merge_point_tests};
use crate::RewriteOptions;

/// Things that contain boolean expressions which can be algebraically simplified
pub trait SimplifyExpressions: Sized {
    /// Recursively simplify all expressions in `self`, bottom-up.
    ///
    /// The result is a fixed point: simplifying it again returns it unchanged. Unless
    /// [`RewriteOptions::use_relational_nulls`] is set, negations are pushed down through `AND`,
    /// `OR` and comparison operators.
    fn simplify_expressions<F: ExprFactory>(
        &self,
        factory: &F,
        options: RewriteOptions,
    ) -> RewriteResult<Self>;
}

impl SimplifyExpressions for ExprRef {
    fn simplify_expressions<F: ExprFactory>(
        &self,
        factory: &F,
        options: RewriteOptions,
    ) -> RewriteResult<Self> {
        Simplifier::new(factory, options).simplify(self)
    }
}

impl SimplifyExpressions for QueryRef {
    fn simplify_expressions<F: ExprFactory>(
        &self,
        factory: &F,
        options: RewriteOptions,
    ) -> RewriteResult<Self> {
        Simplifier::new(factory, options).simplify_query(self)
    }
}

struct Simplifier<'a, F> {
    factory: &'a F,
    use_relational_nulls: bool,
}

impl<'a, F: ExprFactory> Simplifier<'a, F> {
    fn new(factory: &'a F, options: RewriteOptions) -> Self {
        Self {
            factory,
            use_relational_nulls: options.use_relational_nulls,
        }
    }

    fn simplify_query(&self, query: &QueryRef) -> RewriteResult<QueryRef> {
        match &**query {
            SelectSpecification::Simple(stmt) => Ok(match self.simplify_select(stmt)? {
                Some(stmt) => Arc::new(SelectSpecification::Simple(stmt)),
                None => query.clone(),
            }),
            SelectSpecification::SetOperation(op) => {
                let lhs = self.simplify_query(&op.lhs)?;
                let rhs = self.simplify_query(&op.rhs)?;
                if QueryRef::ptr_eq(&lhs, &op.lhs) && QueryRef::ptr_eq(&rhs, &op.rhs) {
                    Ok(query.clone())
                } else {
                    Ok(Arc::new(SelectSpecification::SetOperation(SetOperation {
                        lhs,
                        rhs,
                        ..*op
                    })))
                }
            }
        }
    }

    fn simplify_subquery(&self, subquery: &Subquery) -> RewriteResult<Subquery> {
        let query = self.simplify_query(subquery.query())?;
        if QueryRef::ptr_eq(&query, subquery.query()) {
            Ok(subquery.clone())
        } else {
            Ok(Subquery::from(query))
        }
    }

    fn simplify_tracked(&self, expr: &ExprRef, changed: &mut bool) -> RewriteResult<ExprRef> {
        let result = self.simplify(expr)?;
        *changed |= !ExprRef::ptr_eq(expr, &result);
        Ok(result)
    }

    /// Simplify a `WHERE` or `HAVING` clause, dropping it entirely if it is always true
    fn simplify_filter(
        &self,
        filter: Option<&ExprRef>,
        changed: &mut bool,
    ) -> RewriteResult<Option<ExprRef>> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        let result = self.simplify_tracked(filter, changed)?;
        if result.as_bool_literal() == Some(true) {
            *changed = true;
            return Ok(None);
        }
        Ok(Some(result))
    }

    fn simplify_table_expr(
        &self,
        table: &TableExpr,
        changed: &mut bool,
    ) -> RewriteResult<TableExpr> {
        match &table.inner {
            TableExprInner::Table(_) => Ok(table.clone()),
            TableExprInner::Subquery(subquery) => {
                let new = self.simplify_subquery(subquery)?;
                *changed |= new != *subquery;
                Ok(TableExpr {
                    inner: TableExprInner::Subquery(new),
                    alias: table.alias.clone(),
                })
            }
        }
    }

    fn simplify_join(&self, join: &JoinClause, changed: &mut bool) -> RewriteResult<JoinClause> {
        Ok(match join {
            JoinClause::Inner { right, on } => JoinClause::Inner {
                right: self.simplify_table_expr(right, changed)?,
                on: self.simplify_tracked(on, changed)?,
            },
            JoinClause::Left { right, on } => JoinClause::Left {
                right: self.simplify_table_expr(right, changed)?,
                on: self.simplify_tracked(on, changed)?,
            },
            JoinClause::Cross { right } => JoinClause::Cross {
                right: self.simplify_table_expr(right, changed)?,
            },
            JoinClause::CrossApply { right } => JoinClause::CrossApply {
                right: self.simplify_table_expr(right, changed)?,
            },
            JoinClause::OuterApply { right } => JoinClause::OuterApply {
                right: self.simplify_table_expr(right, changed)?,
            },
        })
    }

    fn simplify_select(&self, stmt: &SelectStatement) -> RewriteResult<Option<SelectStatement>> {
        let mut changed = false;
        let new = SelectStatement {
            distinct: stmt.distinct,
            fields: stmt
                .fields
                .iter()
                .map(|field| {
                    Ok(FieldDefinitionExpr {
                        expr: self.simplify_tracked(&field.expr, &mut changed)?,
                        alias: field.alias.clone(),
                    })
                })
                .collect::<RewriteResult<_>>()?,
            tables: stmt
                .tables
                .iter()
                .map(|table| self.simplify_table_expr(table, &mut changed))
                .collect::<RewriteResult<_>>()?,
            join: stmt
                .join
                .iter()
                .map(|join| self.simplify_join(join, &mut changed))
                .collect::<RewriteResult<_>>()?,
            where_clause: self.simplify_filter(stmt.where_clause.as_ref(), &mut changed)?,
            group_by: stmt
                .group_by
                .iter()
                .map(|expr| self.simplify_tracked(expr, &mut changed))
                .collect::<RewriteResult<_>>()?,
            having: self.simplify_filter(stmt.having.as_ref(), &mut changed)?,
            order: stmt
                .order
                .iter()
                .map(|order| {
                    Ok(OrderBy {
                        field: self.simplify_tracked(&order.field, &mut changed)?,
                        order_type: order.order_type,
                    })
                })
                .collect::<RewriteResult<_>>()?,
            limit: stmt
                .limit
                .as_ref()
                .map(|expr| self.simplify_tracked(expr, &mut changed))
                .transpose()?,
            offset: stmt
                .offset
                .as_ref()
                .map(|expr| self.simplify_tracked(expr, &mut changed))
                .transpose()?,
        };
        Ok(changed.then_some(new))
    }

    fn simplify(&self, expr: &ExprRef) -> RewriteResult<ExprRef> {
        match &**expr {
            Expr::Literal { .. } | Expr::Parameter { .. } | Expr::Column(_) => Ok(expr.clone()),
            Expr::UnaryOp { op, rhs } => {
                let operand = self.simplify(rhs)?;
                self.simplify_unary(Some(expr), *op, operand)
            }
            Expr::BinaryOp { lhs, op, rhs } => {
                let left = self.simplify(lhs)?;
                let right = self.simplify(rhs)?;
                self.simplify_binary(Some(expr), left, *op, right)
            }
            Expr::Call {
                receiver,
                name,
                arguments,
                ty,
            } => {
                let mut changed = false;
                let new_receiver = receiver
                    .as_ref()
                    .map(|r| self.simplify_tracked(r, &mut changed))
                    .transpose()?;
                let new_arguments = arguments
                    .iter()
                    .map(|arg| self.simplify_tracked(arg, &mut changed))
                    .collect::<RewriteResult<Vec<_>>>()?;
                if changed {
                    self.factory
                        .call(new_receiver, name.clone(), new_arguments, *ty)
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::CaseWhen {
                operand,
                branches,
                else_expr,
            } => self.simplify_case(expr, operand.as_ref(), branches, else_expr.as_ref()),
            Expr::In {
                lhs,
                rhs: InValue::List(values),
                negated,
            } => {
                if values.is_empty() {
                    return Ok(self.factory.constant(*negated));
                }
                let mut changed = false;
                let item = self.simplify_tracked(lhs, &mut changed)?;
                let values = values
                    .iter()
                    .map(|value| self.simplify_tracked(value, &mut changed))
                    .collect::<RewriteResult<Vec<_>>>()?;
                if changed {
                    self.factory.in_list(item, values, *negated)
                } else {
                    Ok(expr.clone())
                }
            }
            Expr::In {
                lhs,
                rhs: InValue::Subquery(subquery),
                negated,
            } => {
                let item = self.simplify(lhs)?;
                let new = self.simplify_subquery(subquery)?;
                if ExprRef::ptr_eq(&item, lhs) && new == *subquery {
                    Ok(expr.clone())
                } else {
                    self.factory.in_subquery(item, new, *negated)
                }
            }
            Expr::Exists { subquery, negated } => {
                let new = self.simplify_subquery(subquery)?;
                Ok(if new == *subquery {
                    expr.clone()
                } else {
                    self.factory.exists(new, *negated)
                })
            }
            Expr::NestedSelect { subquery, ty } => {
                let new = self.simplify_subquery(subquery)?;
                Ok(if new == *subquery {
                    expr.clone()
                } else {
                    self.factory.nested_select(new, *ty)
                })
            }
        }
    }

    /// Build `op operand`, where `operand` is already simplified. `original` is the node being
    /// simplified, if any, and is reused when nothing changed.
    fn simplify_unary(
        &self,
        original: Option<&ExprRef>,
        op: UnaryOperator,
        operand: ExprRef,
    ) -> RewriteResult<ExprRef> {
        match op {
            UnaryOperator::Not => self.simplify_not(original, operand),
            UnaryOperator::IsNull | UnaryOperator::IsNotNull => {
                let is_null = op == UnaryOperator::IsNull;
                match &*operand {
                    Expr::Literal { value, .. } => {
                        Ok(self.factory.constant(value.is_null() == is_null))
                    }
                    Expr::UnaryOp { op: inner, .. } if inner.is_null_test() => {
                        Ok(self.factory.constant(!is_null))
                    }
                    _ => self.rebuild_unary(original, op, operand),
                }
            }
            UnaryOperator::Negate | UnaryOperator::Convert(_) => {
                self.rebuild_unary(original, op, operand)
            }
        }
    }

    fn simplify_not(&self, original: Option<&ExprRef>, operand: ExprRef) -> RewriteResult<ExprRef> {
        let f = self.factory;
        match &*operand {
            Expr::Literal {
                value: Literal::Boolean(b),
                ..
            } => Ok(f.constant(!b)),
            Expr::Literal {
                value: Literal::Null,
                ..
            } => Ok(operand.clone()),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                rhs,
            } => Ok(rhs.clone()),
            Expr::UnaryOp {
                op: UnaryOperator::IsNull,
                rhs,
            } => f.is_not_null(rhs.clone()),
            Expr::UnaryOp {
                op: UnaryOperator::IsNotNull,
                rhs,
            } => f.is_null(rhs.clone()),
            Expr::In {
                lhs,
                rhs: InValue::List(values),
                negated,
            } => f.in_list(lhs.clone(), values.clone(), !negated),
            Expr::In {
                lhs,
                rhs: InValue::Subquery(subquery),
                negated,
            } => f.in_subquery(lhs.clone(), subquery.clone(), !negated),
            Expr::Exists { subquery, negated } => Ok(f.exists(subquery.clone(), !negated)),
            Expr::BinaryOp { lhs, op, rhs } if !self.use_relational_nulls => {
                if let Some(negated) = op.negate_comparison() {
                    return f.binary(lhs.clone(), negated, rhs.clone());
                }
                if let Some(flipped) = op.flip_logical() {
                    // De Morgan
                    let left = self.simplify_not(None, lhs.clone())?;
                    let right = self.simplify_not(None, rhs.clone())?;
                    return self.simplify_binary(None, left, flipped, right);
                }
                self.rebuild_unary(original, UnaryOperator::Not, operand)
            }
            _ => self.rebuild_unary(original, UnaryOperator::Not, operand),
        }
    }

    /// Build `left op right`, where both operands are already simplified
    fn simplify_binary(
        &self,
        original: Option<&ExprRef>,
        left: ExprRef,
        op: BinaryOperator,
        right: ExprRef,
    ) -> RewriteResult<ExprRef> {
        if !op.is_logical() {
            return self.rebuild_binary(original, left, op, right);
        }

        // The constant that decides the whole expression: FALSE for AND, TRUE for OR
        let absorbing = op == BinaryOperator::Or;
        match (left.as_bool_literal(), right.as_bool_literal()) {
            (Some(value), _) if value == absorbing => return Ok(left),
            (_, Some(value)) if value == absorbing => return Ok(right),
            (Some(_), _) => return Ok(right),
            (_, Some(_)) => return Ok(left),
            (None, None) => {}
        }

        if let Some(merged) = merge_null_tests(self.factory, &left, op, &right) {
            return Ok(merged);
        }
        if let Some(merged) = merge_point_tests(self.factory, &left, op, &right)? {
            return Ok(merged);
        }

        self.rebuild_binary(original, left, op, right)
    }

    fn simplify_case(
        &self,
        original: &ExprRef,
        operand: Option<&ExprRef>,
        branches: &[CaseWhenBranch],
        else_expr: Option<&ExprRef>,
    ) -> RewriteResult<ExprRef> {
        let mut changed = false;
        let new_operand = operand
            .map(|o| self.simplify_tracked(o, &mut changed))
            .transpose()?;
        let mut new_else = else_expr
            .map(|e| self.simplify_tracked(e, &mut changed))
            .transpose()?;

        let mut new_branches = Vec::with_capacity(branches.len());
        for branch in branches {
            let condition = self.simplify_tracked(&branch.condition, &mut changed)?;
            let body = self.simplify_tracked(&branch.body, &mut changed)?;

            // Only conditions of a searched CASE are predicates that can be decided here
            if new_operand.is_none() {
                if condition.as_bool_literal() == Some(false) || condition.is_null_literal() {
                    changed = true;
                    continue;
                }
                if condition.as_bool_literal() == Some(true) {
                    // Later branches can never be reached
                    changed = true;
                    new_else = Some(body);
                    break;
                }
            }
            new_branches.push(CaseWhenBranch { condition, body });
        }

        if new_branches.is_empty() {
            return Ok(new_else.unwrap_or_else(|| self.factory.null(original.ty())));
        }
        if !changed {
            return Ok(original.clone());
        }
        self.factory.case_when(new_operand, new_branches, new_else)
    }

    fn rebuild_unary(
        &self,
        original: Option<&ExprRef>,
        op: UnaryOperator,
        operand: ExprRef,
    ) -> RewriteResult<ExprRef> {
        if let Some(original) = original {
            if let Expr::UnaryOp { op: o, rhs } = &**original {
                if *o == op && ExprRef::ptr_eq(rhs, &operand) {
                    return Ok(original.clone());
                }
            }
        }
        self.factory.unary(op, operand)
    }

    fn rebuild_binary(
        &self,
        original: Option<&ExprRef>,
        left: ExprRef,
        op: BinaryOperator,
        right: ExprRef,
    ) -> RewriteResult<ExprRef> {
        if let Some(original) = original {
            if let Expr::BinaryOp { lhs, op: o, rhs } = &**original {
                if *o == op && ExprRef::ptr_eq(lhs, &left) && ExprRef::ptr_eq(rhs, &right) {
                    return Ok(original.clone());
                }
            }
        }
        self.factory.binary(left, op, right)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use trivalent_expr::{Column, SqlType, TypedExprFactory};

    use super::*;

    fn bool_column(name: &str) -> ExprRef {
        TypedExprFactory.column(Column::new("t", name, SqlType::Bool, true))
    }

    fn int_column(name: &str) -> ExprRef {
        TypedExprFactory.column(Column::new("t", name, SqlType::Int, true))
    }

    fn int(i: i64) -> ExprRef {
        TypedExprFactory.literal(Literal::Integer(i), SqlType::Int)
    }

    fn simplify(expr: &ExprRef) -> String {
        expr.simplify_expressions(&TypedExprFactory, RewriteOptions::default())
            .unwrap()
            .to_string()
    }

    fn simplify_native(expr: &ExprRef) -> String {
        expr.simplify_expressions(
            &TypedExprFactory,
            RewriteOptions {
                use_relational_nulls: true,
            },
        )
        .unwrap()
        .to_string()
    }

    #[test]
    fn constant_operands() {
        let f = TypedExprFactory;
        let p = bool_column("p");
        assert_eq!(simplify(&f.and(f.constant(true), p.clone()).unwrap()), "t.p");
        assert_eq!(simplify(&f.and(p.clone(), f.constant(false)).unwrap()), "FALSE");
        assert_eq!(simplify(&f.or(p.clone(), f.constant(true)).unwrap()), "TRUE");
        assert_eq!(simplify(&f.or(f.constant(false), p).unwrap()), "t.p");
    }

    #[test]
    fn double_negation() {
        let f = TypedExprFactory;
        let gt = f
            .binary(int_column("x"), BinaryOperator::Greater, int(5))
            .unwrap();
        let expr = f.not(f.not(gt).unwrap()).unwrap();
        assert_eq!(simplify(&expr), "t.x > 5");
        assert_eq!(simplify_native(&expr), "t.x > 5");
    }

    #[test]
    fn negation_of_constants_and_null_tests() {
        let f = TypedExprFactory;
        assert_eq!(simplify(&f.not(f.constant(true)).unwrap()), "FALSE");
        assert_eq!(
            simplify(&f.not(f.is_null(int_column("x")).unwrap()).unwrap()),
            "t.x IS NOT NULL"
        );
        assert_eq!(
            simplify(&f.not(f.in_list(int_column("x"), vec![int(1)], false).unwrap()).unwrap()),
            "t.x NOT IN (1)"
        );
    }

    #[test]
    fn de_morgan_only_in_two_valued_mode() {
        let f = TypedExprFactory;
        let expr = f
            .not(
                f.and(
                    bool_column("p"),
                    f.binary(int_column("x"), BinaryOperator::Less, int(3))
                        .unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(simplify(&expr), "(NOT t.p) OR (t.x >= 3)");
        assert_eq!(simplify_native(&expr), "NOT (t.p AND (t.x < 3))");
    }

    #[test]
    fn null_test_merging() {
        let f = TypedExprFactory;
        let x = int_column("x");
        let expr = f
            .or(
                f.is_null(x.clone()).unwrap(),
                f.not(f.is_null(x.clone()).unwrap()).unwrap(),
            )
            .unwrap();
        assert_eq!(simplify(&expr), "TRUE");
        let expr = f
            .and(f.is_null(x.clone()).unwrap(), f.is_null(x).unwrap())
            .unwrap();
        assert_eq!(simplify(&expr), "t.x IS NULL");
    }

    #[test]
    fn equality_chains_become_in_lists() {
        let f = TypedExprFactory;
        let x = int_column("x");
        let expr = f
            .or(
                f.or(
                    f.equal(x.clone(), int(1)).unwrap(),
                    f.equal(x.clone(), int(2)).unwrap(),
                )
                .unwrap(),
                f.equal(x.clone(), int(3)).unwrap(),
            )
            .unwrap();
        assert_eq!(simplify(&expr), "t.x IN (1, 2, 3)");

        let expr = f
            .not(
                f.or(
                    f.equal(x.clone(), int(1)).unwrap(),
                    f.equal(x, int(2)).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        assert_eq!(simplify(&expr), "t.x NOT IN (1, 2)");
    }

    #[test]
    fn case_pruning() {
        let f = TypedExprFactory;
        let branch = |condition, body| CaseWhenBranch { condition, body };
        let expr = f
            .case_when(
                None,
                vec![
                    branch(f.constant(false), int(1)),
                    branch(bool_column("p"), int(2)),
                    branch(f.constant(true), int(3)),
                    branch(bool_column("q"), int(4)),
                ],
                Some(int(5)),
            )
            .unwrap();
        assert_eq!(simplify(&expr), "CASE WHEN t.p THEN 2 ELSE 3 END");

        let expr = f
            .case_when(
                None,
                vec![branch(f.and(f.constant(true), f.constant(false)).unwrap(), int(1))],
                None,
            )
            .unwrap();
        assert_eq!(simplify(&expr), "NULL");

        // The conditions of a simple CASE are values, not predicates
        let expr = f
            .case_when(
                Some(bool_column("p")),
                vec![branch(f.constant(false), int(1))],
                None,
            )
            .unwrap();
        let simplified = expr
            .simplify_expressions(&f, RewriteOptions::default())
            .unwrap();
        assert!(ExprRef::ptr_eq(&simplified, &expr));
    }

    #[test]
    fn unchanged_expression_is_reused() {
        let f = TypedExprFactory;
        let expr = f
            .and(
                bool_column("p"),
                f.binary(int_column("x"), BinaryOperator::Greater, int(1))
                    .unwrap(),
            )
            .unwrap();
        let simplified = expr
            .simplify_expressions(&f, RewriteOptions::default())
            .unwrap();
        assert!(ExprRef::ptr_eq(&simplified, &expr));
    }

    #[test]
    fn where_true_is_dropped() {
        let f = TypedExprFactory;
        let query: QueryRef = Arc::new(SelectSpecification::Simple(SelectStatement {
            tables: vec![TableExpr::table("t")],
            where_clause: Some(f.or(bool_column("p"), f.constant(true)).unwrap()),
            having: Some(f.not(f.constant(false)).unwrap()),
            ..Default::default()
        }));
        let simplified = query
            .simplify_expressions(&f, RewriteOptions::default())
            .unwrap();
        assert_eq!(simplified.to_string(), "SELECT * FROM t");
    }
}
