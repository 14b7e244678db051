//! Rewriting of two-valued comparison semantics into three-valued SQL.
//!
//! The source language treats `NULL = NULL` as true and `NULL = x` as false, while SQL makes both
//! `NULL`. This pass walks a query, computing the nullability of every node as it goes, and
//! expands each equality comparison whose operands might be `NULL` into a form that yields the
//! source language's answer under SQL semantics.
//!
//! Where the result of a node only ever feeds a filter (a `WHERE`, `HAVING` or join predicate,
//! possibly through `AND`/`OR`), `NULL` and false are indistinguishable, and the pass emits
//! cheaper expansions which may produce `NULL` where the source language would produce false.
//! That context is threaded through the traversal as the `allow_optimized` argument.
//!
//! With [`RewriteOptions::use_relational_nulls`] set, comparisons keep their native semantics and
//! only comparisons against a literal or parameter `NULL` are rewritten.

mod comparison;
mod nullability;

use std::mem;

use tracing::debug;
use trivalent_errors::{RewriteError, RewriteResult};
use trivalent_expr::{
    BinaryOperator, CaseWhenBranch, Column, Expr, ExprFactory, ExprRef, FieldDefinitionExpr,
    InValue, JoinClause, OrderBy, ParameterValues, QueryRef, SelectSpecification,
    SelectStatement, SetOperation, Subquery, TableExpr, TableExprInner, UnaryOperator,
};
use triomphe::Arc;

use crate::in_list::normalize_in_list;
use crate::{RewriteOptions, Rewritten};

use self::nullability::columns_proven_by_conjuncts;

/// Things that can have their comparisons rewritten from two-valued to three-valued semantics
pub trait NullSemantics: Sized {
    /// Rewrite `self` so that it evaluates, under SQL's three-valued logic, to what it means
    /// under two-valued comparison semantics.
    ///
    /// Parameters referenced by `self` must all have values in `parameters`. The returned
    /// [`Rewritten::can_cache`] is `false` if the result is only valid for those particular
    /// values.
    fn rewrite_null_semantics<F: ExprFactory>(
        &self,
        factory: &F,
        parameters: &ParameterValues,
        options: RewriteOptions,
    ) -> RewriteResult<Rewritten<Self>>;
}

impl NullSemantics for QueryRef {
    fn rewrite_null_semantics<F: ExprFactory>(
        &self,
        factory: &F,
        parameters: &ParameterValues,
        options: RewriteOptions,
    ) -> RewriteResult<Rewritten<Self>> {
        let mut rewriter = NullSemanticsRewriter::new(factory, parameters, options);
        let query = rewriter.rewrite_query(self)?;
        Ok(Rewritten {
            query,
            can_cache: rewriter.can_cache(),
        })
    }
}

/// A bare expression is rewritten as a filter predicate
impl NullSemantics for ExprRef {
    fn rewrite_null_semantics<F: ExprFactory>(
        &self,
        factory: &F,
        parameters: &ParameterValues,
        options: RewriteOptions,
    ) -> RewriteResult<Rewritten<Self>> {
        let mut rewriter = NullSemanticsRewriter::new(factory, parameters, options);
        let query = rewriter.rewrite_predicate(self)?;
        Ok(Rewritten {
            query,
            can_cache: rewriter.can_cache(),
        })
    }
}

/// Stateful driver for the null-semantics rewrite.
///
/// A single rewriter may be used for several trees; [`can_cache`](Self::can_cache) then reports
/// on all of them together.
pub struct NullSemanticsRewriter<'a, F> {
    factory: &'a F,
    parameters: &'a ParameterValues,
    use_relational_nulls: bool,
    /// Columns proven to be non-null in the current scope. Pushed while visiting the right-hand
    /// side of an `AND` (or `OR`) and truncated back on the way out.
    non_nullable_columns: Vec<Column>,
    can_cache: bool,
}

impl<'a, F: ExprFactory> NullSemanticsRewriter<'a, F> {
    pub fn new(factory: &'a F, parameters: &'a ParameterValues, options: RewriteOptions) -> Self {
        Self {
            factory,
            parameters,
            use_relational_nulls: options.use_relational_nulls,
            non_nullable_columns: Vec::new(),
            can_cache: true,
        }
    }

    /// Returns false if any rewrite so far depended on the value bound to a parameter
    pub fn can_cache(&self) -> bool {
        self.can_cache
    }

    pub fn rewrite_query(&mut self, query: &QueryRef) -> RewriteResult<QueryRef> {
        // Nothing proven about the enclosing query holds for columns of a nested one, which may
        // shadow the same table aliases.
        let outer = mem::take(&mut self.non_nullable_columns);
        let result = self.visit_query(query);
        self.non_nullable_columns = outer;
        result
    }

    /// Rewrite an expression whose value is only ever used to filter rows
    pub fn rewrite_predicate(&mut self, expr: &ExprRef) -> RewriteResult<ExprRef> {
        Ok(self.visit(expr, true)?.0)
    }

    /// Rewrite an expression whose value is observed directly, such as a projected column
    pub fn rewrite_scalar(&mut self, expr: &ExprRef) -> RewriteResult<ExprRef> {
        Ok(self.visit(expr, false)?.0)
    }

    fn do_not_cache(&mut self, reason: &str) {
        if self.can_cache {
            debug!(reason, "Rewritten query depends on parameter values");
            self.can_cache = false;
        }
    }

    fn visit_query(&mut self, query: &QueryRef) -> RewriteResult<QueryRef> {
        match &**query {
            SelectSpecification::Simple(stmt) => Ok(match self.visit_select(stmt)? {
                Some(stmt) => Arc::new(SelectSpecification::Simple(stmt)),
                None => query.clone(),
            }),
            SelectSpecification::SetOperation(op) => {
                let lhs = self.rewrite_query(&op.lhs)?;
                let rhs = self.rewrite_query(&op.rhs)?;
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

    fn visit_subquery(&mut self, subquery: &Subquery) -> RewriteResult<Subquery> {
        let query = self.rewrite_query(subquery.query())?;
        if QueryRef::ptr_eq(&query, subquery.query()) {
            Ok(subquery.clone())
        } else {
            Ok(Subquery::from(query))
        }
    }

    /// Visit `expr`, recording in `changed` whether the result differs from it
    fn visit_tracked(
        &mut self,
        expr: &ExprRef,
        allow_optimized: bool,
        changed: &mut bool,
    ) -> RewriteResult<ExprRef> {
        let (result, _) = self.visit(expr, allow_optimized)?;
        *changed |= !ExprRef::ptr_eq(expr, &result);
        Ok(result)
    }

    fn visit_table_expr(
        &mut self,
        table: &TableExpr,
        changed: &mut bool,
    ) -> RewriteResult<TableExpr> {
        match &table.inner {
            TableExprInner::Table(_) => Ok(table.clone()),
            TableExprInner::Subquery(subquery) => {
                let new = self.visit_subquery(subquery)?;
                *changed |= new != *subquery;
                Ok(TableExpr {
                    inner: TableExprInner::Subquery(new),
                    alias: table.alias.clone(),
                })
            }
        }
    }

    /// Returns the rewritten statement, or `None` if nothing in it changed
    fn visit_select(&mut self, stmt: &SelectStatement) -> RewriteResult<Option<SelectStatement>> {
        let mut changed = false;

        let fields = stmt
            .fields
            .iter()
            .map(|field| {
                Ok(FieldDefinitionExpr {
                    expr: self.visit_tracked(&field.expr, false, &mut changed)?,
                    alias: field.alias.clone(),
                })
            })
            .collect::<RewriteResult<Vec<_>>>()?;

        let tables = stmt
            .tables
            .iter()
            .map(|table| self.visit_table_expr(table, &mut changed))
            .collect::<RewriteResult<Vec<_>>>()?;

        let join = stmt
            .join
            .iter()
            .map(|join| self.visit_join(join, &mut changed))
            .collect::<RewriteResult<Vec<_>>>()?;

        let where_clause = stmt
            .where_clause
            .as_ref()
            .map(|expr| self.visit_tracked(expr, true, &mut changed))
            .transpose()?;

        let group_by = stmt
            .group_by
            .iter()
            .map(|expr| self.visit_tracked(expr, false, &mut changed))
            .collect::<RewriteResult<Vec<_>>>()?;

        let having = stmt
            .having
            .as_ref()
            .map(|expr| self.visit_tracked(expr, true, &mut changed))
            .transpose()?;

        let order = stmt
            .order
            .iter()
            .map(|order| {
                Ok(OrderBy {
                    field: self.visit_tracked(&order.field, false, &mut changed)?,
                    order_type: order.order_type,
                })
            })
            .collect::<RewriteResult<Vec<_>>>()?;

        let limit = stmt
            .limit
            .as_ref()
            .map(|expr| self.visit_tracked(expr, false, &mut changed))
            .transpose()?;

        let offset = stmt
            .offset
            .as_ref()
            .map(|expr| self.visit_tracked(expr, false, &mut changed))
            .transpose()?;

        if !changed {
            return Ok(None);
        }

        Ok(Some(SelectStatement {
            distinct: stmt.distinct,
            fields,
            tables,
            join,
            where_clause,
            group_by,
            having,
            order,
            limit,
            offset,
        }))
    }

    fn visit_join(&mut self, join: &JoinClause, changed: &mut bool) -> RewriteResult<JoinClause> {
        Ok(match join {
            JoinClause::Inner { right, on } => JoinClause::Inner {
                on: self.visit_join_on(on, changed)?,
                right: self.visit_table_expr(right, changed)?,
            },
            JoinClause::Left { right, on } => JoinClause::Left {
                on: self.visit_join_on(on, changed)?,
                right: self.visit_table_expr(right, changed)?,
            },
            JoinClause::Cross { right } => JoinClause::Cross {
                right: self.visit_table_expr(right, changed)?,
            },
            JoinClause::CrossApply { right } => JoinClause::CrossApply {
                right: self.visit_table_expr(right, changed)?,
            },
            JoinClause::OuterApply { right } => JoinClause::OuterApply {
                right: self.visit_table_expr(right, changed)?,
            },
        })
    }

    fn visit_join_on(&mut self, on: &ExprRef, changed: &mut bool) -> RewriteResult<ExprRef> {
        let mut guarded = Vec::new();
        columns_proven_by_conjuncts(on, &mut guarded);
        let result = self.visit_join_predicate(on, &guarded)?;
        *changed |= !ExprRef::ptr_eq(on, &result);
        Ok(result)
    }

    /// Rewrite a join predicate: a conjunction of comparisons and null tests.
    ///
    /// Equality is always made null-rejecting, in both modes, by guarding each nullable operand
    /// with `IS NOT NULL` unless the predicate already carries that guard (`guarded`). Comparing
    /// against `NULL` itself becomes a null test, as it does everywhere else.
    fn visit_join_predicate(
        &mut self,
        predicate: &ExprRef,
        guarded: &[Column],
    ) -> RewriteResult<ExprRef> {
        match &**predicate {
            Expr::BinaryOp {
                lhs,
                op: BinaryOperator::And,
                rhs,
            } => {
                let left = self.visit_join_predicate(lhs, guarded)?;
                let right = self.visit_join_predicate(rhs, guarded)?;
                self.rebuild_binary(predicate, left, BinaryOperator::And, right)
            }
            Expr::BinaryOp {
                lhs,
                op: BinaryOperator::Equal,
                rhs,
            } => {
                let (left, left_nullable) = self.visit(lhs, false)?;
                let (right, right_nullable) = self.visit(rhs, false)?;
                if let Some(test) = self.null_comparison(
                    &left,
                    left_nullable,
                    BinaryOperator::Equal,
                    &right,
                    right_nullable,
                )? {
                    return Ok(test);
                }
                let mut result = self.rebuild_binary(
                    predicate,
                    left.clone(),
                    BinaryOperator::Equal,
                    right.clone(),
                )?;
                for (side, nullable) in [(left, left_nullable), (right, right_nullable)] {
                    let already_guarded = side
                        .as_column()
                        .is_some_and(|c| guarded.iter().any(|g| g.refers_to(c)));
                    if nullable && !already_guarded {
                        result = self.factory.and(result, self.guard_not_null(&side)?)?;
                    }
                }
                Ok(result)
            }
            Expr::BinaryOp { op, .. } if op.is_comparison() => Ok(self.visit(predicate, true)?.0),
            Expr::UnaryOp { op, .. } if op.is_null_test() => Ok(self.visit(predicate, true)?.0),
            _ => Err(RewriteError::InvalidJoinPredicate {
                predicate: predicate.to_string(),
            }),
        }
    }

    /// Visit `expr`, returning the rewritten expression and whether it may evaluate to `NULL`
    fn visit(&mut self, expr: &ExprRef, allow_optimized: bool) -> RewriteResult<(ExprRef, bool)> {
        match &**expr {
            Expr::Literal { value, .. } => Ok((expr.clone(), value.is_null())),
            Expr::Parameter { name, ty } => {
                let is_null = self.parameters.get(name)?.is_null();
                if is_null && !self.use_relational_nulls {
                    self.do_not_cache("inlined NULL parameter");
                    return Ok((self.factory.null(*ty), true));
                }
                Ok((expr.clone(), is_null))
            }
            Expr::Column(column) => Ok((expr.clone(), self.column_nullable(column))),
            Expr::UnaryOp { op, rhs } => self.visit_unary(expr, *op, rhs),
            Expr::BinaryOp { lhs, op, rhs } => {
                self.visit_binary(expr, lhs, *op, rhs, allow_optimized)
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
                    .map(|r| self.visit_tracked(r, false, &mut changed))
                    .transpose()?;
                let new_arguments = arguments
                    .iter()
                    .map(|arg| self.visit_tracked(arg, false, &mut changed))
                    .collect::<RewriteResult<Vec<_>>>()?;
                let result = if changed {
                    self.factory
                        .call(new_receiver, name.clone(), new_arguments, *ty)?
                } else {
                    expr.clone()
                };
                Ok((result, true))
            }
            Expr::CaseWhen {
                operand,
                branches,
                else_expr,
            } => self.visit_case(expr, operand.as_ref(), branches, else_expr.as_ref()),
            Expr::In { lhs, rhs, negated } => {
                self.visit_in(expr, lhs, rhs, *negated, allow_optimized)
            }
            Expr::Exists { subquery, negated } => {
                let new = self.visit_subquery(subquery)?;
                let result = if new == *subquery {
                    expr.clone()
                } else {
                    self.factory.exists(new, *negated)
                };
                Ok((result, false))
            }
            Expr::NestedSelect { subquery, ty } => {
                let new = self.visit_subquery(subquery)?;
                let result = if new == *subquery {
                    expr.clone()
                } else {
                    self.factory.nested_select(new, *ty)
                };
                Ok((result, true))
            }
        }
    }

    fn visit_unary(
        &mut self,
        original: &ExprRef,
        op: UnaryOperator,
        rhs: &ExprRef,
    ) -> RewriteResult<(ExprRef, bool)> {
        let (operand, operand_nullable) = self.visit(rhs, false)?;
        match op {
            UnaryOperator::IsNull | UnaryOperator::IsNotNull if !self.use_relational_nulls => Ok((
                self.process_null_not_null(Some(original), op, &operand, operand_nullable)?,
                false,
            )),
            UnaryOperator::IsNull | UnaryOperator::IsNotNull => {
                Ok((self.rebuild_unary(original, op, operand)?, false))
            }
            UnaryOperator::Not | UnaryOperator::Negate | UnaryOperator::Convert(_) => Ok((
                self.rebuild_unary(original, op, operand)?,
                operand_nullable,
            )),
        }
    }

    fn visit_binary(
        &mut self,
        original: &ExprRef,
        lhs: &ExprRef,
        op: BinaryOperator,
        rhs: &ExprRef,
        allow_optimized: bool,
    ) -> RewriteResult<(ExprRef, bool)> {
        let child_allow_optimized = allow_optimized && op.is_logical();
        let (left, left_nullable) = self.visit(lhs, child_allow_optimized)?;

        // The right side of `AND` only matters when the left is not false, and the right side of
        // `OR` only when the left is not true
        let mut proven = Vec::new();
        match op {
            BinaryOperator::And => columns_proven_by_conjuncts(&left, &mut proven),
            BinaryOperator::Or => nullability::columns_proven_by_disjuncts(&left, &mut proven),
            _ => {}
        }
        let (right, right_nullable) = self.with_non_nullable_columns(proven, |this| {
            this.visit(rhs, child_allow_optimized)
        })?;

        if op.is_equality() {
            return self.optimize_comparison(
                original,
                left,
                left_nullable,
                op,
                right,
                right_nullable,
                allow_optimized,
            );
        }

        let nullable = match op {
            BinaryOperator::Coalesce => left_nullable && right_nullable,
            _ => left_nullable || right_nullable,
        };
        Ok((self.rebuild_binary(original, left, op, right)?, nullable))
    }

    fn visit_case(
        &mut self,
        original: &ExprRef,
        operand: Option<&ExprRef>,
        branches: &[CaseWhenBranch],
        else_expr: Option<&ExprRef>,
    ) -> RewriteResult<(ExprRef, bool)> {
        let mut changed = false;
        let mut nullable = else_expr.is_none();

        let new_operand = operand
            .map(|o| self.visit_tracked(o, false, &mut changed))
            .transpose()?;
        // With an operand, conditions are values compared against it rather than predicates
        let conditions_are_predicates = operand.is_none();

        let mut new_branches = Vec::with_capacity(branches.len());
        for branch in branches {
            let condition =
                self.visit_tracked(&branch.condition, conditions_are_predicates, &mut changed)?;
            let (body, body_nullable) = self.visit(&branch.body, false)?;
            changed |= !ExprRef::ptr_eq(&body, &branch.body);
            nullable |= body_nullable;
            new_branches.push(CaseWhenBranch { condition, body });
        }

        let new_else = match else_expr {
            Some(e) => {
                let (result, else_nullable) = self.visit(e, false)?;
                changed |= !ExprRef::ptr_eq(e, &result);
                nullable |= else_nullable;
                Some(result)
            }
            None => None,
        };

        let result = if changed {
            self.factory.case_when(new_operand, new_branches, new_else)?
        } else {
            original.clone()
        };
        Ok((result, nullable))
    }

    fn visit_in(
        &mut self,
        original: &ExprRef,
        lhs: &ExprRef,
        rhs: &InValue,
        negated: bool,
        allow_optimized: bool,
    ) -> RewriteResult<(ExprRef, bool)> {
        let (item, item_nullable) = self.visit(lhs, false)?;

        let values = match rhs {
            InValue::Subquery(subquery) => {
                let new = self.visit_subquery(subquery)?;
                let result = if new == *subquery && ExprRef::ptr_eq(&item, lhs) {
                    original.clone()
                } else {
                    self.factory.in_subquery(item, new, negated)?
                };
                return Ok((result, true));
            }
            InValue::List(values) => values,
        };

        let normalized = if self.use_relational_nulls {
            None
        } else {
            normalize_in_list(values, self.parameters, self.factory)?
        };

        let Some(normalized) = normalized else {
            if values.is_empty() {
                return Ok((self.factory.constant(negated), false));
            }
            let mut changed = !ExprRef::ptr_eq(&item, lhs);
            let mut nullable = item_nullable;
            let mut new_values = Vec::with_capacity(values.len());
            for value in values {
                let (result, value_nullable) = self.visit(value, false)?;
                changed |= !ExprRef::ptr_eq(value, &result);
                nullable |= value_nullable;
                new_values.push(result);
            }
            let result = if changed {
                self.factory.in_list(item, new_values, negated)?
            } else {
                original.clone()
            };
            return Ok((result, nullable));
        };

        if normalized.parameterized {
            self.do_not_cache("normalized parameterized IN list");
        }

        if normalized.values.is_empty() {
            let result = match (item_nullable && normalized.had_null, negated) {
                (true, false) => self.factory.is_null(item)?,
                (true, true) => self.factory.is_not_null(item)?,
                (false, _) => self.factory.constant(negated),
            };
            return Ok((result, false));
        }

        let in_list = if normalized.is_unchanged() && ExprRef::ptr_eq(&item, lhs) {
            original.clone()
        } else {
            self.factory
                .in_list(item.clone(), normalized.values, negated)?
        };

        if !item_nullable {
            return Ok((in_list, false));
        }
        if allow_optimized && !normalized.had_null && !negated {
            return Ok((in_list, true));
        }

        // A NULL item is in the list exactly when the list contained NULL
        let result = if negated == normalized.had_null {
            self.factory.and(in_list, self.factory.is_not_null(item)?)?
        } else {
            self.factory.or(in_list, self.factory.is_null(item)?)?
        };
        Ok((result, false))
    }

    fn rebuild_unary(
        &self,
        original: &ExprRef,
        op: UnaryOperator,
        operand: ExprRef,
    ) -> RewriteResult<ExprRef> {
        match &**original {
            Expr::UnaryOp { op: o, rhs } if *o == op && ExprRef::ptr_eq(rhs, &operand) => {
                Ok(original.clone())
            }
            _ => self.factory.unary(op, operand),
        }
    }

    fn rebuild_binary(
        &self,
        original: &ExprRef,
        left: ExprRef,
        op: BinaryOperator,
        right: ExprRef,
    ) -> RewriteResult<ExprRef> {
        match &**original {
            Expr::BinaryOp { lhs, op: o, rhs }
                if *o == op && ExprRef::ptr_eq(lhs, &left) && ExprRef::ptr_eq(rhs, &right) =>
            {
                Ok(original.clone())
            }
            _ => self.factory.binary(left, op, right),
        }
    }
}
