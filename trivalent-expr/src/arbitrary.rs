//! [`proptest`] strategies for well-typed boolean predicates.
//!
//! Every generated predicate ranges over the columns of [`schema`], so tests can enumerate
//! assignments of those columns and evaluate a predicate before and after rewriting.

use proptest::collection::vec;
use proptest::prelude::*;
use test_strategy::Arbitrary;
use triomphe::Arc;

use crate::ast::*;

/// The table every generated column belongs to
pub const TABLE: &str = "t";

/// The columns generated predicates may refer to: a nullable and a non-nullable column of each
/// of `INT` and `BOOL`.
pub fn schema() -> [Column; 4] {
    [
        Column::new(TABLE, "a", SqlType::Int, true),
        Column::new(TABLE, "b", SqlType::Int, false),
        Column::new(TABLE, "p", SqlType::Bool, true),
        Column::new(TABLE, "q", SqlType::Bool, false),
    ]
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Comparison {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl From<Comparison> for BinaryOperator {
    fn from(c: Comparison) -> Self {
        match c {
            Comparison::Equal => BinaryOperator::Equal,
            Comparison::NotEqual => BinaryOperator::NotEqual,
            Comparison::Greater => BinaryOperator::Greater,
            Comparison::GreaterOrEqual => BinaryOperator::GreaterOrEqual,
            Comparison::Less => BinaryOperator::Less,
            Comparison::LessOrEqual => BinaryOperator::LessOrEqual,
        }
    }
}

fn node(expr: Expr) -> ExprRef {
    Arc::new(expr)
}

fn column_of(ty: SqlType) -> BoxedStrategy<ExprRef> {
    let columns = schema()
        .into_iter()
        .filter(|c| c.ty == ty)
        .map(|c| node(Expr::Column(c)))
        .collect::<Vec<_>>();
    proptest::sample::select(columns).boxed()
}

fn null(ty: SqlType) -> ExprRef {
    node(Expr::Literal {
        value: Literal::Null,
        ty,
    })
}

fn int_literal() -> impl Strategy<Value = ExprRef> {
    (0i64..3).prop_map(|i| {
        node(Expr::Literal {
            value: Literal::Integer(i),
            ty: SqlType::Int,
        })
    })
}

/// An `INT`-typed leaf: a column, a small integer, or `NULL`
fn int_term() -> BoxedStrategy<ExprRef> {
    prop_oneof![
        3 => column_of(SqlType::Int),
        2 => int_literal(),
        1 => Just(null(SqlType::Int)),
    ]
    .boxed()
}

/// A `BOOL`-typed leaf: a column, a boolean literal, or `NULL`
fn bool_leaf() -> BoxedStrategy<ExprRef> {
    prop_oneof![
        3 => column_of(SqlType::Bool),
        2 => any::<bool>().prop_map(|b| node(Expr::Literal {
            value: Literal::Boolean(b),
            ty: SqlType::Bool,
        })),
        1 => Just(null(SqlType::Bool)),
    ]
    .boxed()
}

fn int_predicate() -> BoxedStrategy<ExprRef> {
    let in_item = prop_oneof![3 => int_literal().boxed(), 1 => Just(null(SqlType::Int)).boxed()];
    prop_oneof![
        (int_term(), any::<Comparison>(), int_term()).prop_map(|(lhs, op, rhs)| {
            node(Expr::BinaryOp {
                lhs,
                op: op.into(),
                rhs,
            })
        }),
        (int_term(), any::<bool>()).prop_map(|(rhs, is_null)| node(Expr::UnaryOp {
            op: if is_null {
                UnaryOperator::IsNull
            } else {
                UnaryOperator::IsNotNull
            },
            rhs,
        })),
        (int_term(), vec(in_item, 1..4), any::<bool>()).prop_map(|(lhs, values, negated)| {
            node(Expr::In {
                lhs,
                rhs: InValue::List(values),
                negated,
            })
        }),
        int_term().prop_map(|term| node(Expr::BinaryOp {
            lhs: term.clone(),
            op: BinaryOperator::Equal,
            rhs: term,
        })),
    ]
    .boxed()
}

/// A well-typed boolean predicate over the columns of [`schema`]
#[derive(Debug, Clone)]
pub struct Predicate(pub ExprRef);

impl Arbitrary for Predicate {
    type Parameters = ();
    type Strategy = BoxedStrategy<Predicate>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![bool_leaf(), int_predicate()]
            .prop_recursive(4, 24, 2, |inner| {
                prop_oneof![
                    inner.clone().prop_map(|rhs| node(Expr::UnaryOp {
                        op: UnaryOperator::Not,
                        rhs
                    })),
                    (inner.clone(), any::<bool>(), inner.clone()).prop_map(|(lhs, and, rhs)| {
                        node(Expr::BinaryOp {
                            lhs,
                            op: if and {
                                BinaryOperator::And
                            } else {
                                BinaryOperator::Or
                            },
                            rhs,
                        })
                    }),
                    (inner.clone(), any::<bool>(), inner.clone()).prop_map(|(lhs, eq, rhs)| {
                        node(Expr::BinaryOp {
                            lhs,
                            op: if eq {
                                BinaryOperator::Equal
                            } else {
                                BinaryOperator::NotEqual
                            },
                            rhs,
                        })
                    }),
                    inner.prop_map(|rhs| node(Expr::UnaryOp {
                        op: UnaryOperator::IsNull,
                        rhs
                    })),
                ]
            })
            .prop_map(Predicate)
            .boxed()
    }
}
