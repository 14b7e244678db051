//! Reference evaluators for expression trees over a single row.
//!
//! Two logics are provided: SQL's three-valued logic, which is what a database does with a
//! rewritten tree, and the eager two-valued logic in which `NULL = NULL` is true, which is what
//! the tree meant before rewriting.

#![allow(dead_code)]

use std::collections::HashMap;

use itertools::Itertools;
use trivalent_expr::{
    BinaryOperator, Column, Expr, InValue, Literal, SqlIdentifier, SqlType, UnaryOperator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
}

impl Value {
    fn is_null(self) -> bool {
        self == Value::Null
    }

    fn as_bool(self) -> Option<bool> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b),
            Value::Int(i) => panic!("expected a boolean, got {i}"),
        }
    }

    fn from_bool(b: Option<bool>) -> Value {
        b.map_or(Value::Null, Value::Bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    /// SQL semantics: any comparison involving `NULL` is `NULL`
    ThreeValued,
    /// `=`, `<>` and `IN` treat `NULL` as an ordinary value equal only to itself
    TwoValued,
}

/// Values for each column, by name
pub type Row = HashMap<SqlIdentifier, Value>;

fn domain(column: &Column) -> Vec<Value> {
    let mut values = match column.ty {
        SqlType::Bool => vec![Value::Bool(false), Value::Bool(true)],
        SqlType::Int => vec![Value::Int(0), Value::Int(1), Value::Int(2)],
        ty => panic!("no test domain for {ty}"),
    };
    if column.nullable {
        values.push(Value::Null);
    }
    values
}

/// Every assignment of values to `columns`, respecting their types and nullability
pub fn rows(columns: &[Column]) -> Vec<Row> {
    columns
        .iter()
        .map(|c| domain(c).into_iter().map(move |v| (c.name.clone(), v)))
        .multi_cartesian_product()
        .map(|assignment| assignment.into_iter().collect())
        .collect()
}

fn kleene_and(l: Value, r: Value) -> Value {
    match (l.as_bool(), r.as_bool()) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn kleene_or(l: Value, r: Value) -> Value {
    match (l.as_bool(), r.as_bool()) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn compare(l: Value, op: BinaryOperator, r: Value, logic: Logic) -> Value {
    if l.is_null() || r.is_null() {
        return match (logic, op) {
            (Logic::TwoValued, BinaryOperator::Equal) => Value::Bool(l == r),
            (Logic::TwoValued, BinaryOperator::NotEqual) => Value::Bool(l != r),
            _ => Value::Null,
        };
    }
    assert_eq!(
        std::mem::discriminant(&l),
        std::mem::discriminant(&r),
        "comparing {l:?} with {r:?}"
    );
    Value::Bool(match op {
        BinaryOperator::Equal => l == r,
        BinaryOperator::NotEqual => l != r,
        BinaryOperator::Greater => l > r,
        BinaryOperator::GreaterOrEqual => l >= r,
        BinaryOperator::Less => l < r,
        BinaryOperator::LessOrEqual => l <= r,
        _ => unreachable!("{op} is not a comparison"),
    })
}

fn arithmetic(l: Value, op: BinaryOperator, r: Value) -> Value {
    let (Value::Int(l), Value::Int(r)) = (l, r) else {
        return Value::Null;
    };
    match op {
        BinaryOperator::Add => Value::Int(l + r),
        BinaryOperator::Subtract => Value::Int(l - r),
        BinaryOperator::Multiply => Value::Int(l * r),
        BinaryOperator::Divide if r != 0 => Value::Int(l / r),
        BinaryOperator::Modulo if r != 0 => Value::Int(l % r),
        _ => Value::Null,
    }
}

/// Evaluate `expr` against `row`
pub fn eval(expr: &Expr, row: &Row, logic: Logic) -> Value {
    match expr {
        Expr::Literal { value, .. } => match value {
            Literal::Null => Value::Null,
            Literal::Boolean(b) => Value::Bool(*b),
            Literal::Integer(i) => Value::Int(*i),
            Literal::String(s) => panic!("no test value for string {s:?}"),
        },
        Expr::Column(column) => *row
            .get(&column.name)
            .unwrap_or_else(|| panic!("no value for {column}")),
        Expr::Parameter { name, .. } => panic!("unbound parameter {name}"),
        Expr::UnaryOp { op, rhs } => {
            let v = eval(rhs, row, logic);
            match op {
                UnaryOperator::Not => Value::from_bool(v.as_bool().map(|b| !b)),
                UnaryOperator::IsNull => Value::Bool(v.is_null()),
                UnaryOperator::IsNotNull => Value::Bool(!v.is_null()),
                UnaryOperator::Negate => match v {
                    Value::Int(i) => Value::Int(-i),
                    v => v,
                },
                UnaryOperator::Convert(_) => v,
            }
        }
        Expr::BinaryOp { lhs, op, rhs } => {
            let l = eval(lhs, row, logic);
            let r = eval(rhs, row, logic);
            match op {
                BinaryOperator::And => kleene_and(l, r),
                BinaryOperator::Or => kleene_or(l, r),
                BinaryOperator::Coalesce => {
                    if l.is_null() {
                        r
                    } else {
                        l
                    }
                }
                op if op.is_comparison() => compare(l, *op, r, logic),
                op => arithmetic(l, *op, r),
            }
        }
        Expr::CaseWhen {
            operand,
            branches,
            else_expr,
        } => {
            let operand = operand.as_ref().map(|o| eval(o, row, logic));
            for branch in branches {
                let condition = eval(&branch.condition, row, logic);
                let taken = match operand {
                    Some(operand) => {
                        compare(operand, BinaryOperator::Equal, condition, Logic::ThreeValued)
                    }
                    None => condition,
                };
                if taken == Value::Bool(true) {
                    return eval(&branch.body, row, logic);
                }
            }
            else_expr
                .as_ref()
                .map_or(Value::Null, |e| eval(e, row, logic))
        }
        Expr::In {
            lhs,
            rhs: InValue::List(values),
            negated,
        } => {
            let item = eval(lhs, row, logic);
            let values = values.iter().map(|v| eval(v, row, logic)).collect_vec();
            let found = match logic {
                Logic::TwoValued => Value::Bool(values.contains(&item)),
                Logic::ThreeValued => {
                    if values.is_empty() {
                        Value::Bool(false)
                    } else if item.is_null() {
                        Value::Null
                    } else if values.contains(&item) {
                        Value::Bool(true)
                    } else if values.iter().any(|v| v.is_null()) {
                        Value::Null
                    } else {
                        Value::Bool(false)
                    }
                }
            };
            if *negated {
                Value::from_bool(found.as_bool().map(|b| !b))
            } else {
                found
            }
        }
        Expr::Call { .. }
        | Expr::In {
            rhs: InValue::Subquery(_),
            ..
        }
        | Expr::Exists { .. }
        | Expr::NestedSelect { .. } => panic!("cannot evaluate {expr}"),
    }
}
