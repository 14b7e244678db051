use std::fmt;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use test_strategy::Arbitrary;
use triomphe::Arc;

use crate::ast::*;

/// A shared, immutable pointer to an expression node.
///
/// Passes return a clone of the pointer they were given when a subtree is left untouched, so
/// [`Arc::ptr_eq`] is a cheap and exact "did anything change" test.
pub type ExprRef = Arc<Expr>;

/// Unary operators, applied to the single operand of [`Expr::UnaryOp`]
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize, Arbitrary,
)]
pub enum UnaryOperator {
    /// `NOT`
    Not,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
    /// Arithmetic negation
    Negate,
    /// A value conversion to the given type (`CAST(x AS ty)`)
    Convert(SqlType),
}

impl UnaryOperator {
    /// Returns true for `IS NULL` and `IS NOT NULL`
    pub fn is_null_test(self) -> bool {
        matches!(self, UnaryOperator::IsNull | UnaryOperator::IsNotNull)
    }
}

/// Binary infix operators with [`Expr`] on both the left- and right-hand sides
///
/// `IN` is not a binary operator, since its right-hand side is a list or a subquery; see
/// [`Expr::In`].
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize, Arbitrary,
)]
pub enum BinaryOperator {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `COALESCE(lhs, rhs)`
    Coalesce,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
}

impl BinaryOperator {
    /// Returns true for `AND` and `OR`
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    /// Returns true for `=` and `<>`
    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Equal | BinaryOperator::NotEqual)
    }

    /// Returns true for the six comparison operators
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterOrEqual
                | BinaryOperator::Less
                | BinaryOperator::LessOrEqual
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }

    /// Returns the comparison operator that yields `NOT (a op b)` for non-null operands
    pub fn negate_comparison(self) -> Option<BinaryOperator> {
        Some(match self {
            BinaryOperator::Equal => BinaryOperator::NotEqual,
            BinaryOperator::NotEqual => BinaryOperator::Equal,
            BinaryOperator::Greater => BinaryOperator::LessOrEqual,
            BinaryOperator::GreaterOrEqual => BinaryOperator::Less,
            BinaryOperator::Less => BinaryOperator::GreaterOrEqual,
            BinaryOperator::LessOrEqual => BinaryOperator::Greater,
            _ => return None,
        })
    }

    /// Swaps `AND` and `OR`
    pub fn flip_logical(self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::And => Some(BinaryOperator::Or),
            BinaryOperator::Or => Some(BinaryOperator::And),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Coalesce => "COALESCE",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        };
        f.write_str(op)
    }
}

/// A single `WHEN condition THEN body` arm of a [`Expr::CaseWhen`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseWhenBranch {
    pub condition: ExprRef,
    pub body: ExprRef,
}

/// The right-hand side of an [`Expr::In`]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InValue {
    List(Vec<ExprRef>),
    Subquery(Subquery),
}

/// A nested query appearing inside an expression.
///
/// Two subqueries are equal only if they are the same allocation: equality (and hashing) never
/// descends into the query itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subquery(pub QueryRef);

impl Subquery {
    pub fn new(query: SelectSpecification) -> Self {
        Self(Arc::new(query))
    }

    pub fn query(&self) -> &QueryRef {
        &self.0
    }
}

impl From<QueryRef> for Subquery {
    fn from(query: QueryRef) -> Self {
        Self(query)
    }
}

impl PartialEq for Subquery {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Subquery {}

impl Hash for Subquery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(&*self.0, state)
    }
}

impl fmt::Display for Subquery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A relational scalar or boolean expression
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// A constant. [`Literal::Null`] is the null marker.
    Literal { value: Literal, ty: SqlType },

    /// A named placeholder whose value is supplied at execution time through
    /// [`ParameterValues`](crate::ParameterValues)
    Parameter { name: SqlIdentifier, ty: SqlType },

    Column(Column),

    UnaryOp { op: UnaryOperator, rhs: ExprRef },

    BinaryOp {
        lhs: ExprRef,
        op: BinaryOperator,
        rhs: ExprRef,
    },

    /// A function call, optionally on a receiver (`receiver.name(arguments)`)
    Call {
        receiver: Option<ExprRef>,
        name: SqlIdentifier,
        arguments: Vec<ExprRef>,
        ty: SqlType,
    },

    /// `CASE [operand] WHEN ... THEN ... [ELSE ...] END`
    ///
    /// With an operand, each branch condition is a value compared against the operand; without
    /// one, each condition is a predicate.
    CaseWhen {
        operand: Option<ExprRef>,
        branches: Vec<CaseWhenBranch>,
        else_expr: Option<ExprRef>,
    },

    /// `lhs [NOT] IN (...)`
    In {
        lhs: ExprRef,
        rhs: InValue,
        negated: bool,
    },

    /// `[NOT] EXISTS (subquery)`
    Exists { subquery: Subquery, negated: bool },

    /// A subquery used as a scalar value
    NestedSelect { subquery: Subquery, ty: SqlType },
}

impl Expr {
    /// Returns the static type of this expression
    pub fn ty(&self) -> SqlType {
        match self {
            Expr::Literal { ty, .. } | Expr::Parameter { ty, .. } => *ty,
            Expr::Column(column) => column.ty,
            Expr::UnaryOp { op, rhs } => match op {
                UnaryOperator::Not | UnaryOperator::IsNull | UnaryOperator::IsNotNull => {
                    SqlType::Bool
                }
                UnaryOperator::Negate => rhs.ty(),
                UnaryOperator::Convert(ty) => *ty,
            },
            Expr::BinaryOp { lhs, op, rhs } => {
                if op.is_logical() || op.is_comparison() {
                    SqlType::Bool
                } else {
                    lhs.ty().unify(rhs.ty())
                }
            }
            Expr::Call { ty, .. } | Expr::NestedSelect { ty, .. } => *ty,
            Expr::CaseWhen {
                branches,
                else_expr,
                ..
            } => branches
                .iter()
                .map(|b| &b.body)
                .chain(else_expr)
                .fold(SqlType::Unknown, |acc, e| acc.unify(e.ty())),
            Expr::In { .. } | Expr::Exists { .. } => SqlType::Bool,
        }
    }

    /// If this is a boolean literal, returns its value
    pub fn as_bool_literal(&self) -> Option<bool> {
        match self {
            Expr::Literal { value, .. } => value.as_bool(),
            _ => None,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal {
                value: Literal::Null,
                ..
            }
        )
    }

    /// If this is `NOT x`, returns `x`
    pub fn as_not(&self) -> Option<&ExprRef> {
        match self {
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                rhs,
            } => Some(rhs),
            _ => None,
        }
    }

    pub fn as_column(&self) -> Option<&Column> {
        match self {
            Expr::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Whether this node needs parentheses when it appears as the operand of another operator
    fn needs_parens(&self) -> bool {
        match self {
            Expr::BinaryOp { op, .. } => *op != BinaryOperator::Coalesce,
            Expr::UnaryOp { op, .. } => !matches!(op, UnaryOperator::Convert(_)),
            Expr::In { .. } => true,
            _ => false,
        }
    }
}

struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.needs_parens() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value, .. } => write!(f, "{value}"),
            Expr::Parameter { name, .. } => write!(f, "@{name}"),
            Expr::Column(column) => write!(f, "{column}"),
            Expr::UnaryOp { op, rhs } => {
                let rhs = Operand(rhs);
                match op {
                    UnaryOperator::Not => write!(f, "NOT {rhs}"),
                    UnaryOperator::IsNull => write!(f, "{rhs} IS NULL"),
                    UnaryOperator::IsNotNull => write!(f, "{rhs} IS NOT NULL"),
                    UnaryOperator::Negate => write!(f, "-{rhs}"),
                    UnaryOperator::Convert(ty) => write!(f, "CAST({} AS {ty})", rhs.0),
                }
            }
            Expr::BinaryOp {
                lhs,
                op: BinaryOperator::Coalesce,
                rhs,
            } => write!(f, "COALESCE({lhs}, {rhs})"),
            Expr::BinaryOp { lhs, op, rhs } => {
                write!(f, "{} {op} {}", Operand(lhs), Operand(rhs))
            }
            Expr::Call {
                receiver,
                name,
                arguments,
                ..
            } => {
                if let Some(receiver) = receiver {
                    write!(f, "{}.", Operand(receiver))?;
                }
                write!(f, "{name}({})", arguments.iter().join(", "))
            }
            Expr::CaseWhen {
                operand,
                branches,
                else_expr,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for branch in branches {
                    write!(f, " WHEN {} THEN {}", branch.condition, branch.body)?;
                }
                if let Some(else_expr) = else_expr {
                    write!(f, " ELSE {else_expr}")?;
                }
                f.write_str(" END")
            }
            Expr::In { lhs, rhs, negated } => {
                write!(f, "{}", Operand(lhs))?;
                if *negated {
                    f.write_str(" NOT")?;
                }
                match rhs {
                    InValue::List(values) => write!(f, " IN ({})", values.iter().join(", ")),
                    InValue::Subquery(subquery) => write!(f, " IN ({subquery})"),
                }
            }
            Expr::Exists { subquery, negated } => {
                if *negated {
                    f.write_str("NOT ")?;
                }
                write!(f, "EXISTS ({subquery})")
            }
            Expr::NestedSelect { subquery, .. } => write!(f, "({subquery})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, ty: SqlType) -> ExprRef {
        Arc::new(Expr::Column(Column::new("t", name, ty, true)))
    }

    fn int(i: i64) -> ExprRef {
        Arc::new(Expr::Literal {
            value: Literal::Integer(i),
            ty: SqlType::Int,
        })
    }

    #[test]
    fn display_parenthesizes_nested_operators() {
        let expr = Expr::BinaryOp {
            lhs: Arc::new(Expr::BinaryOp {
                lhs: column("a", SqlType::Int),
                op: BinaryOperator::Greater,
                rhs: int(5),
            }),
            op: BinaryOperator::And,
            rhs: Arc::new(Expr::UnaryOp {
                op: UnaryOperator::IsNull,
                rhs: column("b", SqlType::Text),
            }),
        };
        assert_eq!(expr.to_string(), "(t.a > 5) AND (t.b IS NULL)");
    }

    #[test]
    fn display_in_list() {
        let expr = Expr::In {
            lhs: column("a", SqlType::Int),
            rhs: InValue::List(vec![int(1), int(2)]),
            negated: true,
        };
        assert_eq!(expr.to_string(), "t.a NOT IN (1, 2)");
    }

    #[test]
    fn arithmetic_types_widen() {
        let expr = Expr::BinaryOp {
            lhs: column("a", SqlType::Double),
            op: BinaryOperator::Add,
            rhs: int(1),
        };
        assert_eq!(expr.ty(), SqlType::Double);
    }

    #[test]
    fn case_type_comes_from_branch_bodies() {
        let expr = Expr::CaseWhen {
            operand: None,
            branches: vec![CaseWhenBranch {
                condition: column("flag", SqlType::Bool),
                body: Arc::new(Expr::Literal {
                    value: Literal::Null,
                    ty: SqlType::Unknown,
                }),
            }],
            else_expr: Some(column("name", SqlType::Text)),
        };
        assert_eq!(expr.ty(), SqlType::Text);
    }

    #[test]
    fn subqueries_compare_by_identity() {
        let a = Subquery::new(SelectSpecification::Simple(SelectStatement::default()));
        let b = Subquery::new(SelectSpecification::Simple(SelectStatement::default()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn comparison_negation_round_trips() {
        for op in [
            BinaryOperator::Equal,
            BinaryOperator::NotEqual,
            BinaryOperator::Greater,
            BinaryOperator::GreaterOrEqual,
            BinaryOperator::Less,
            BinaryOperator::LessOrEqual,
        ] {
            let negated = op.negate_comparison().unwrap();
            assert_eq!(negated.negate_comparison(), Some(op));
        }
        assert_eq!(BinaryOperator::Add.negate_comparison(), None);
    }
}
