//! Algebraic simplification of boolean expressions.
//!
//! The null-semantics rewrite is deliberately naive about what it builds, leaving behind constant
//! operands, double negations and redundant null checks. The passes here clean those up.

mod merge;
mod simplify;

pub use self::simplify::SimplifyExpressions;
