//! Immutable expression trees for relational queries.
//!
//! Trees are built once by upstream translation and then handed, unchanged, through the rewriting
//! passes in `trivalent-passes`. Every node lives behind a [`triomphe::Arc`], so a pass that has
//! nothing to change returns the very same pointer it was given and callers can detect the no-op
//! with [`ExprRef::ptr_eq`](triomphe::Arc::ptr_eq) instead of a deep comparison.
//!
//! New compound nodes should be built through an [`ExprFactory`], which infers result types and
//! rejects operators applied to operands of incompatible types.

pub mod arbitrary;
pub mod ast;
mod factory;
mod parameters;

pub use crate::ast::*;
pub use crate::factory::{ExprFactory, TypedExprFactory};
pub use crate::parameters::{ParameterValue, ParameterValues};
