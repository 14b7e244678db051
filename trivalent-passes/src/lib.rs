//! Rewriting passes over trivalent expression trees.
//!
//! Two passes are provided, meant to run in sequence:
//!
//! 1. [`NullSemantics`] rewrites comparisons written with two-valued ("`NULL = NULL` is true")
//!    semantics into trees which produce the same answers under SQL's three-valued logic, and
//!    reports whether the result may be cached across parameter values.
//! 2. [`SimplifyExpressions`] folds constants and normalizes negation in the result.
//!
//! [`optimize_query`] runs both.

use clap::Args;
use tracing::{trace, trace_span};
use trivalent_errors::RewriteResult;
use trivalent_expr::{ExprFactory, ParameterValues, QueryRef};

pub mod expr;
mod in_list;
mod null_semantics;

pub use crate::expr::SimplifyExpressions;
pub use crate::in_list::{normalize_in_list, NormalizedInList};
pub use crate::null_semantics::{NullSemantics, NullSemanticsRewriter};

/// Options controlling how expressions are rewritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Args)]
#[group(id = "rewrite")]
pub struct RewriteOptions {
    /// Keep the database's native three-valued NULL semantics, rather than rewriting comparisons
    /// so that `NULL = NULL` is true.
    #[arg(long, env = "USE_RELATIONAL_NULLS")]
    pub use_relational_nulls: bool,
}

/// The result of rewriting a tree whose output may depend on runtime parameter values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten<T> {
    pub query: T,
    /// `false` if the rewrite inspected the value bound to some parameter, in which case `query`
    /// is only valid for that particular set of parameter values
    pub can_cache: bool,
}

/// Run the null-semantics rewrite followed by expression simplification over `query`
pub fn optimize_query<F: ExprFactory>(
    query: &QueryRef,
    factory: &F,
    parameters: &ParameterValues,
    options: RewriteOptions,
) -> RewriteResult<Rewritten<QueryRef>> {
    let span = trace_span!(
        "optimize_query",
        use_relational_nulls = options.use_relational_nulls
    )
    .entered();
    trace!(query_pre = %query, "Optimizing query");

    let Rewritten { query, can_cache } =
        query.rewrite_null_semantics(factory, parameters, options)?;
    trace!(parent: &span, pass = "null_semantics", %query, can_cache);

    let query = query.simplify_expressions(factory, options)?;
    trace!(parent: &span, pass = "simplify_expressions", %query);

    trace!(query_post = %query, "Query optimized");
    Ok(Rewritten { query, can_cache })
}
