//! Error handling, definitions, and utilities for the trivalent rewriting passes.
//!
//! Every failure surfaced by the passes indicates a contract violation by whoever built the tree
//! being rewritten; none of them are retried or recovered from inside this workspace.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// General error type returned by the expression factory and the rewriting passes.
#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    /// A node was built or visited in a way its contract forbids
    #[error("Invariant violated: {0}")]
    Internal(String),

    /// Well-formed input that the passes do not handle
    #[error("Not supported: {0}")]
    Unsupported(String),

    /// A join was constructed with an `ON` predicate whose shape the null-semantics rewriter
    /// can't reason about.
    #[error("Unsupported join predicate `{predicate}`")]
    InvalidJoinPredicate {
        /// The rendered predicate
        predicate: String,
    },

    /// A parameter referenced by the tree has no entry in the parameter value table.
    #[error("No value supplied for parameter '{name}'")]
    UnknownParameter {
        /// The name of the parameter
        name: String,
    },

    /// The expression factory refused to build a node because its operands have incompatible
    /// types.
    #[error("Cannot apply {op} to operands of type {lhs} and {rhs}")]
    TypeMismatch {
        /// The rendered operator
        op: String,
        /// The type of the left (or only) operand
        lhs: String,
        /// The type of the right operand, or `-` for unary operators
        rhs: String,
    },
}

impl RewriteError {
    /// Returns `true` if the error is [`RewriteError::Internal`].
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

pub type RewriteResult<T> = ::std::result::Result<T, RewriteError>;

/// Make a new [`RewriteError::Internal`] with the provided string-able argument.
pub fn internal_err<T: Into<String>>(err: T) -> RewriteError {
    RewriteError::Internal(err.into())
}

/// Make a new [`RewriteError::Unsupported`] with the provided string-able argument.
pub fn unsupported_err<T: Into<String>>(err: T) -> RewriteError {
    RewriteError::Unsupported(err.into())
}

/// The `file:line:column` of the macro call site, formatted into `$fstr`, in debug builds only
#[doc(hidden)]
#[macro_export]
macro_rules! __location_info {
    () => {
        $crate::__location_info!(" (at {})")
    };
    ($fstr: literal) => {
        if cfg!(debug_assertions) {
            format!(
                $fstr,
                format_args!("{}:{}:{}", std::file!(), std::line!(), std::column!())
            )
        } else {
            String::new()
        }
    };
}

/// Build a [`RewriteError::Internal`] from a format string, prefixed with the call site in debug
/// builds.
#[macro_export]
macro_rules! internal_err {
    ($($tt:tt)*) => {
        $crate::internal_err(format!(
            "{}{}",
            $crate::__location_info!("at {}: "),
            format_args!($($tt)*)
        ))
    };
}

/// `return Err(internal_err!(...))`. With no arguments, reports unreachable code.
#[macro_export]
macro_rules! internal {
    () => {
        $crate::internal!("reached code that should be unreachable")
    };
    ($($tt:tt)*) => {
        return Err($crate::internal_err!($($tt)*).into())
    };
}

/// `return Err(RewriteError::Unsupported(..))` with a formatted message
#[macro_export]
macro_rules! unsupported {
    () => {
        $crate::unsupported!("not supported")
    };
    ($($tt:tt)*) => {
        return Err($crate::unsupported_err(format!(
            "{}{}",
            format_args!($($tt)*),
            $crate::__location_info!()
        )).into())
    };
}

/// Return an internal error unless `$expr` holds. The optional trailing arguments format the
/// message; without them the stringified condition is reported.
#[macro_export]
macro_rules! invariant {
    ($expr:expr, $($tt:tt)*) => {
        if !$expr {
            $crate::internal!($($tt)*);
        }
    };
    ($expr:expr) => {
        if !$expr {
            $crate::internal!("invariant `{}` does not hold", std::stringify!($expr));
        }
    };
}
