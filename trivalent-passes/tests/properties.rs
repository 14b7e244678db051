mod common;

use common::{eval, rows, Logic, Value};
use proptest::prelude::*;
use test_strategy::proptest;
use trivalent_expr::arbitrary::{schema, Predicate};
use trivalent_expr::{ExprRef, ParameterValues, TypedExprFactory};
use trivalent_passes::{NullSemantics, NullSemanticsRewriter, RewriteOptions, SimplifyExpressions};

const NATIVE: RewriteOptions = RewriteOptions {
    use_relational_nulls: true,
};

#[proptest]
fn rewrite_matches_two_valued_semantics(predicate: Predicate) {
    let Predicate(expr) = predicate;
    let f = TypedExprFactory;
    let parameters = ParameterValues::new();
    let mut rewriter = NullSemanticsRewriter::new(&f, &parameters, RewriteOptions::default());
    let scalar = rewriter.rewrite_scalar(&expr).unwrap();
    let filter = rewriter.rewrite_predicate(&expr).unwrap();
    prop_assert!(rewriter.can_cache());

    for row in rows(&schema()) {
        let expected = eval(&expr, &row, Logic::TwoValued);
        prop_assert_eq!(
            eval(&scalar, &row, Logic::ThreeValued),
            expected,
            "{} rewritten as {} at {:?}",
            expr,
            scalar,
            row
        );
        prop_assert_eq!(
            eval(&filter, &row, Logic::ThreeValued) == Value::Bool(true),
            expected == Value::Bool(true),
            "{} rewritten as {} at {:?}",
            expr,
            filter,
            row
        );
    }
}

#[proptest]
fn native_rewrite_is_idempotent(predicate: Predicate) {
    let Predicate(expr) = predicate;
    let parameters = ParameterValues::new();
    let once = expr
        .rewrite_null_semantics(&TypedExprFactory, &parameters, NATIVE)
        .unwrap()
        .query;
    let twice = once
        .rewrite_null_semantics(&TypedExprFactory, &parameters, NATIVE)
        .unwrap()
        .query;
    prop_assert!(ExprRef::ptr_eq(&once, &twice), "{} became {}", once, twice);
}

#[proptest]
fn simplification_preserves_three_valued_semantics(predicate: Predicate, native: bool) {
    let Predicate(expr) = predicate;
    let options = RewriteOptions {
        use_relational_nulls: native,
    };
    let simplified = expr
        .simplify_expressions(&TypedExprFactory, options)
        .unwrap();
    for row in rows(&schema()) {
        prop_assert_eq!(
            eval(&simplified, &row, Logic::ThreeValued),
            eval(&expr, &row, Logic::ThreeValued),
            "{} simplified to {} at {:?}",
            expr,
            simplified,
            row
        );
    }
}

#[proptest]
fn simplification_reaches_a_fixed_point(predicate: Predicate, native: bool) {
    let Predicate(expr) = predicate;
    let options = RewriteOptions {
        use_relational_nulls: native,
    };
    let once = expr
        .simplify_expressions(&TypedExprFactory, options)
        .unwrap();
    let twice = once
        .simplify_expressions(&TypedExprFactory, options)
        .unwrap();
    prop_assert!(ExprRef::ptr_eq(&once, &twice), "{} became {}", once, twice);
}

#[proptest]
fn rewrite_then_simplify_matches_two_valued_semantics(predicate: Predicate) {
    let Predicate(expr) = predicate;
    let rewritten = expr
        .rewrite_null_semantics(
            &TypedExprFactory,
            &ParameterValues::new(),
            RewriteOptions::default(),
        )
        .unwrap()
        .query
        .simplify_expressions(&TypedExprFactory, RewriteOptions::default())
        .unwrap();
    for row in rows(&schema()) {
        prop_assert_eq!(
            eval(&rewritten, &row, Logic::ThreeValued) == Value::Bool(true),
            eval(&expr, &row, Logic::TwoValued) == Value::Bool(true),
            "{} became {} at {:?}",
            expr,
            rewritten,
            row
        );
    }
}
