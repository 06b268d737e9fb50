use msbuild_expr::{
    evaluate, evaluate_permutations, EvalError, EvaluationContextExt, Expression, PropertyTable,
    PropertyValue,
};
use pretty_assertions::assert_eq;

fn substitution_context() -> PropertyTable {
    [("Foo", "XfooX"), ("Bar", "YbarY")].into_iter().collect()
}

fn permutation_context() -> PropertyTable {
    let mut ctx = PropertyTable::new();
    ctx.define(
        "Foo",
        PropertyValue::from_candidates(["One", "Two", "Three"]).unwrap(),
    );
    ctx.define("Bar", "Hello $(Baz)");
    ctx.define("Baz", PropertyValue::from_candidates(["X", "Y"]).unwrap());
    ctx
}

#[test]
fn evaluates_simple_substitutions() {
    let ctx = substitution_context();
    let cases = [
        (r"Hello\Bye.targets", r"Hello\Bye.targets"),
        ("$(Foo)", "XfooX"),
        (r"Hello\$(Foo).targets", r"Hello\XfooX.targets"),
        (r"Hello\$(Foo).$(Bar)", r"Hello\XfooX.YbarY"),
    ];
    for (expr, expected) in cases {
        assert_eq!(ctx.evaluate(expr).unwrap(), expected, "evaluating {}", expr);
    }
}

#[test]
fn literal_passes_through_empty_context() {
    let ctx = PropertyTable::new();
    assert_eq!(ctx.evaluate(r"Hello\Bye.targets").unwrap(), r"Hello\Bye.targets");
}

#[test]
fn evaluates_recursively_to_fixpoint() {
    let ctx: PropertyTable = [("Foo", "$(Bar)"), ("Bar", "Hello $(Baz)"), ("Baz", "World")]
        .into_iter()
        .collect();
    assert_eq!(ctx.evaluate("$(Foo)").unwrap(), "Hello World");
}

#[test]
fn endless_recursion_fails() {
    let ctx: PropertyTable = [("Foo", "$(Bar)"), ("Bar", "Hello $(Baz)"), ("Baz", "$(Foo)")]
        .into_iter()
        .collect();
    let err = ctx.evaluate("$(Foo)").unwrap_err();
    assert!(matches!(err, EvalError::CircularReference { .. }));
    assert_eq!(err.property(), "Foo");
    assert_eq!(
        err.to_string(),
        "circular reference to property 'Foo' (Foo -> Bar -> Baz -> Foo)"
    );

    // Permutation evaluation sees the same cycle.
    assert!(ctx.evaluate_permutations("$(Foo)").is_err());
}

#[test]
fn permuted_evaluation() {
    let ctx = permutation_context();
    let cases: [(&str, &[&str]); 4] = [
        ("$(Foo)", &["One", "Two", "Three"]),
        ("$(Foo) Thing", &["One Thing", "Two Thing", "Three Thing"]),
        ("X$(Foo)X", &["XOneX", "XTwoX", "XThreeX"]),
        ("$(Bar)", &["Hello X", "Hello Y"]),
    ];
    for (expr, expected) in cases {
        let results = ctx.evaluate_permutations(expr).unwrap().to_vec();
        assert_eq!(results, expected, "permuting {}", expr);
    }
}

#[test]
fn permutation_count_is_product_of_candidates() {
    let ctx = permutation_context();
    let results = ctx.evaluate_permutations("$(Foo)/$(Bar)/$(Baz)").unwrap().to_vec();
    assert_eq!(results.len(), 3 * 2 * 2);
    assert_eq!(results[0], "One/Hello X/X");
    assert_eq!(results[1], "One/Hello X/Y");
    assert_eq!(results[11], "Three/Hello Y/Y");
}

#[test]
fn scalar_evaluation_takes_first_candidates() {
    let ctx = permutation_context();
    assert_eq!(ctx.evaluate("$(Foo) $(Bar)").unwrap(), "One Hello X");
}

#[test]
fn parsed_expressions_can_be_reused() {
    let ctx = permutation_context();
    let expr = Expression::parse("[$(Baz)]");
    assert_eq!(evaluate(&expr, &ctx).unwrap(), "[X]");
    let perms = evaluate_permutations(&expr, &ctx).unwrap();
    assert_eq!(perms.to_vec(), ["[X]", "[Y]"]);
    assert_eq!(perms.expression(), &expr);
}
