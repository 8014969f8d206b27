//! End-to-end checks of the native backend: parse, differentiate, simplify,
//! compile.

use approx::assert_relative_eq;
use phyz_expr::{
    BackendConfig, Expr, ExprError, ExprMatrix, NativeBackend, Substitution, Symbol,
    SymbolicBackend,
};

fn parse(s: &str) -> Expr {
    s.parse().unwrap()
}

#[test]
fn test_parse_simplify_agrees_with_construction() {
    let backend = NativeBackend::default();
    let parsed = parse("(a*sin(u))^2 + a^2*cos(u)^2");
    let simplified = backend.simplify(&parsed).unwrap();
    assert_eq!(simplified, backend.simplify(&parse("a**2")).unwrap());
}

#[test]
fn test_derivative_of_quotient() {
    let backend = NativeBackend::default();
    let x = Symbol::new("x");
    // d/dx x/(1 + x^2) = (1 - x^2)/(1 + x^2)^2
    let f = parse("x/(1 + x^2)");
    let d = backend.differentiate(&f, &x);
    let expected = parse("(1 - x^2)/(1 + x^2)^2");
    assert!(backend.simplify(&(d - expected)).unwrap().is_zero());
}

#[test]
fn test_hyperbolic_derivative_identity() {
    let backend = NativeBackend::default();
    let t = Symbol::new("t");
    // d/dt tanh-like ratio sinh/cosh = 1/cosh^2
    let f = parse("sinh(t)/cosh(t)");
    let d = backend.differentiate(&f, &t);
    assert!(backend.simplify(&(d - parse("cosh(t)^-2"))).unwrap().is_zero());
}

#[test]
fn test_substitute_then_compile() {
    let backend = NativeBackend::default();
    let x = Symbol::new("x");
    let e = parse("r*cos(x) + r^2");
    let fixed = backend.substitute(&e, &Substitution::new().with("r", 2));
    assert!(!fixed.contains(&Symbol::new("r")));

    let f = backend.compile(&[fixed], &[x]).unwrap();
    let mut out = [0.0];
    f(&[0.3], &mut out);
    assert_relative_eq!(out[0], 2.0 * 0.3_f64.cos() + 4.0, epsilon = 1e-14);
}

#[test]
fn test_compile_rejects_free_symbol() {
    let backend = NativeBackend::default();
    let err = backend
        .compile(&[parse("x + k")], &[Symbol::new("x")])
        .err()
        .unwrap();
    assert_eq!(err, ExprError::UnboundSymbol("k".into()));
}

#[test]
fn test_inverse_times_matrix_is_identity() {
    let backend = NativeBackend::default();
    let m = ExprMatrix::from_rows(vec![
        vec![parse("1 + x^2"), parse("x*y")],
        vec![parse("x*y"), parse("1 + y^2")],
    ])
    .unwrap();
    let inv = backend.inverse(&m).unwrap();
    for i in 0..2 {
        for j in 0..2 {
            let prod = Expr::sum((0..2).map(|k| &m[(i, k)] * &inv[(k, j)]));
            let expected = if i == j { Expr::one() } else { Expr::zero() };
            assert!(backend.simplify(&(prod - expected)).unwrap().is_zero());
        }
    }
}

#[test]
fn test_term_budget_is_an_error_not_a_panic() {
    let backend = NativeBackend::new(BackendConfig::default().max_terms(10));
    let e = parse("(a + b + c + d)^4");
    assert!(matches!(
        backend.simplify(&e),
        Err(ExprError::TooComplex { limit: 10, .. })
    ));
}
