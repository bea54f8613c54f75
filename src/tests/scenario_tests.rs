//! End-to-end scenarios: construction, substitution, differentiation,
//! normalization and compilation of the same expressions.

#![allow(clippy::unwrap_used, reason = "Standard test relaxations")]

use crate::matrix::{self, Matrix};
use crate::{Domain, ErrorKind, Expr, HostType, Number, Value};

fn reals() -> (Expr, Expr) {
    (
        Expr::symbol("x", Domain::Reals),
        Expr::symbol("y", Domain::Reals),
    )
}

// ============================================================
// Canonical construction
// ============================================================

#[test]
fn test_commuting_operands_are_one_instance() {
    let (x, y) = reals();
    assert_eq!(&x + &y, &y + &x);
    assert_eq!(&x * &y, &y * &x);
    assert_eq!(2.0 * &x, &x * 2.0);
}

#[test]
fn test_like_terms_and_factors_are_collected() {
    let (x, y) = reals();
    assert_eq!(&x + &y + &y + &x + &y, 2 * &x + 3 * &y);
    assert_eq!(&x * &x * &y * &y * &y, x.powi(2) * y.powi(3));
}

#[test]
fn test_substitution_cancels_to_zero() {
    let (x, y) = reals();
    let e = 2 * &x + 3 * &y;
    let zero = e
        .substitute(&[(x, Expr::int(3)), (y, Expr::int(-2))])
        .unwrap();
    assert!(zero.is_zero());
    assert_eq!(zero, Expr::zero());
}

#[test]
fn test_summation_substituted_into_summation() {
    let (x, y) = reals();
    let t = Expr::indexed_sum(1, 3, |j| Ok(j * &y)).unwrap();
    let s = Expr::indexed_sum(1, 3, |i| Ok(i * &x)).unwrap();
    let nested = t.substitute(&[(y, s)]).unwrap();
    // (1 + 2 + 3) * (1 + 2 + 3) * x
    assert_eq!(nested.normalize().unwrap(), 36 * &x);
}

// ============================================================
// Differentiation
// ============================================================

#[test]
fn test_partial_derivatives_of_mixed_expression() {
    let (x, y) = reals();
    let e = 3 * (2 * &x).sin() + y.powi(2) + &x / &y;

    let dx = e.derive(&x).unwrap().normalize().unwrap();
    let expected_dx = 6 * (2 * &x).cos() + 1 / &y;
    assert_eq!(dx, expected_dx.normalize().unwrap());

    let dy = e.derive(&y).unwrap().normalize().unwrap();
    let expected_dy = 2 * &y - &x / y.powi(2);
    assert_eq!(dy, expected_dy.normalize().unwrap());
}

#[test]
fn test_gradient_matches_single_derivatives() {
    let (x, y) = reals();
    let e = &x * &y + x.exp();
    let gradient = e.gradient(&[x.clone(), y.clone()]).unwrap();
    assert_eq!(gradient, vec![e.derive(&x).unwrap(), e.derive(&y).unwrap()]);
}

// ============================================================
// Compilation against interpretation
// ============================================================

#[test]
fn test_compiled_power_quotient() {
    let (x, y) = reals();
    let e = x.powi(3) / &x * &y;

    let interpreted = e
        .substitute(&[(x.clone(), Expr::int(3)), (y.clone(), Expr::int(2))])
        .unwrap()
        .normalize()
        .unwrap();
    assert_eq!(interpreted.as_number(), Some(Number::Int(18)));

    let f = e.compile(&[x, y]).unwrap();
    assert_eq!(f.evaluate(&[Value::Int(3), Value::Int(2)]).unwrap(), Value::Int(18));
}

#[test]
fn test_array_element_binding() {
    let x = Expr::symbol("x", Domain::of(&HostType::array(HostType::Integer)));
    let y = Expr::symbol("y", Domain::Integers);
    let e = 2 * x.at([&y + 1]).unwrap();

    let array = Expr::constant(Value::ints([123, 111]));
    let interpreted = e
        .substitute(&[(x.clone(), array), (y.clone(), Expr::int(0))])
        .unwrap()
        .normalize()
        .unwrap();
    assert_eq!(interpreted, Expr::int(222));

    let f = e.compile(&[x, y]).unwrap();
    let result = f
        .evaluate(&[Value::ints([123, 111]), Value::Int(-1)])
        .unwrap();
    assert_eq!(result, Value::Int(246));
}

#[test]
fn test_out_of_range_index_fails_at_call_time() {
    let x = Expr::symbol("x", Domain::of(&HostType::array(HostType::Integer)));
    let y = Expr::symbol("y", Domain::Integers);
    let f = x.at([y.clone()]).unwrap().compile(&[x, y]).unwrap();
    let err = f.evaluate(&[Value::ints([1]), Value::Int(4)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MemberResolution);
}

#[test]
fn test_cancelled_matrix_chain_inside_sum() {
    let a = Expr::symbol("A", Domain::Matrices);
    let b = Expr::symbol("B", Domain::Matrices);
    let chain = matrix::multiply(vec![a.clone(), matrix::inverse(a.clone()).unwrap()]).unwrap();
    let e = Expr::sum([chain, b.clone()]).unwrap();

    let a_value = Matrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
    let b_value = Matrix::identity(2, 2);
    let expected = Matrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]);

    let interpreted = e
        .substitute(&[
            (a.clone(), Expr::constant(Value::from(a_value.clone()))),
            (b.clone(), Expr::constant(Value::from(b_value.clone()))),
        ])
        .unwrap()
        .normalize()
        .unwrap();
    let Some(Value::Matrix(m)) = interpreted.value() else {
        unreachable!("expected a constant matrix, got {interpreted}");
    };
    assert_eq!(*m, expected);

    let f = e.compile(&[a, b]).unwrap();
    let Value::Matrix(m) = f
        .evaluate(&[Value::from(a_value), Value::from(b_value)])
        .unwrap()
    else {
        unreachable!();
    };
    assert_eq!(*m, expected);
}

#[test]
fn test_derivative_compiles() {
    let (x, y) = reals();
    let e = 3 * (2 * &x).sin() + y.powi(2) + &x / &y;
    let dy = e.derive(&y).unwrap();
    let f = dy.compile(&[x, y]).unwrap();
    // 2*y - x/y^2 at (4, 2)
    let value = f.evaluate(&[Value::Int(4), Value::Int(2)]).unwrap();
    assert_eq!(value.as_f64(), Some(3.0));
}

// ============================================================
// Normalization
// ============================================================

#[test]
fn test_normalization_is_idempotent() {
    let (x, y) = reals();
    let n = Expr::symbol("n", Domain::Integers);
    let sum = Expr::indexed_sum(1, &n, |i| Ok(i * &x)).unwrap();
    let cases = [
        (&x * &y).powi(2) + x.powi(2) * y.powi(2),
        Expr::pow(x.powi(3), -1).unwrap() * &y,
        sum,
        Expr::pow(Expr::int(2), 5).unwrap() * x.sin().exp(),
    ];
    for e in cases {
        let once = e.normalize().unwrap();
        assert_eq!(once.normalize().unwrap(), once, "{e}");
    }
}
