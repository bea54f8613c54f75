//! Symbolic matrix layer.
//!
//! Matrix-valued expressions are built from symbols in the `Matrices` domain,
//! constant matrices, and four node kinds:
//!
//! | node              | display         | canonical form                                   |
//! |-------------------|-----------------|--------------------------------------------------|
//! | `MatrixGenerator` | `[i,j => e; r×c]` | element written in the shared index symbols    |
//! | `MatrixMultiply`  | `A*B`           | flat, scalars pulled out, `A*inv(A)` cancelled   |
//! | `MatrixInverse`   | `inv(A)`        | `inv(inv(A)) = A`, scalars become `a^-1`         |
//! | `MatrixTranspose` | `A'`            | `(A')' = A`, scalars are their own transpose     |
//!
//! Concrete operands are folded through [`MatrixArithmetic`]; the factories use
//! [`DenseArithmetic`], normalization uses whatever its environment provides.

mod dense;

use std::sync::LazyLock;

use crate::core::domain::Domain;
use crate::core::expr::{Expr, ExprKind, Node};
use crate::core::host::Value;
use crate::core::store::{self, Key};
use crate::error::ExprError;

pub use dense::{DenseArithmetic, MatrixArithmetic};

/// Dense `f64` matrix used for concrete values.
pub type Matrix = nalgebra::DMatrix<f64>;

static ROW: LazyLock<Expr> = LazyLock::new(|| Expr::symbol("i", Domain::Integers));
static COL: LazyLock<Expr> = LazyLock::new(|| Expr::symbol("j", Domain::Integers));

/// Row index symbol bound by every generator.
#[must_use]
pub fn row_index() -> &'static Expr {
    &ROW
}

/// Column index symbol bound by every generator.
#[must_use]
pub fn col_index() -> &'static Expr {
    &COL
}

fn constant_matrix(e: &Expr) -> Option<&Matrix> {
    match e.kind() {
        ExprKind::Object(Value::Matrix(m)) => Some(m),
        _ => None,
    }
}

/// `rows × cols` matrix with element `element(i, j)` (zero-based indices).
///
/// # Errors
/// Whatever building the element reports.
pub fn generate<F>(rows: usize, cols: usize, element: F) -> Result<Expr, ExprError>
where
    F: FnOnce(&Expr, &Expr) -> Result<Expr, ExprError>,
{
    let element = element(row_index(), col_index())?;
    generator(rows, cols, element)
}

/// Generator node over an element already written in the shared index symbols.
pub(crate) fn generator(rows: usize, cols: usize, element: Expr) -> Result<Expr, ExprError> {
    let key = Key::Generator(rows, cols, element.ordinal());
    store::intern(key, |ordinal| {
        Node::new(
            ordinal,
            Domain::Matrices,
            ExprKind::MatrixGenerator {
                rows,
                cols,
                element,
            },
        )
    })
}

/// Non-commutative product of matrix-valued factors.
///
/// # Errors
/// Shape mismatches between constant factors, and type errors from scalar
/// factors.
pub fn multiply(factors: Vec<Expr>) -> Result<Expr, ExprError> {
    let mut scalars = Vec::new();
    let mut chain: Vec<Expr> = Vec::with_capacity(factors.len());
    let mut pending = factors;
    pending.reverse();
    while let Some(factor) = pending.pop() {
        match factor.kind() {
            ExprKind::MatrixMultiply(items) => pending.extend(items.iter().rev().cloned()),
            ExprKind::Apply { target, argument } if factor.is_product() => {
                pending.push(argument.clone());
                pending.push(target.clone());
            }
            _ if factor.domain().is_contained_in(&Domain::Reals) => scalars.push(factor),
            _ => push_factor(&mut chain, factor)?,
        }
    }

    let matrix = match chain.len() {
        0 => Expr::one(),
        1 => chain.remove(0),
        _ => {
            let key = Key::Multiply(chain.iter().map(Expr::ordinal).collect());
            store::intern(key, |ordinal| {
                Node::new(ordinal, Domain::Matrices, ExprKind::MatrixMultiply(chain))
            })?
        }
    };
    if scalars.is_empty() {
        Ok(matrix)
    } else {
        scalars.push(matrix);
        Expr::product(scalars)
    }
}

/// Appends to a chain, cancelling `A·inv(A)` and folding constant neighbours.
fn push_factor(chain: &mut Vec<Expr>, factor: Expr) -> Result<(), ExprError> {
    let Some(last) = chain.last() else {
        chain.push(factor);
        return Ok(());
    };
    let cancels = matches!(factor.kind(), ExprKind::MatrixInverse(a) if a == last)
        || matches!(last.kind(), ExprKind::MatrixInverse(a) if *a == factor);
    if cancels {
        chain.pop();
        return Ok(());
    }
    if let (Some(a), Some(b)) = (constant_matrix(last), constant_matrix(&factor)) {
        let folded = DenseArithmetic.multiply(a, b)?;
        chain.pop();
        chain.push(Expr::constant(Value::from(folded)));
        return Ok(());
    }
    chain.push(factor);
    Ok(())
}

/// `inv(a)`.
///
/// # Errors
/// A constant matrix that cannot be inverted.
pub fn inverse(a: Expr) -> Result<Expr, ExprError> {
    if a.domain().is_contained_in(&Domain::Reals) {
        return Expr::pow(a, -1);
    }
    if let ExprKind::MatrixInverse(inner) = a.kind() {
        return Ok(inner.clone());
    }
    if let Some(m) = constant_matrix(&a) {
        return Ok(Expr::constant(Value::from(DenseArithmetic.invert(m)?)));
    }
    let key = Key::Inverse(a.ordinal());
    store::intern(key, |ordinal| {
        Node::new(ordinal, Domain::Matrices, ExprKind::MatrixInverse(a))
    })
}

/// `a'`.
///
/// # Errors
/// Only [`ExprError::CounterExhausted`].
pub fn transpose(a: Expr) -> Result<Expr, ExprError> {
    if a.domain().is_contained_in(&Domain::Reals) {
        return Ok(a);
    }
    if let ExprKind::MatrixTranspose(inner) = a.kind() {
        return Ok(inner.clone());
    }
    if let Some(m) = constant_matrix(&a) {
        return Ok(Expr::constant(Value::from(DenseArithmetic.transpose(m))));
    }
    let key = Key::Transpose(a.ordinal());
    store::intern(key, |ordinal| {
        Node::new(ordinal, Domain::Matrices, ExprKind::MatrixTranspose(a))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;

    fn matrices() -> (Expr, Expr) {
        (
            Expr::symbol("A", Domain::Matrices),
            Expr::symbol("B", Domain::Matrices),
        )
    }

    #[test]
    fn test_inverse_pairs_cancel() {
        let (a, b) = matrices();
        let inv_a = inverse(a.clone()).unwrap();
        assert_eq!(multiply(vec![a.clone(), inv_a.clone()]).unwrap(), Expr::one());
        assert_eq!(
            multiply(vec![b.clone(), inv_a, a.clone()]).unwrap(),
            b
        );
        assert_eq!(inverse(inverse(a.clone()).unwrap()).unwrap(), a);
    }

    #[test]
    fn test_scalars_are_pulled_out() {
        let (a, b) = matrices();
        let x = Expr::symbol("x", Domain::Reals);
        let p = multiply(vec![a.clone(), x.clone(), b.clone()]).unwrap();
        let ab = multiply(vec![a, b]).unwrap();
        assert_eq!(p, &x * &ab);
        assert!(multiply(vec![ab, Expr::int(0)]).unwrap().is_zero());
    }

    #[test]
    fn test_products_flatten() {
        let (a, b) = matrices();
        let c = Expr::symbol("C", Domain::Matrices);
        let ab = multiply(vec![a.clone(), b.clone()]).unwrap();
        let abc = multiply(vec![ab, c.clone()]).unwrap();
        assert!(matches!(abc.kind(), ExprKind::MatrixMultiply(items) if *items == vec![a, b, c]));
    }

    #[test]
    fn test_transpose_rules() {
        let (a, _) = matrices();
        let x = Expr::symbol("x", Domain::Reals);
        assert_eq!(transpose(x.clone()).unwrap(), x);
        let t = transpose(a.clone()).unwrap();
        assert_eq!(transpose(t).unwrap(), a);
    }

    #[test]
    fn test_constant_factors_fold() {
        let m = Expr::constant(Value::from(Matrix::from_row_slice(
            2,
            2,
            &[1.0, 1.0, 0.0, 1.0],
        )));
        let square = multiply(vec![m.clone(), m]).unwrap();
        assert_eq!(
            square.value().unwrap(),
            Value::from(Matrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]))
        );
    }

    #[test]
    fn test_generator_shares_index_symbols() {
        let g1 = generate(2, 2, |i, j| Ok(i + j)).unwrap();
        let g2 = generate(2, 2, |i, j| Ok(j + i)).unwrap();
        assert_eq!(g1, g2);
        assert_eq!(*g1.domain(), Domain::Matrices);
    }
}
