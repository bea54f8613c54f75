//! Node-level rewrites used by the normalization engine.
//!
//! Each rewrite looks at one node whose children are already normalized and
//! returns `Ok(None)` when it does not apply.

use crate::core::domain::Domain;
use crate::core::environment::Environment;
use crate::core::expr::{Expr, ExprKind, factors};
use crate::core::host::Value;
use crate::error::ExprError;
use crate::matrix;

fn values(items: &[Expr]) -> Option<Vec<Value>> {
    items.iter().map(Expr::value).collect()
}

/// `target(argument)` with both sides constant is evaluated.
pub(super) fn fold_apply(
    env: &Environment,
    target: &Expr,
    argument: &Expr,
) -> Result<Option<Expr>, ExprError> {
    let (Some(t), Some(a)) = (target.value(), argument.value()) else {
        return Ok(None);
    };
    Ok(Some(Expr::constant(env.apply(&t, &a)?)))
}

/// `(a*b)^e -> a^e * b^e` for scalar products, `(x^a)^b -> x^(a*b)`.
pub(super) fn power(base: &Expr, exponent: &Expr) -> Result<Option<Expr>, ExprError> {
    if base.is_product() && base.domain().is_contained_in(&Domain::Reals) {
        let distributed = factors(base)
            .into_iter()
            .map(|f| Expr::pow(f, exponent.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        return Expr::product(distributed).map(Some);
    }
    if let Some((inner_base, inner_exponent)) = base.as_power() {
        let merged = Expr::product([inner_exponent.clone(), exponent.clone()])?;
        return Expr::pow(inner_base.clone(), merged).map(Some);
    }
    Ok(None)
}

/// A sum of constants, matrices included, is evaluated.
pub(super) fn fold_sum(env: &Environment, terms: &[Expr]) -> Result<Option<Expr>, ExprError> {
    let Some(values) = values(terms) else {
        return Ok(None);
    };
    Ok(Some(Expr::constant(env.sum(&values)?)))
}

/// Adjacent constant factors are multiplied through the environment.
pub(super) fn fold_multiply(
    env: &Environment,
    factors: &[Expr],
) -> Result<Option<Expr>, ExprError> {
    let mut chain: Vec<Expr> = Vec::with_capacity(factors.len());
    let mut folded = false;
    for factor in factors {
        if let (Some(last), Some(next)) = (chain.last().and_then(Expr::value), factor.value()) {
            let product = env.apply(&last, &next)?;
            chain.pop();
            chain.push(Expr::constant(product));
            folded = true;
        } else {
            chain.push(factor.clone());
        }
    }
    if folded {
        matrix::multiply(chain).map(Some)
    } else {
        Ok(None)
    }
}

pub(super) fn fold_inverse(env: &Environment, inner: &Expr) -> Result<Option<Expr>, ExprError> {
    match inner.value() {
        Some(value) => Ok(Some(Expr::constant(env.inverse(&value)?))),
        None => Ok(None),
    }
}

/// Folds constants, `(A*B)' -> B'*A'`, `(s*A)' -> s*A'`.
pub(super) fn transpose(env: &Environment, inner: &Expr) -> Result<Option<Expr>, ExprError> {
    if let Some(value) = inner.value() {
        return Ok(Some(Expr::constant(env.transpose(&value)?)));
    }
    match inner.kind() {
        ExprKind::MatrixMultiply(items) => {
            let reversed = items
                .iter()
                .rev()
                .map(|f| matrix::transpose(f.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            matrix::multiply(reversed).map(Some)
        }
        _ if inner.is_product() => {
            let transposed = factors(inner)
                .into_iter()
                .map(matrix::transpose)
                .collect::<Result<Vec<_>, _>>()?;
            Expr::product(transposed).map(Some)
        }
        _ => Ok(None),
    }
}
