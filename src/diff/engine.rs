//! Differentiation engine - one rule per node kind
//!
//! Leaves and the structural kinds (tuples, sums, matrix nodes, summations)
//! are handled here. `Apply` nodes are delegated to the domain of their target,
//! which knows whether the node is a product, a call or an access.

use super::DeriveCache;
use crate::core::expr::{Expr, ExprKind};
use crate::error::ExprError;
use crate::matrix;

pub(super) fn derive_node(
    cache: &mut DeriveCache,
    e: &Expr,
    var: &Expr,
) -> Result<Expr, ExprError> {
    if e == var {
        return Ok(Expr::one());
    }
    match e.kind() {
        ExprKind::Symbol(_)
        | ExprKind::Number(_)
        | ExprKind::Object(_)
        | ExprKind::Field(_)
        | ExprKind::Function(_) => Ok(Expr::zero()),

        ExprKind::Tuple(items) => {
            let parts = items
                .iter()
                .map(|item| cache.derive(item, var))
                .collect::<Result<Vec<_>, _>>()?;
            Expr::tuple(parts)
        }

        ExprKind::Sum(terms) => {
            let parts = terms
                .iter()
                .map(|term| cache.derive(term, var))
                .collect::<Result<Vec<_>, _>>()?;
            Expr::sum(parts)
        }

        ExprKind::Apply { target, argument } => target
            .domain()
            .derive(target, argument, var, cache)
            .unwrap_or_else(|| Err(ExprError::unimplemented("derivative", e))),

        // d(A₁⋯Aₙ) = Σₖ A₁⋯dAₖ⋯Aₙ
        ExprKind::MatrixMultiply(factors) => {
            let mut terms = Vec::new();
            for (k, factor) in factors.iter().enumerate() {
                let d = cache.derive(factor, var)?;
                if d.is_zero() {
                    continue;
                }
                let mut replaced = factors.clone();
                replaced[k] = d;
                terms.push(matrix::multiply(replaced)?);
            }
            Expr::sum(terms)
        }

        // d(A⁻¹) = -A⁻¹·dA·A⁻¹
        ExprKind::MatrixInverse(inner) => {
            let d = cache.derive(inner, var)?;
            if d.is_zero() {
                return Ok(d);
            }
            let sandwich = matrix::multiply(vec![e.clone(), d, e.clone()])?;
            Expr::product([Expr::int(-1), sandwich])
        }

        ExprKind::MatrixTranspose(inner) => matrix::transpose(cache.derive(inner, var)?),

        ExprKind::MatrixGenerator {
            rows,
            cols,
            element,
        } => {
            let d = cache.derive(element, var)?;
            if d.is_zero() {
                return Ok(d);
            }
            matrix::generator(*rows, *cols, d)
        }

        ExprKind::IndexedSum {
            index,
            lower,
            upper,
            body,
        } => {
            let d = cache.derive(body, var)?;
            if d.is_zero() {
                return Ok(d);
            }
            Expr::indexed_sum(lower, upper, |i| d.substitute(&[(index.clone(), i.clone())]))
        }

        ExprKind::CollectionSum {
            index,
            collection,
            body,
        } => {
            if !cache.derive(collection, var)?.is_zero() {
                return Err(ExprError::unimplemented("derivative", e));
            }
            let d = cache.derive(body, var)?;
            if d.is_zero() {
                return Ok(d);
            }
            Expr::collection_sum(collection.clone(), |v| {
                d.substitute(&[(index.clone(), v.clone())])
            })
        }
    }
}
