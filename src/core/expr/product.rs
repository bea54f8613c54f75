//! Canonical product chains.
//!
//! A product is a left-leaning chain of `Apply` nodes:
//!
//! ```text
//! Apply(Apply(Apply(c, a), b), M)     c · a · b · M
//! ```
//!
//! - `c` is the numeric coefficient, omitted when it is one
//! - `a`, `b` are real-valued factors with distinct bases, sorted; repeated
//!   bases are merged into a single `pow` with the summed exponent
//! - `M` is at most one matrix-valued factor; several matrix factors are
//!   combined through [`crate::matrix::multiply`], which keeps their order
//!
//! A zero coefficient absorbs the whole product.

use rustc_hash::FxHashMap;

use super::{Expr, ExprKind};
use crate::core::domain::Domain;
use crate::core::number::Number;
use crate::error::ExprError;
use crate::matrix;

#[derive(Default)]
struct Factors {
    coefficient: Option<Number>,
    scalars: Vec<Expr>,
    matrices: Vec<Expr>,
}

impl Factors {
    fn push(&mut self, factor: Expr) {
        let mut pending = vec![factor];
        while let Some(factor) = pending.pop() {
            if factor.is_product()
                && let ExprKind::Apply { target, argument } = factor.kind()
            {
                pending.push(argument.clone());
                pending.push(target.clone());
                continue;
            }
            match factor.kind() {
                ExprKind::Number(n) => {
                    self.coefficient = Some(self.coefficient.map_or(*n, |c| c * *n));
                }
                _ if factor.domain().is_contained_in(&Domain::Reals) => self.scalars.push(factor),
                _ => self.matrices.push(factor),
            }
        }
    }

    fn coefficient(&self) -> Number {
        self.coefficient.unwrap_or(Number::Int(1))
    }
}

/// Flattened factors of a product chain, in chain order.
pub(crate) fn factors(e: &Expr) -> Vec<Expr> {
    let mut out = Vec::new();
    let mut pending = vec![e.clone()];
    while let Some(factor) = pending.pop() {
        if factor.is_product()
            && let ExprKind::Apply { target, argument } = factor.kind()
        {
            pending.push(argument.clone());
            pending.push(target.clone());
        } else {
            out.push(factor);
        }
    }
    out
}

/// Build the canonical product of `input`.
pub(crate) fn build(input: Vec<Expr>) -> Result<Expr, ExprError> {
    let mut collected = Factors::default();
    for factor in input {
        collected.push(factor);
    }
    if num_traits::Zero::is_zero(&collected.coefficient()) {
        return Ok(Expr::number(collected.coefficient()));
    }

    if collected.matrices.len() > 1 {
        let combined = matrix::multiply(std::mem::take(&mut collected.matrices))?;
        collected.push(combined);
        if num_traits::Zero::is_zero(&collected.coefficient()) {
            return Ok(Expr::number(collected.coefficient()));
        }
    }

    let scalars = merge_powers(std::mem::take(&mut collected.scalars))?;
    let coefficient = collected.coefficient();

    let mut chain = Vec::with_capacity(scalars.len() + 2);
    if !num_traits::One::is_one(&coefficient) {
        chain.push(Expr::number(coefficient));
    }
    chain.extend(scalars);
    chain.append(&mut collected.matrices);

    let mut chain = chain.into_iter();
    let Some(first) = chain.next() else {
        return Ok(Expr::number(coefficient));
    };
    chain.try_fold(first, |acc, factor| {
        let domain = Expr::resolve_apply(&acc, &factor)?;
        Expr::intern_apply(acc, factor, domain)
    })
}

/// Groups scalar factors by base, sums exponents and sorts by base.
fn merge_powers(scalars: Vec<Expr>) -> Result<Vec<Expr>, ExprError> {
    let mut slots: FxHashMap<Expr, usize> = FxHashMap::default();
    let mut groups: Vec<(Expr, Vec<Expr>)> = Vec::new();
    for factor in scalars {
        let (base, exponent) = match factor.as_power() {
            Some((base, exponent)) => (base.clone(), exponent.clone()),
            None => (factor.clone(), Expr::one()),
        };
        match slots.get(&base) {
            Some(&slot) => groups[slot].1.push(exponent),
            None => {
                slots.insert(base.clone(), groups.len());
                groups.push((base, vec![exponent]));
            }
        }
    }
    groups.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut merged = Vec::with_capacity(groups.len());
    for (base, exponents) in groups {
        let exponent = Expr::sum(exponents)?;
        if exponent.is_zero() {
            continue;
        }
        if exponent.is_one() {
            merged.push(base);
        } else {
            merged.push(Expr::pow(base, exponent)?);
        }
    }
    Ok(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_factors_become_powers() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        let chain = Expr::product([
            x.clone(),
            x.clone(),
            y.clone(),
            y.clone(),
            y.clone(),
        ])
        .unwrap();
        let expected = Expr::product([
            Expr::pow(x, 2).unwrap(),
            Expr::pow(y, 3).unwrap(),
        ])
        .unwrap();
        assert_eq!(chain, expected);
    }

    #[test]
    fn test_coefficients_multiply_and_lead() {
        let x = Expr::symbol("x", Domain::Reals);
        let p = Expr::product([Expr::int(2), x.clone(), Expr::int(3)]).unwrap();
        let f = factors(&p);
        assert_eq!(f, vec![Expr::int(6), x]);
    }

    #[test]
    fn test_zero_absorbs() {
        let x = Expr::symbol("x", Domain::Reals);
        assert!(Expr::product([x, Expr::int(0)]).unwrap().is_zero());
    }

    #[test]
    fn test_reciprocal_cancels() {
        let x = Expr::symbol("x", Domain::Reals);
        let inv = Expr::pow(x.clone(), -1).unwrap();
        assert!(Expr::product([x, inv]).unwrap().is_one());
    }

    #[test]
    fn test_matrix_factor_goes_last() {
        let m = Expr::symbol("M", Domain::Matrices);
        let x = Expr::symbol("x", Domain::Reals);
        let p = Expr::product([m.clone(), x.clone(), Expr::int(2)]).unwrap();
        assert_eq!(factors(&p), vec![Expr::int(2), x, m]);
        assert_eq!(*p.domain(), Domain::Matrices);
    }

    #[test]
    fn test_matrix_factors_keep_their_order() {
        let a = Expr::symbol("A", Domain::Matrices);
        let b = Expr::symbol("B", Domain::Matrices);
        let ab = Expr::product([a.clone(), b.clone()]).unwrap();
        let ba = Expr::product([b, a]).unwrap();
        assert_ne!(ab, ba);
        assert!(matches!(ab.kind(), ExprKind::MatrixMultiply(items) if items.len() == 2));
    }
}
