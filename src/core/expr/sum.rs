//! Canonical sums.
//!
//! Nested sums are spliced, numeric terms fold into one constant, and terms
//! that differ only by their numeric coefficient are collected. The stored
//! term list is sorted with the constant (if nonzero) first.

use rustc_hash::FxHashMap;

use super::{Expr, ExprKind, Node, product};
use crate::core::domain::Domain;
use crate::core::number::Number;
use crate::core::store::{self, Key};
use crate::error::ExprError;

/// Splits `c · rest` into its numeric coefficient and the remaining product.
pub(crate) fn split_coefficient(term: &Expr) -> Result<(Number, Expr), ExprError> {
    if term.is_product() {
        let mut factors = product::factors(term);
        if let Some(c) = factors.first().and_then(Expr::as_number) {
            factors.remove(0);
            return Ok((c, product::build(factors)?));
        }
    }
    Ok((Number::Int(1), term.clone()))
}

fn resolve_domain<'a>(terms: impl IntoIterator<Item = &'a Expr>) -> Result<Domain, ExprError> {
    let mut terms = terms.into_iter();
    let Some(first) = terms.next() else {
        return Ok(Domain::Integers);
    };
    let mut domain = first.domain().clone();
    let mut left = first;
    for right in terms {
        domain = Domain::resolve_sum(&domain, right.domain()).ok_or_else(|| {
            ExprError::UnsupportedSum {
                left: left.to_string(),
                left_domain: domain.to_string(),
                right: right.to_string(),
                right_domain: right.domain().to_string(),
            }
        })?;
        left = right;
    }
    Ok(domain)
}

pub(crate) fn build(input: impl IntoIterator<Item = Expr>) -> Result<Expr, ExprError> {
    let mut constant: Option<Number> = None;
    let mut flat = Vec::new();
    let mut pending: Vec<Expr> = input.into_iter().collect();
    pending.reverse();
    while let Some(term) = pending.pop() {
        match term.kind() {
            ExprKind::Sum(items) => pending.extend(items.iter().rev().cloned()),
            ExprKind::Number(n) => constant = Some(constant.map_or(*n, |c| c + *n)),
            _ => flat.push(term),
        }
    }
    let constant = constant.map(Expr::number);
    resolve_domain(constant.iter().chain(&flat))?;

    let mut slots: FxHashMap<Expr, usize> = FxHashMap::default();
    let mut groups: Vec<(Expr, Number)> = Vec::new();
    for term in &flat {
        let (c, rest) = split_coefficient(term)?;
        match slots.get(&rest) {
            Some(&slot) => groups[slot].1 = groups[slot].1 + c,
            None => {
                slots.insert(rest.clone(), groups.len());
                groups.push((rest, c));
            }
        }
    }
    groups.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut terms = Vec::with_capacity(groups.len() + 1);
    if let Some(c) = &constant
        && !c.is_zero()
    {
        terms.push(c.clone());
    }
    for (rest, c) in groups {
        if num_traits::Zero::is_zero(&c) {
            continue;
        }
        if num_traits::One::is_one(&c) {
            terms.push(rest);
        } else {
            terms.push(product::build(vec![Expr::number(c), rest])?);
        }
    }

    match terms.len() {
        0 => Ok(constant.unwrap_or_else(Expr::zero)),
        1 => Ok(terms.remove(0)),
        _ => {
            let domain = resolve_domain(&terms)?;
            let key = Key::Sum(terms.iter().map(Expr::ordinal).collect());
            store::intern(key, |ordinal| Node::new(ordinal, domain, ExprKind::Sum(terms)))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_terms_are_collected() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        let collected = Expr::sum([
            x.clone(),
            y.clone(),
            y.clone(),
            x.clone(),
            y.clone(),
        ])
        .unwrap();
        let expected = Expr::sum([
            Expr::product([Expr::int(2), x]).unwrap(),
            Expr::product([Expr::int(3), y]).unwrap(),
        ])
        .unwrap();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_constants_fold_and_lead() {
        let x = Expr::symbol("x", Domain::Reals);
        let s = Expr::sum([x.clone(), Expr::int(2), Expr::int(3)]).unwrap();
        match s.kind() {
            ExprKind::Sum(terms) => assert_eq!(terms, &vec![Expr::int(5), x]),
            _ => unreachable!("two distinct terms stay a sum"),
        }
    }

    #[test]
    fn test_cancellation_leaves_zero() {
        let x = Expr::symbol("x", Domain::Reals);
        let minus_x = Expr::product([Expr::int(-1), x.clone()]).unwrap();
        assert!(Expr::sum([x, minus_x]).unwrap().is_zero());
        assert!(Expr::sum([]).unwrap().is_zero());
    }

    #[test]
    fn test_nested_sums_are_spliced() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        let z = Expr::symbol("z", Domain::Reals);
        let inner = Expr::sum([y.clone(), z.clone()]).unwrap();
        let outer = Expr::sum([x.clone(), inner]).unwrap();
        assert_eq!(outer, Expr::sum([z, y, x]).unwrap());
        assert!(matches!(outer.kind(), ExprKind::Sum(terms) if terms.len() == 3));
    }

    #[test]
    fn test_sum_domains() {
        let n = Expr::symbol("n", Domain::Integers);
        let x = Expr::symbol("x", Domain::Reals);
        assert_eq!(
            *Expr::sum([n.clone(), Expr::int(1)]).unwrap().domain(),
            Domain::Integers
        );
        assert_eq!(*Expr::sum([n, x.clone()]).unwrap().domain(), Domain::Reals);
        let f = Expr::field("F");
        assert_eq!(Expr::sum([x, f]).unwrap_err().kind(), ErrorKind::Type);
    }
}
