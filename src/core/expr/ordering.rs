//! Canonical ordering for expressions.
//!
//! Commutative operands are sorted with [`comes_before`], a total order over
//! live nodes:
//!
//! 1. numeric constants, by value (`Int` before an equal `Float`)
//! 2. other constants (objects, fields, functions, constant tuples), by ordinal
//! 3. real-valued non-constants, by ordinal
//! 4. everything else (matrix-valued and untyped), by ordinal
//!
//! Matrix-valued operands sort last so that a product chain keeps its single
//! matrix factor at the end, after every scalar.

use std::cmp::Ordering as CmpOrdering;

use super::{Expr, ExprKind};
use crate::core::domain::Domain;

fn rank(e: &Expr) -> u8 {
    match e.kind() {
        ExprKind::Number(_) => 0,
        _ if e.is_constant() => 1,
        _ if e.domain().is_contained_in(&Domain::Reals) => 2,
        _ => 3,
    }
}

/// Compare expressions for canonical operand order.
#[must_use]
pub fn comes_before(a: &Expr, b: &Expr) -> CmpOrdering {
    if a == b {
        return CmpOrdering::Equal;
    }
    if let (ExprKind::Number(x), ExprKind::Number(y)) = (a.kind(), b.kind()) {
        return x.total_cmp(*y);
    }
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.ordinal().cmp(&b.ordinal()))
}
