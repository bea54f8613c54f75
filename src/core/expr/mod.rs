//! Hash-consed expression nodes.
//!
//! This module defines:
//! - [`Expr`] - a cheap, shared handle to an immutable node
//! - [`ExprKind`] - the node variants
//!
//! # Architecture
//!
//! ## One instance per shape
//! Composite nodes are only ever created by the factories in
//! [`constructors`](self) and friends, which canonicalize operand order and
//! then go through the interning store. Two handles are equal exactly when
//! they point at the same node, so equality and hashing are O(1).
//!
//! ## Ordinals
//! Each node gets a monotonically increasing ordinal at creation. Ordinals
//! break ties in the canonical operand order and key child references in the
//! interning table. They never decide identity.
//!
//! ## Domains
//! Each node carries its [`Domain`], computed by the factory from the
//! operands' domains (see [`crate::core::domain`]).
//!
//! # Usage
//!
//! ```
//! use symdag::{Domain, Expr};
//!
//! let x = Expr::symbol("x", Domain::Reals);
//! let y = Expr::symbol("y", Domain::Reals);
//! assert_eq!(&x + &y, &y + &x);
//! ```

mod constructors;
mod ops;
mod ordering;
mod product;
mod sum;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock, Weak};

use crate::core::domain::Domain;
use crate::core::host::Value;
use crate::core::number::Number;
use crate::functions::Function;

pub use ordering::comes_before;
pub(crate) use product::factors;

// =============================================================================
// EXPR - shared handle
// =============================================================================

/// Handle to an interned expression node.
///
/// Cloning is a reference-count increment. Equality is node identity, which
/// hash-consing makes equivalent to structural equality.
#[derive(Clone)]
pub struct Expr(pub(crate) Arc<Node>);

/// An immutable expression node.
pub struct Node {
    pub(crate) ordinal: u64,
    pub(crate) domain: Domain,
    pub(crate) kind: ExprKind,
}

impl Node {
    pub(crate) fn new(ordinal: u64, domain: Domain, kind: ExprKind) -> Self {
        Self {
            ordinal,
            domain,
            kind,
        }
    }
}

/// Node variants.
pub enum ExprKind {
    /// Free variable. Every [`Expr::symbol`] call creates a distinct symbol.
    Symbol(Arc<str>),

    /// Numeric literal; domain `Integers` or `Reals`.
    Number(Number),

    /// Captured host value (array, record, matrix).
    Object(Value),

    /// Member tag: `Apply(x, Field("F"))` reads member `F` of `x`.
    Field(Arc<str>),

    /// Named function, applied through `Apply(f, args)`.
    Function(Function),

    /// Argument package; never has exactly one element.
    Tuple(Vec<Expr>),

    /// Multiplication, call, indexing or member access, depending on domains.
    /// Products are left-leaning chains with the numeric coefficient first.
    Apply { target: Expr, argument: Expr },

    /// Sorted, collected terms; a constant term comes first.
    Sum(Vec<Expr>),

    /// `rows × cols` matrix whose element is a function of the shared row and
    /// column index symbols.
    MatrixGenerator {
        rows: usize,
        cols: usize,
        element: Expr,
    },

    /// Non-commutative product of two or more matrix-valued factors.
    MatrixMultiply(Vec<Expr>),

    MatrixInverse(Expr),

    MatrixTranspose(Expr),

    /// `sum(index = lower..=upper, body)`; `index` is a bound placeholder.
    IndexedSum {
        index: Expr,
        lower: Expr,
        upper: Expr,
        body: Expr,
    },

    /// Sum of `body` over every element of `collection`.
    CollectionSum {
        index: Expr,
        collection: Expr,
        body: Expr,
    },
}

/// Weak handle, mainly for observing reclamation.
#[derive(Clone)]
pub struct WeakExpr(Weak<Node>);

impl WeakExpr {
    #[must_use]
    pub fn upgrade(&self) -> Option<Expr> {
        self.0.upgrade().map(Expr)
    }
}

// =============================================================================
// ACCESSORS
// =============================================================================

impl Expr {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    #[inline]
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.0.domain
    }

    /// Creation order; used for tie-breaking only.
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> u64 {
        self.0.ordinal
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakExpr {
        WeakExpr(Arc::downgrade(&self.0))
    }

    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self.kind() {
            ExprKind::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_number().map(Number::to_f64)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.as_number().is_some_and(|n| num_traits::Zero::is_zero(&n))
    }

    #[must_use]
    pub fn is_one(&self) -> bool {
        self.as_number().is_some_and(|n| num_traits::One::is_one(&n))
    }

    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(self.kind(), ExprKind::Symbol(_))
    }

    /// Constant leaves, and tuples of them.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        match self.kind() {
            ExprKind::Number(_)
            | ExprKind::Object(_)
            | ExprKind::Field(_)
            | ExprKind::Function(_) => true,
            ExprKind::Tuple(items) => items.iter().all(Expr::is_constant),
            _ => false,
        }
    }

    /// Concrete value of a constant expression.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        match self.kind() {
            ExprKind::Number(n) => Some(Value::from(*n)),
            ExprKind::Object(value) => Some(value.clone()),
            ExprKind::Field(name) => Some(Value::Field(name.clone())),
            ExprKind::Function(function) => Some(Value::Function(function.clone())),
            ExprKind::Tuple(items) => items
                .iter()
                .map(Expr::value)
                .collect::<Option<Vec<_>>>()
                .map(|values| Value::Tuple(values.into())),
            _ => None,
        }
    }

    /// `(base, exponent)` of a `pow` application.
    pub(crate) fn as_power(&self) -> Option<(&Expr, &Expr)> {
        if let ExprKind::Apply { target, argument } = self.kind()
            && let ExprKind::Function(function) = target.kind()
            && function.is_pow()
            && let ExprKind::Tuple(items) = argument.kind()
            && let [base, exponent] = items.as_slice()
        {
            return Some((base, exponent));
        }
        None
    }

    /// Application that multiplies two scalar or matrix operands.
    pub(crate) fn is_product(&self) -> bool {
        match self.kind() {
            ExprKind::Apply { target, argument } => {
                !matches!(target.kind(), ExprKind::Function(_))
                    && target.domain().is_contained_in(&Domain::Matrices)
                    && argument.domain().is_contained_in(&Domain::Matrices)
            }
            _ => false,
        }
    }

    /// Direct children in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match self.kind() {
            ExprKind::Symbol(_)
            | ExprKind::Number(_)
            | ExprKind::Object(_)
            | ExprKind::Field(_)
            | ExprKind::Function(_) => Vec::new(),
            ExprKind::Tuple(items) | ExprKind::Sum(items) | ExprKind::MatrixMultiply(items) => {
                items.iter().collect()
            }
            ExprKind::Apply { target, argument } => vec![target, argument],
            ExprKind::MatrixGenerator { element, .. } => vec![element],
            ExprKind::MatrixInverse(inner) | ExprKind::MatrixTranspose(inner) => vec![inner],
            ExprKind::IndexedSum {
                index,
                lower,
                upper,
                body,
            } => vec![index, lower, upper, body],
            ExprKind::CollectionSum {
                index,
                collection,
                body,
            } => vec![index, collection, body],
        }
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

impl PartialEq for Expr {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.ordinal.hash(state);
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The canonical operand order, see [`comes_before`].
impl Ord for Expr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        comes_before(self, other)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// =============================================================================
// DROP IMPLEMENTATION - Iterative drop to prevent stack overflow
// =============================================================================

/// Stand-in swapped into single-child slots while a node is torn down.
static HOLE: LazyLock<Expr> = LazyLock::new(|| {
    Expr(Arc::new(Node::new(
        0,
        Domain::Integers,
        ExprKind::Number(Number::Int(0)),
    )))
});

impl Drop for Node {
    fn drop(&mut self) {
        fn take(slot: &mut Expr, queue: &mut Vec<Expr>) {
            queue.push(std::mem::replace(slot, HOLE.clone()));
        }

        fn drain_children(kind: &mut ExprKind, queue: &mut Vec<Expr>) {
            match kind {
                ExprKind::Tuple(items) | ExprKind::Sum(items) | ExprKind::MatrixMultiply(items) => {
                    queue.extend(std::mem::take(items));
                }
                ExprKind::Apply { target, argument } => {
                    take(target, queue);
                    take(argument, queue);
                }
                ExprKind::MatrixGenerator { element, .. } => take(element, queue),
                ExprKind::MatrixInverse(inner) | ExprKind::MatrixTranspose(inner) => take(inner, queue),
                ExprKind::IndexedSum {
                    index,
                    lower,
                    upper,
                    body,
                } => {
                    take(index, queue);
                    take(lower, queue);
                    take(upper, queue);
                    take(body, queue);
                }
                ExprKind::CollectionSum {
                    index,
                    collection,
                    body,
                } => {
                    take(index, queue);
                    take(collection, queue);
                    take(body, queue);
                }
                ExprKind::Symbol(_)
                | ExprKind::Number(_)
                | ExprKind::Object(_)
                | ExprKind::Field(_)
                | ExprKind::Function(_) => {}
            }
        }

        if self.ordinal == 0 {
            return;
        }
        let mut work_queue = Vec::new();
        drain_children(&mut self.kind, &mut work_queue);

        while let Some(child) = work_queue.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child.0) {
                drain_children(&mut node.kind, &mut work_queue);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;

    #[test]
    fn test_interned_nodes_are_reclaimed() {
        let x = Expr::symbol("x", Domain::Reals);
        let y = Expr::symbol("y", Domain::Reals);
        let sum = Expr::sum([x.clone(), y.clone()]).unwrap();
        let weak = sum.downgrade();
        assert!(weak.upgrade().is_some());
        drop(sum);
        assert!(weak.upgrade().is_none());

        // rebuilding after reclamation gives a fresh node with a larger ordinal
        let again = Expr::sum([x, y]).unwrap();
        assert!(matches!(again.kind(), ExprKind::Sum(terms) if terms.len() == 2));
    }

    #[test]
    fn test_deep_chain_drops_without_overflow() {
        let mut expr = Expr::symbol("x", Domain::Reals);
        for k in 0..100_000 {
            let f = Expr::symbol(format!("f{k}"), Domain::Functions);
            expr = Expr::tuple(vec![f, expr]).unwrap();
        }
        drop(expr);
    }

    #[test]
    fn test_value_of_constants() {
        let t = Expr::tuple(vec![Expr::int(2), Expr::real(0.5)]).unwrap();
        assert!(t.is_constant());
        assert_eq!(
            t.value().unwrap(),
            Value::Tuple(vec![Value::Int(2), Value::Float(0.5)].into())
        );
        assert!(Expr::symbol("x", Domain::Reals).value().is_none());
    }
}
