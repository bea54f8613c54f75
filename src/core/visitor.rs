//! Expression visitor pattern and the shared memo discipline
//!
//! Expressions are DAGs: a sub-expression may be reachable along many paths.
//! [`walk_expr`] visits every distinct node once, and [`VisitCache`] is the
//! memo table the substitution, differentiation and normalization engines
//! consult before recursing, so shared sub-DAGs are transformed once.

use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{Expr, ExprKind};

/// Trait for visiting expression nodes
///
/// Each method returns a boolean indicating whether to continue into the
/// children of the node.
///
/// # Example
/// ```
/// use symdag::{Domain, Expr, ExprVisitor, walk_expr};
///
/// struct SymbolCount { symbols: usize }
///
/// impl ExprVisitor for SymbolCount {
///     fn visit(&mut self, expr: &Expr) -> bool {
///         self.symbols += usize::from(expr.is_symbol());
///         true
///     }
/// }
///
/// let x = Expr::symbol("x", Domain::Reals);
/// let mut v = SymbolCount { symbols: 0 };
/// walk_expr(&(&x * &x + &x), &mut v);
/// assert_eq!(v.symbols, 1);
/// ```
pub trait ExprVisitor {
    fn visit(&mut self, expr: &Expr) -> bool;
}

/// Walk an expression DAG with a visitor
///
/// Visits nodes in pre-order (parent before children), each distinct node
/// exactly once.
pub fn walk_expr<V: ExprVisitor>(expr: &Expr, visitor: &mut V) {
    let mut seen: FxHashSet<Expr> = FxHashSet::default();
    let mut stack = vec![expr.clone()];
    while let Some(node) = stack.pop() {
        if !seen.insert(node.clone()) {
            continue;
        }
        if visitor.visit(&node) {
            stack.extend(node.children().into_iter().rev().cloned());
        }
    }
}

/// Counts distinct nodes
#[derive(Default)]
pub struct NodeCounter {
    pub count: usize,
}

impl ExprVisitor for NodeCounter {
    fn visit(&mut self, _expr: &Expr) -> bool {
        self.count += 1;
        true
    }
}

/// Collects symbols, separating those bound by summations and generators
#[derive(Default)]
pub struct SymbolCollector {
    symbols: Vec<Expr>,
    bound: FxHashSet<Expr>,
}

impl SymbolCollector {
    /// Symbols not bound inside the walked expression, in first-visit order.
    #[must_use]
    pub fn free(&self) -> Vec<Expr> {
        self.symbols
            .iter()
            .filter(|s| !self.bound.contains(*s))
            .cloned()
            .collect()
    }
}

impl ExprVisitor for SymbolCollector {
    fn visit(&mut self, expr: &Expr) -> bool {
        match expr.kind() {
            ExprKind::Symbol(_) => self.symbols.push(expr.clone()),
            ExprKind::IndexedSum { index, .. } | ExprKind::CollectionSum { index, .. } => {
                self.bound.insert(index.clone());
            }
            ExprKind::MatrixGenerator { .. } => {
                self.bound.insert(crate::matrix::row_index().clone());
                self.bound.insert(crate::matrix::col_index().clone());
            }
            _ => {}
        }
        true
    }
}

impl Expr {
    /// Free symbols of the expression, in first-visit order.
    #[must_use]
    pub fn free_symbols(&self) -> Vec<Expr> {
        let mut collector = SymbolCollector::default();
        walk_expr(self, &mut collector);
        collector.free()
    }

    /// Number of distinct nodes in the DAG.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut counter = NodeCounter::default();
        walk_expr(self, &mut counter);
        counter.count
    }
}

/// Memo table of one transform, keyed by node identity (or a pair of nodes).
pub(crate) struct VisitCache<K = Expr> {
    memo: FxHashMap<K, Expr>,
}

impl<K: Hash + Eq> Default for VisitCache<K> {
    fn default() -> Self {
        Self {
            memo: FxHashMap::default(),
        }
    }
}

impl<K: Hash + Eq> VisitCache<K> {
    pub(crate) fn get(&self, key: &K) -> Option<Expr> {
        self.memo.get(key).cloned()
    }

    pub(crate) fn insert(&mut self, key: K, value: Expr) {
        self.memo.insert(key, value);
    }

    pub(crate) fn len(&self) -> usize {
        self.memo.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::Domain;

    #[test]
    fn test_shared_nodes_are_visited_once() {
        let x = Expr::symbol("x", Domain::Reals);
        let shared = x.sin();
        let twice = Expr::product([Expr::int(2), shared.clone()]).unwrap();
        let e = Expr::tuple(vec![shared, twice]).unwrap();
        // tuple, sin(x), sin, x, 2*sin(x), 2
        assert_eq!(e.node_count(), 6);
    }

    #[test]
    fn test_bound_indices_are_not_free() {
        let x = Expr::symbol("x", Domain::Reals);
        let n = Expr::symbol("n", Domain::Integers);
        let s = Expr::indexed_sum(1, &n, |i| Ok(i * &x)).unwrap();
        let free = s.free_symbols();
        assert_eq!(free.len(), 2);
        assert!(free.contains(&x) && free.contains(&n));
    }
}
