//! Normalization - algebraic simplification beyond construction-time canonicalization
//!
//! Construction already collects like terms, merges equal bases and orders
//! operands. Normalization goes further:
//! - folds applications, sums and matrix nodes whose operands are all constant,
//!   through the [`Environment`] (so member access on a constant object asks
//!   the member resolver),
//! - distributes a power over a scalar product, `(a*b)^e -> a^e * b^e`,
//! - merges nested powers, `(x^a)^b -> x^(a*b)`,
//! - rewrites `(A*B)' -> B'*A'`,
//! - unrolls summations over constant ranges or constant arrays, and turns a
//!   generator whose elements are all constant into a constant matrix.
//!
//! Every node is normalized once per [`Normalizer`]; a node whose rewrite
//! produces something new is normalized again until nothing changes, so
//! `normalize(normalize(e)) == normalize(e)`.

mod engine;
mod rewrite;

use std::sync::Arc;

use log::debug;

use crate::core::environment::Environment;
use crate::core::expr::Expr;
use crate::core::host::MemberResolver;
use crate::core::visitor::VisitCache;
use crate::error::ExprError;
use crate::matrix::MatrixArithmetic;

/// Default maximum number of terms a summation is unrolled into.
pub const DEFAULT_MAX_UNROLL: usize = 4096;

/// Builder and memo table for normalization.
///
/// # Example
/// ```
/// use symdag::{Domain, Expr, Normalizer};
///
/// let x = Expr::symbol("x", Domain::Reals);
/// let y = Expr::symbol("y", Domain::Reals);
/// let e = (&x * &y).powi(2);
///
/// let mut normalizer = Normalizer::new().max_unroll(100);
/// let n = normalizer.normalize(&e).unwrap();
/// assert_eq!(n, x.powi(2) * y.powi(2));
/// ```
pub struct Normalizer {
    env: Environment,
    max_unroll: usize,
    memo: VisitCache,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Reflective member resolver, dense matrices, unroll limit
    /// [`DEFAULT_MAX_UNROLL`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_environment(Environment::default())
    }

    #[must_use]
    pub fn with_environment(env: Environment) -> Self {
        Self {
            env,
            max_unroll: DEFAULT_MAX_UNROLL,
            memo: VisitCache::default(),
        }
    }

    /// Member resolver used when folding access on constant objects.
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn MemberResolver>) -> Self {
        self.env.resolver = resolver;
        self.memo = VisitCache::default();
        self
    }

    /// Arithmetic used when folding constant matrices.
    #[must_use]
    pub fn matrices(mut self, matrices: Arc<dyn MatrixArithmetic>) -> Self {
        self.env.matrices = matrices;
        self.memo = VisitCache::default();
        self
    }

    /// Summations with more terms than this are kept symbolic.
    #[must_use]
    pub fn max_unroll(mut self, max_unroll: usize) -> Self {
        self.max_unroll = max_unroll;
        self.memo = VisitCache::default();
        self
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Normalized form of `e`. Results are memoized across calls on the same
    /// normalizer.
    ///
    /// # Errors
    /// Member resolution or matrix failures while folding constants, and type
    /// errors from rebuilt nodes.
    pub fn normalize(&mut self, e: &Expr) -> Result<Expr, ExprError> {
        let before = self.memo.len();
        let result = self.visit(e)?;
        debug!(
            "normalized {} new node(s), result has {} node(s)",
            self.memo.len() - before,
            result.node_count()
        );
        Ok(result)
    }
}

impl Expr {
    /// Normalize with the default [`Normalizer`].
    ///
    /// # Errors
    /// See [`Normalizer::normalize`].
    pub fn normalize(&self) -> Result<Expr, ExprError> {
        Normalizer::new().normalize(self)
    }
}
