//! Symbolic differentiation
//!
//! Derivatives are memoized per `(expression, variable)` pair in a
//! [`DeriveCache`]. One cache can serve several variables over the same DAG,
//! which is how [`Expr::gradient`] shares work between partials.
//!
//! Composite rules live with the domain of the applied target (product rule
//! for scalars and matrices, chain rule for functions, access rule for host
//! values), so a new operator family becomes differentiable by implementing
//! [`DomainRules::derive`](crate::DomainRules::derive).

mod engine;

use log::debug;

use crate::core::expr::Expr;
use crate::core::visitor::VisitCache;
use crate::error::ExprError;

/// Memo table of a differentiation pass, keyed by `(node, variable)`.
#[derive(Default)]
pub struct DeriveCache {
    memo: VisitCache<(Expr, Expr)>,
}

impl DeriveCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `∂e/∂var`, reusing every derivative already computed by this cache.
    ///
    /// # Errors
    /// [`ExprError::UnimplementedRule`] when some node has no derivative rule.
    pub fn derive(&mut self, e: &Expr, var: &Expr) -> Result<Expr, ExprError> {
        let key = (e.clone(), var.clone());
        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit);
        }
        let d = engine::derive_node(self, e, var)?;
        self.memo.insert(key, d.clone());
        Ok(d)
    }

    /// Number of memoized derivatives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_variable(var: &Expr) -> Result<(), ExprError> {
    if var.is_symbol() {
        Ok(())
    } else {
        Err(ExprError::NotASymbol(var.to_string()))
    }
}

impl Expr {
    /// Partial derivative with respect to the symbol `var`.
    ///
    /// The result is canonical but not normalized; call
    /// [`Expr::normalize`] to fold constants and merge powers.
    ///
    /// # Errors
    /// [`ExprError::NotASymbol`] if `var` is not a symbol,
    /// [`ExprError::UnimplementedRule`] if some node has no derivative rule.
    pub fn derive(&self, var: &Expr) -> Result<Expr, ExprError> {
        check_variable(var)?;
        DeriveCache::new().derive(self, var)
    }

    /// Partial derivatives with respect to each of `vars`, sharing one cache.
    ///
    /// # Errors
    /// See [`Expr::derive`].
    pub fn gradient(&self, vars: &[Expr]) -> Result<Vec<Expr>, ExprError> {
        let mut cache = DeriveCache::new();
        let gradient = vars
            .iter()
            .map(|var| {
                check_variable(var)?;
                cache.derive(self, var)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "gradient over {} variable(s), {} memoized derivative(s)",
            vars.len(),
            cache.len()
        );
        Ok(gradient)
    }
}
