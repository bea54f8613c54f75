//! Substitution of sub-expressions.

use rustc_hash::FxHashMap;

use crate::core::expr::{Expr, ExprKind};
use crate::core::visitor::VisitCache;
use crate::error::ExprError;

struct Substituter<'a> {
    replacements: FxHashMap<&'a Expr, &'a Expr>,
    cache: VisitCache,
}

impl Substituter<'_> {
    fn visit(&mut self, e: &Expr) -> Result<Expr, ExprError> {
        if let Some(&replacement) = self.replacements.get(e) {
            return Ok(replacement.clone());
        }
        if let Some(hit) = self.cache.get(e) {
            return Ok(hit);
        }
        // A summation binding one of the keys shadows it: only the bounds or
        // the collection are rewritten.
        let shadowed = match e.kind() {
            ExprKind::IndexedSum { index, .. } | ExprKind::CollectionSum { index, .. } => {
                self.replacements.contains_key(index)
            }
            _ => false,
        };
        let children = e.children();
        let last = children.len().saturating_sub(1);
        let children = children
            .into_iter()
            .enumerate()
            .map(|(position, c)| {
                // index first, body last
                if shadowed && (position == 0 || position == last) {
                    Ok(c.clone())
                } else {
                    self.visit(c)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let rebuilt = e.rebuild(children)?;
        self.cache.insert(e.clone(), rebuilt.clone());
        Ok(rebuilt)
    }
}

impl Expr {
    /// Replace every occurrence of each `from` with its `to`, simultaneously.
    ///
    /// Shared sub-expressions are rewritten once; the result is rebuilt
    /// through the canonicalizing factories, so `2*x + 3*y` with `x = 3`,
    /// `y = -2` becomes the constant `0`. With no effective substitution the
    /// result is `self`.
    ///
    /// # Errors
    /// A replacement that makes some node ill-typed.
    pub fn substitute(&self, pairs: &[(Expr, Expr)]) -> Result<Expr, ExprError> {
        let replacements: FxHashMap<&Expr, &Expr> = pairs
            .iter()
            .filter(|(from, to)| from != to)
            .map(|(from, to)| (from, to))
            .collect();
        if replacements.is_empty() {
            return Ok(self.clone());
        }
        Substituter {
            replacements,
            cache: VisitCache::default(),
        }
        .visit(self)
    }
}
