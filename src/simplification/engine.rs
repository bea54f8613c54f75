//! Normalization engine: bottom-up DAG walk to a fixpoint
//!
//! A node is normalized after its children. If rebuilding it over normalized
//! children changes it, the rebuilt node is normalized in turn; otherwise the
//! node-level rewrites in [`super::rewrite`] are tried, and a rewrite result is
//! normalized again. Every visited node and every result is memoized, so
//! shared sub-DAGs are processed once and results map to themselves.

use log::{debug, trace};

use super::Normalizer;
use super::rewrite;
use crate::core::expr::{Expr, ExprKind};
use crate::core::host::Value;
use crate::error::ExprError;
use crate::matrix::{self, Matrix};
use crate::Number;

impl Normalizer {
    pub(super) fn visit(&mut self, e: &Expr) -> Result<Expr, ExprError> {
        if let Some(hit) = self.memo.get(e) {
            return Ok(hit);
        }
        let children = e
            .children()
            .into_iter()
            .map(|c| self.visit(c))
            .collect::<Result<Vec<_>, _>>()?;
        let rebuilt = e.rebuild(children)?;

        let result = if rebuilt == *e {
            match self.rewrite(e)? {
                Some(next) if next != *e => {
                    trace!("{e} -> {next}");
                    self.visit(&next)?
                }
                _ => e.clone(),
            }
        } else {
            self.visit(&rebuilt)?
        };

        self.memo.insert(e.clone(), result.clone());
        self.memo.insert(result.clone(), result.clone());
        Ok(result)
    }

    /// One rewrite of a node whose children are normalized.
    fn rewrite(&mut self, e: &Expr) -> Result<Option<Expr>, ExprError> {
        match e.kind() {
            ExprKind::Apply { target, argument } => {
                if let Some(folded) = rewrite::fold_apply(&self.env, target, argument)? {
                    return Ok(Some(folded));
                }
                match e.as_power() {
                    Some((base, exponent)) => rewrite::power(base, exponent),
                    None => Ok(None),
                }
            }
            ExprKind::Sum(terms) => rewrite::fold_sum(&self.env, terms),
            ExprKind::MatrixMultiply(factors) => rewrite::fold_multiply(&self.env, factors),
            ExprKind::MatrixInverse(inner) => rewrite::fold_inverse(&self.env, inner),
            ExprKind::MatrixTranspose(inner) => rewrite::transpose(&self.env, inner),
            ExprKind::MatrixGenerator {
                rows,
                cols,
                element,
            } => self.tabulate(*rows, *cols, element),
            ExprKind::IndexedSum {
                index,
                lower,
                upper,
                body,
            } => {
                let (Some(Number::Int(lower)), Some(Number::Int(upper))) =
                    (lower.as_number(), upper.as_number())
                else {
                    return Ok(None);
                };
                let count = upper.saturating_sub(lower).saturating_add(1);
                if count <= 0 {
                    return Ok(Some(Expr::zero()));
                }
                if !self.may_unroll(e, count.unsigned_abs()) {
                    return Ok(None);
                }
                let terms = (lower..=upper)
                    .map(|k| body.substitute(&[(index.clone(), Expr::int(k))]))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::sum(terms).map(Some)
            }
            ExprKind::CollectionSum {
                index,
                collection,
                body,
            } => {
                let Some(Value::Array(array)) = collection.value() else {
                    return Ok(None);
                };
                let len = array.items().len();
                if !self.may_unroll(e, u64::try_from(len).unwrap_or(u64::MAX)) {
                    return Ok(None);
                }
                let terms = array
                    .items()
                    .iter()
                    .map(|item| body.substitute(&[(index.clone(), Expr::constant(item.clone()))]))
                    .collect::<Result<Vec<_>, _>>()?;
                Expr::sum(terms).map(Some)
            }
            ExprKind::Symbol(_)
            | ExprKind::Number(_)
            | ExprKind::Object(_)
            | ExprKind::Field(_)
            | ExprKind::Function(_)
            | ExprKind::Tuple(_) => Ok(None),
        }
    }

    fn may_unroll(&self, e: &Expr, count: u64) -> bool {
        let allowed = usize::try_from(count).is_ok_and(|n| n <= self.max_unroll);
        if !allowed {
            debug!(
                "keeping `{e}` symbolic: {count} term(s) exceed the unroll limit {}",
                self.max_unroll
            );
        }
        allowed
    }

    /// Constant matrix from a generator whose element only depends on the
    /// bound indices and folds to a number at every position.
    fn tabulate(&mut self, rows: usize, cols: usize, element: &Expr) -> Result<Option<Expr>, ExprError> {
        let (row, col) = (matrix::row_index(), matrix::col_index());
        if element.free_symbols().iter().any(|s| s != row && s != col) {
            return Ok(None);
        }
        let size = rows.saturating_mul(cols);
        if size > self.max_unroll {
            debug!("keeping {rows}x{cols} generator symbolic");
            return Ok(None);
        }
        let mut values = Vec::with_capacity(size);
        // column-major, as nalgebra stores it
        for j in 0..cols {
            for i in 0..rows {
                let at = element.substitute(&[
                    (row.clone(), Expr::from(i64::try_from(i).unwrap_or(i64::MAX))),
                    (col.clone(), Expr::from(i64::try_from(j).unwrap_or(i64::MAX))),
                ])?;
                match self.visit(&at)?.as_f64() {
                    Some(x) => values.push(x),
                    None => return Ok(None),
                }
            }
        }
        let m = Matrix::from_iterator(rows, cols, values);
        Ok(Some(Expr::constant(Value::from(m))))
    }
}
