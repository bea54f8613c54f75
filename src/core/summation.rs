//! Bound-index summations.
//!
//! `Σ_{i=a}^{b} body(i)` and `Σ_{v ∈ c} body(v)` bind an index that is not
//! visible outside the node. The index is written as a placeholder symbol
//! chosen by nesting level: a summation whose body contains summations up to
//! level `n` uses the level `n + 1` placeholder. Alpha-equivalent summations
//! therefore intern to the same node, and an inner summation never binds the
//! placeholder of an enclosing one.

use std::sync::{LazyLock, Mutex, PoisonError};

use rustc_hash::FxHashMap;

use crate::core::domain::Domain;
use crate::core::expr::{Expr, ExprKind, Node};
use crate::core::host;
use crate::core::store::{self, Key};
use crate::error::ExprError;

static PLACEHOLDERS: LazyLock<Mutex<Vec<(usize, Domain, Expr)>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

fn placeholder(level: usize, domain: &Domain) -> Expr {
    let mut placeholders = PLACEHOLDERS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some((_, _, p)) = placeholders
        .iter()
        .find(|(l, d, _)| *l == level && d == domain)
    {
        return p.clone();
    }
    let p = Expr::symbol(format!("_{level}"), domain.clone());
    placeholders.push((level, domain.clone(), p.clone()));
    p
}

/// Deepest summation nesting inside `e`.
fn nesting(e: &Expr, memo: &mut FxHashMap<Expr, usize>) -> usize {
    if let Some(&depth) = memo.get(e) {
        return depth;
    }
    let inner = e
        .children()
        .into_iter()
        .map(|c| nesting(c, memo))
        .max()
        .unwrap_or(0);
    let depth = match e.kind() {
        ExprKind::IndexedSum { .. } | ExprKind::CollectionSum { .. } => inner + 1,
        _ => inner,
    };
    memo.insert(e.clone(), depth);
    depth
}

/// Writes `body(temp)` in terms of the placeholder for its nesting level.
fn bind(temp: &Expr, body: &Expr, domain: &Domain) -> Result<(Expr, Expr), ExprError> {
    let level = nesting(body, &mut FxHashMap::default()) + 1;
    let index = placeholder(level, domain);
    let body = body.substitute(&[(temp.clone(), index.clone())])?;
    Ok((index, body))
}

fn summable(body: &Expr) -> Result<Domain, ExprError> {
    Domain::resolve_sum(body.domain(), body.domain()).ok_or_else(|| {
        ExprError::UnsupportedSum {
            left: body.to_string(),
            left_domain: body.domain().to_string(),
            right: body.to_string(),
            right_domain: body.domain().to_string(),
        }
    })
}

fn type_error(target: &str, argument: &Expr) -> ExprError {
    ExprError::UnsupportedApplication {
        target: target.to_owned(),
        target_domain: Domain::Integers.to_string(),
        argument: argument.to_string(),
        argument_domain: argument.domain().to_string(),
    }
}

impl Expr {
    /// `Σ_{i = lower}^{upper} body(i)`, bounds inclusive.
    ///
    /// # Errors
    /// Non-integer bounds, a body that cannot be summed, or whatever `body`
    /// reports.
    pub fn indexed_sum<F>(
        lower: impl Into<Expr>,
        upper: impl Into<Expr>,
        body: F,
    ) -> Result<Expr, ExprError>
    where
        F: FnOnce(&Expr) -> Result<Expr, ExprError>,
    {
        let (lower, upper) = (lower.into(), upper.into());
        for bound in [&lower, &upper] {
            if !bound.domain().is_contained_in(&Domain::Integers) {
                return Err(type_error("sum bound", bound));
            }
        }
        let temp = Expr::symbol("i", Domain::Integers);
        let body = body(&temp)?;
        let domain = summable(&body)?;
        let (index, body) = bind(&temp, &body, &Domain::Integers)?;
        let key = Key::IndexedSum(
            index.ordinal(),
            lower.ordinal(),
            upper.ordinal(),
            body.ordinal(),
        );
        store::intern(key, |ordinal| {
            Node::new(
                ordinal,
                domain,
                ExprKind::IndexedSum {
                    index,
                    lower,
                    upper,
                    body,
                },
            )
        })
    }

    /// `Σ_{v ∈ collection} body(v)` over an indexable host collection.
    ///
    /// # Errors
    /// A collection whose elements cannot be typed, a body that cannot be
    /// summed, or whatever `body` reports.
    pub fn collection_sum<F>(collection: Expr, body: F) -> Result<Expr, ExprError>
    where
        F: FnOnce(&Expr) -> Result<Expr, ExprError>,
    {
        let element = match collection.domain() {
            Domain::Host(host) => host.index_domain(&[Domain::Integers])?,
            other => {
                let ty = other
                    .native_type()
                    .ok_or_else(|| type_error("sum over", &collection))?;
                Domain::of(&host::reflect().index_type(&ty, &[Domain::Integers])?)
            }
        };
        let temp = Expr::symbol("v", element.clone());
        let body = body(&temp)?;
        let domain = summable(&body)?;
        let (index, body) = bind(&temp, &body, &element)?;
        let key = Key::CollectionSum(index.ordinal(), collection.ordinal(), body.ordinal());
        store::intern(key, |ordinal| {
            Node::new(
                ordinal,
                domain,
                ExprKind::CollectionSum {
                    index,
                    collection,
                    body,
                },
            )
        })
    }
}
