//! Process-wide interning store.
//!
//! Every composite node is created through [`intern`], which looks the
//! structural [`Key`] up in a table of weak references and only allocates a
//! new node when no live node with that key exists. The table never keeps a
//! node alive: dead entries are swept once the table has doubled since the
//! previous sweep.
//!
//! Keys are built from child *ordinals*, never from child handles. Ordinals are
//! never reused, so a stale entry can only ever point at a dead node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, Weak};

use log::trace;
use rustc_hash::FxHashMap;

use crate::core::domain::Domain;
use crate::core::expr::{Expr, Node};
use crate::core::host::{HostType, MemberResolver};
use crate::core::number::NumberBits;
use crate::error::ExprError;

/// Structural identity of a composite node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    Number(NumberBits),
    /// Payload address, declared type and member resolver; arrays may share
    /// items.
    Object(usize, HostType, usize),
    Field(Arc<str>),
    Function(u64),
    Tuple(Box<[u64]>),
    Apply(u64, u64),
    Sum(Box<[u64]>),
    Generator(usize, usize, u64),
    Multiply(Box<[u64]>),
    Inverse(u64),
    Transpose(u64),
    IndexedSum(u64, u64, u64, u64),
    CollectionSum(u64, u64, u64),
}

const MIN_SWEEP_THRESHOLD: usize = 4096;

struct Store {
    table: FxHashMap<Key, Weak<Node>>,
    sweep_threshold: usize,
}

impl Store {
    fn sweep(&mut self) {
        let before = self.table.len();
        self.table.retain(|_, node| node.strong_count() > 0);
        self.sweep_threshold = (self.table.len() * 2).max(MIN_SWEEP_THRESHOLD);
        trace!(
            "interning store swept {} dead entries, {} live",
            before - self.table.len(),
            self.table.len()
        );
    }
}

static STORE: LazyLock<Mutex<Store>> = LazyLock::new(|| {
    Mutex::new(Store {
        table: FxHashMap::default(),
        sweep_threshold: MIN_SWEEP_THRESHOLD,
    })
});

static HOST_DOMAINS: LazyLock<Mutex<FxHashMap<(HostType, usize), Domain>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(1);

fn take_ordinal(counter: &AtomicU64) -> Result<u64, ExprError> {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
        .map_err(|_| ExprError::CounterExhausted)
}

/// Allocates the next node ordinal.
pub(crate) fn next_ordinal() -> Result<u64, ExprError> {
    take_ordinal(&NEXT_ORDINAL)
}

/// Returns the live node stored under `key`, or builds one with a fresh ordinal.
pub(crate) fn intern(key: Key, make: impl FnOnce(u64) -> Node) -> Result<Expr, ExprError> {
    let mut store = STORE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(existing) = store.table.get(&key).and_then(Weak::upgrade) {
        return Ok(Expr(existing));
    }
    let node = Arc::new(make(next_ordinal()?));
    store.table.insert(key, Arc::downgrade(&node));
    if store.table.len() > store.sweep_threshold {
        store.sweep();
    }
    Ok(Expr(node))
}

/// Builds a node that is never shared with another construction (symbols).
pub(crate) fn fresh(make: impl FnOnce(u64) -> Node) -> Result<Expr, ExprError> {
    Ok(Expr(Arc::new(make(next_ordinal()?))))
}

/// Identity of a resolver. Resolvers reachable from a live node or a cached
/// domain stay allocated, so the address is not reused while it matters.
pub(crate) fn address_of(resolver: &Arc<dyn MemberResolver>) -> usize {
    Arc::as_ptr(resolver).cast::<()>().addr()
}

/// Canonical domain for a host type and resolver, created on first request.
pub(crate) fn host_domain(
    ty: &HostType,
    resolver: &Arc<dyn MemberResolver>,
    make: impl FnOnce() -> Domain,
) -> Domain {
    let key = (ty.clone(), address_of(resolver));
    let mut domains = HOST_DOMAINS.lock().unwrap_or_else(PoisonError::into_inner);
    domains.entry(key).or_insert_with(make).clone()
}

/// Number of live interned nodes, after dropping dead entries.
pub fn live_nodes() -> usize {
    let mut store = STORE.lock().unwrap_or_else(PoisonError::into_inner);
    store.sweep();
    store.table.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_increase() {
        let counter = AtomicU64::new(7);
        assert_eq!(take_ordinal(&counter), Ok(7));
        assert_eq!(take_ordinal(&counter), Ok(8));
    }

    #[test]
    fn test_ordinal_exhaustion_is_reported() {
        let counter = AtomicU64::new(u64::MAX - 1);
        assert_eq!(take_ordinal(&counter), Ok(u64::MAX - 1));
        assert_eq!(take_ordinal(&counter), Err(ExprError::CounterExhausted));
        assert_eq!(take_ordinal(&counter), Err(ExprError::CounterExhausted));
    }
}
