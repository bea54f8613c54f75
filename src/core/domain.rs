//! Domain lattice.
//!
//! Every expression carries a [`Domain`]. Domains form a single-inheritance
//! chain ending at [`Domain::Universal`]:
//!
//! ```text
//! Integers -> Reals -> Matrices -> Universal
//! Functions ---------------------> Universal
//! Fields ------------------------> Universal
//! Host(ty) ----------------------> Universal
//! Custom(rules) -> rules.base()
//! ```
//!
//! Each domain answers a fixed set of hook questions (apply typing, sum
//! typing, commutativity, associativity, differentiation). A domain that has
//! no answer of its own delegates to its base, so a new domain only implements
//! the hooks it cares about.
//!
//! # Apply resolution
//!
//! The result domain of `Apply(target, argument)` is the first answer from:
//! 1. the target domain's left-apply hook,
//! 2. the argument domain's right-apply hook,
//! 3. the target domain's commutative-apply hook,
//! 4. the argument domain's commutative-apply hook.
//!
//! No answer is a type error.

use std::fmt;
use std::sync::Arc;

use crate::core::expr::{Expr, ExprKind};
use crate::core::host::{self, HostType, MemberResolver};
use crate::core::store;
use crate::diff::DeriveCache;
use crate::error::{ExprError, ResolveError};

/// Algebraic tag of an expression.
#[derive(Clone)]
pub enum Domain {
    Universal,
    Matrices,
    Reals,
    Integers,
    /// Named functions (`sin`, user functions, ...).
    Functions,
    /// Member tags; only meaningful as an application argument.
    Fields,
    /// Values of a host type (arrays, records), cached per type.
    Host(Arc<HostDomain>),
    /// User supplied rules.
    Custom(Arc<dyn DomainRules>),
}

/// Domain of one host type, with the resolver that types its members.
pub struct HostDomain {
    ty: HostType,
    resolver: Arc<dyn MemberResolver>,
}

impl HostDomain {
    pub fn host_type(&self) -> &HostType {
        &self.ty
    }

    pub fn resolver(&self) -> &Arc<dyn MemberResolver> {
        &self.resolver
    }

    /// Element domain of `self[arguments]`, typed by the same resolver.
    ///
    /// # Errors
    /// Whatever the resolver reports for the arguments.
    pub fn index_domain(&self, arguments: &[Domain]) -> Result<Domain, ResolveError> {
        let ty = self.resolver.index_type(&self.ty, arguments)?;
        Ok(Domain::resolved_by(&ty, &self.resolver))
    }

    fn left_apply(&self, argument: &Expr) -> Option<Domain> {
        match argument.kind() {
            ExprKind::Field(name) => self
                .resolver
                .field_type(&self.ty, name)
                .ok()
                .map(|ty| Domain::resolved_by(&ty, &self.resolver)),
            ExprKind::Tuple(items) => {
                let domains: Vec<Domain> = items.iter().map(|e| e.domain().clone()).collect();
                self.index_domain(&domains).ok()
            }
            _ => self.index_domain(std::slice::from_ref(argument.domain())).ok(),
        }
    }
}

impl fmt::Debug for HostDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostDomain")
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// Hook set of a user-defined domain. Every hook defaults to the base domain.
pub trait DomainRules: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn base(&self) -> Domain {
        Domain::Universal
    }

    fn native_type(&self) -> Option<HostType> {
        self.base().native_type()
    }

    fn left_apply(&self, target: &Expr, argument: &Expr) -> Option<Domain> {
        self.base().left_apply(target, argument)
    }

    fn right_apply(&self, target: &Expr, argument: &Expr) -> Option<Domain> {
        self.base().right_apply(target, argument)
    }

    fn commutative_apply(&self, this: &Expr, other: &Expr) -> Option<Domain> {
        self.base().commutative_apply(this, other)
    }

    fn sum(&self, other: &Domain) -> Option<Domain> {
        self.base().sum(other)
    }

    fn is_commutative(&self, other: &Domain) -> bool {
        self.base().is_commutative(other)
    }

    fn is_associative(&self, second: &Domain, third: &Domain) -> bool {
        self.base().is_associative(second, third)
    }

    fn derive(
        &self,
        target: &Expr,
        argument: &Expr,
        var: &Expr,
        cache: &mut DeriveCache,
    ) -> Option<Result<Expr, ExprError>> {
        self.base().derive(target, argument, var, cache)
    }
}

impl Domain {
    /// Domain of values of a host type, typed by [`ReflectResolver`](crate::ReflectResolver).
    #[must_use]
    pub fn of(ty: &HostType) -> Self {
        Self::resolved_by(ty, host::reflect())
    }

    /// Domain of values of a host type whose members and elements are typed
    /// by `resolver` while expressions are constructed.
    ///
    /// Domains of the same type compare equal whatever their resolver.
    #[must_use]
    pub fn resolved_by(ty: &HostType, resolver: &Arc<dyn MemberResolver>) -> Self {
        match ty {
            HostType::Any => Self::Universal,
            HostType::Integer => Self::Integers,
            HostType::Real => Self::Reals,
            HostType::Matrix => Self::Matrices,
            HostType::Function => Self::Functions,
            HostType::Array(_) | HostType::Record(_) => store::host_domain(ty, resolver, || {
                Self::Host(Arc::new(HostDomain {
                    ty: ty.clone(),
                    resolver: resolver.clone(),
                }))
            }),
        }
    }

    pub fn custom(rules: impl DomainRules + 'static) -> Self {
        Self::Custom(Arc::new(rules))
    }

    /// Parent in the chain; `None` only for `Universal`.
    #[must_use]
    pub fn base(&self) -> Option<Domain> {
        match self {
            Self::Universal => None,
            Self::Matrices | Self::Functions | Self::Fields | Self::Host(_) => {
                Some(Self::Universal)
            }
            Self::Reals => Some(Self::Matrices),
            Self::Integers => Some(Self::Reals),
            Self::Custom(rules) => Some(rules.base()),
        }
    }

    /// Host type this domain represents, if any.
    #[must_use]
    pub fn native_type(&self) -> Option<HostType> {
        match self {
            Self::Universal | Self::Fields => None,
            Self::Matrices => Some(HostType::Matrix),
            Self::Reals => Some(HostType::Real),
            Self::Integers => Some(HostType::Integer),
            Self::Functions => Some(HostType::Function),
            Self::Host(host) => Some(host.ty.clone()),
            Self::Custom(rules) => rules.native_type(),
        }
    }

    /// `self <= other`: walks the base chain of `self` looking for `other`.
    #[must_use]
    pub fn is_contained_in(&self, other: &Domain) -> bool {
        let mut current = Some(self.clone());
        while let Some(domain) = current {
            if domain == *other {
                return true;
            }
            current = domain.base();
        }
        false
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Domain) -> bool {
        other.is_contained_in(self)
    }

    // =========================================================================
    // HOOKS
    // =========================================================================

    pub fn left_apply(&self, target: &Expr, argument: &Expr) -> Option<Domain> {
        let arg = argument.domain();
        match self {
            Self::Integers if arg.is_contained_in(&Self::Integers) => Some(Self::Integers),
            Self::Reals | Self::Integers if arg.is_contained_in(&Self::Reals) => Some(Self::Reals),
            Self::Matrices | Self::Reals | Self::Integers if arg.is_contained_in(&Self::Matrices) => {
                Some(Self::Matrices)
            }
            Self::Functions => match target.kind() {
                ExprKind::Function(function) => function.result_domain(argument),
                _ => None,
            },
            Self::Host(host) => host.left_apply(argument),
            Self::Custom(rules) => rules.left_apply(target, argument),
            _ => self.base()?.left_apply(target, argument),
        }
    }

    pub fn right_apply(&self, target: &Expr, argument: &Expr) -> Option<Domain> {
        match self {
            Self::Custom(rules) => rules.right_apply(target, argument),
            _ => self.base()?.right_apply(target, argument),
        }
    }

    pub fn commutative_apply(&self, this: &Expr, other: &Expr) -> Option<Domain> {
        match self {
            Self::Custom(rules) => rules.commutative_apply(this, other),
            _ => self.base()?.commutative_apply(this, other),
        }
    }

    pub fn sum(&self, other: &Domain) -> Option<Domain> {
        match self {
            Self::Integers if other.is_contained_in(&Self::Integers) => Some(Self::Integers),
            Self::Reals | Self::Integers if other.is_contained_in(&Self::Reals) => Some(Self::Reals),
            Self::Matrices | Self::Reals | Self::Integers
                if other.is_contained_in(&Self::Matrices) =>
            {
                Some(Self::Matrices)
            }
            Self::Custom(rules) => rules.sum(other),
            _ => self.base()?.sum(other),
        }
    }

    pub fn is_commutative(&self, other: &Domain) -> bool {
        match self {
            // scalars commute with anything matrix-like
            Self::Reals | Self::Integers if other.is_contained_in(&Self::Matrices) => true,
            Self::Matrices if other.is_contained_in(&Self::Reals) => true,
            Self::Custom(rules) => rules.is_commutative(other),
            _ => self.base().is_some_and(|base| base.is_commutative(other)),
        }
    }

    pub fn is_associative(&self, second: &Domain, third: &Domain) -> bool {
        match self {
            Self::Matrices | Self::Reals | Self::Integers => {
                second.is_contained_in(&Self::Matrices) && third.is_contained_in(&Self::Matrices)
            }
            Self::Custom(rules) => rules.is_associative(second, third),
            _ => self
                .base()
                .is_some_and(|base| base.is_associative(second, third)),
        }
    }

    /// Derivative of `Apply(target, argument)`, asked of the target's domain.
    ///
    /// `None` means this domain chain has no rule.
    pub fn derive(
        &self,
        target: &Expr,
        argument: &Expr,
        var: &Expr,
        cache: &mut DeriveCache,
    ) -> Option<Result<Expr, ExprError>> {
        match self {
            Self::Matrices | Self::Reals | Self::Integers => {
                Some(product_rule(target, argument, var, cache))
            }
            Self::Functions => match target.kind() {
                ExprKind::Function(function) => Some(function.chain_rule(argument, var, cache)),
                _ => None,
            },
            Self::Host(_) => Some(access_rule(target, argument, var, cache)),
            Self::Custom(rules) => rules.derive(target, argument, var, cache),
            _ => self.base()?.derive(target, argument, var, cache),
        }
    }

    // =========================================================================
    // OPERATION-INSTANCE QUERIES
    // =========================================================================

    /// Result domain of `Apply(target, argument)`, or `None` for a type error.
    #[must_use]
    pub fn resolve_apply(target: &Expr, argument: &Expr) -> Option<Domain> {
        let (t, a) = (target.domain(), argument.domain());
        t.left_apply(target, argument)
            .or_else(|| a.right_apply(target, argument))
            .or_else(|| t.commutative_apply(target, argument))
            .or_else(|| a.commutative_apply(argument, target))
    }

    #[must_use]
    pub fn resolve_sum(left: &Domain, right: &Domain) -> Option<Domain> {
        left.sum(right).or_else(|| right.sum(left))
    }

    #[must_use]
    pub fn are_commutative(a: &Expr, b: &Expr) -> bool {
        a.domain().is_commutative(b.domain()) || b.domain().is_commutative(a.domain())
    }

    #[must_use]
    pub fn are_associative(a: &Expr, b: &Expr, c: &Expr) -> bool {
        let (a, b, c) = (a.domain(), b.domain(), c.domain());
        a.is_associative(b, c) || b.is_associative(a, c) || c.is_associative(a, b)
    }
}

/// `d(f·g) = df·g + f·dg`, keeping operand order for non-commuting factors.
fn product_rule(
    target: &Expr,
    argument: &Expr,
    var: &Expr,
    cache: &mut DeriveCache,
) -> Result<Expr, ExprError> {
    let dt = cache.derive(target, var)?;
    let da = cache.derive(argument, var)?;
    let left = if dt.is_zero() {
        Expr::zero()
    } else {
        Expr::product([dt, argument.clone()])?
    };
    let right = if da.is_zero() {
        Expr::zero()
    } else {
        Expr::product([target.clone(), da])?
    };
    Expr::sum([left, right])
}

/// Member and element access: the index is piecewise constant, so only the
/// accessed container can vary.
fn access_rule(
    target: &Expr,
    argument: &Expr,
    var: &Expr,
    cache: &mut DeriveCache,
) -> Result<Expr, ExprError> {
    if cache.derive(target, var)?.is_zero() {
        Ok(Expr::zero())
    } else {
        Err(ExprError::unimplemented(
            "derivative",
            format!("{target}[{argument}]"),
        ))
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Host(a), Self::Host(b)) => a.ty == b.ty,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for Domain {}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Universal => f.write_str("universal"),
            Self::Matrices => f.write_str("matrices"),
            Self::Reals => f.write_str("reals"),
            Self::Integers => f.write_str("integers"),
            Self::Functions => f.write_str("functions"),
            Self::Fields => f.write_str("fields"),
            Self::Host(host) => write!(f, "host<{}>", host.ty),
            Self::Custom(rules) => f.write_str(rules.name()),
        }
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, reason = "Standard test relaxations")]
mod tests {
    use super::*;

    #[test]
    fn test_chain_containment() {
        assert!(Domain::Integers.is_contained_in(&Domain::Reals));
        assert!(Domain::Integers.is_contained_in(&Domain::Universal));
        assert!(Domain::Reals.is_contained_in(&Domain::Matrices));
        assert!(!Domain::Reals.is_contained_in(&Domain::Integers));
        assert!(!Domain::Functions.is_contained_in(&Domain::Reals));
        assert!(Domain::Universal.contains(&Domain::Fields));
    }

    #[test]
    fn test_sum_typing() {
        assert_eq!(
            Domain::resolve_sum(&Domain::Integers, &Domain::Integers),
            Some(Domain::Integers)
        );
        assert_eq!(
            Domain::resolve_sum(&Domain::Integers, &Domain::Reals),
            Some(Domain::Reals)
        );
        assert_eq!(
            Domain::resolve_sum(&Domain::Matrices, &Domain::Reals),
            Some(Domain::Matrices)
        );
        assert_eq!(Domain::resolve_sum(&Domain::Functions, &Domain::Reals), None);
    }

    #[test]
    fn test_commutativity_and_associativity() {
        assert!(Domain::Reals.is_commutative(&Domain::Matrices));
        assert!(!Domain::Matrices.is_commutative(&Domain::Matrices));
        assert!(Domain::Integers.is_associative(&Domain::Matrices, &Domain::Reals));
        assert!(!Domain::Functions.is_associative(&Domain::Reals, &Domain::Reals));
    }

    #[test]
    fn test_host_domains_are_cached_per_type() {
        let a = Domain::of(&HostType::array(HostType::Integer));
        let b = Domain::of(&HostType::array(HostType::Integer));
        let c = Domain::of(&HostType::array(HostType::Real));
        match (&a, &b) {
            (Domain::Host(a), Domain::Host(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("array types map to host domains"),
        }
        assert_ne!(a, c);
        assert_eq!(Domain::of(&HostType::Real), Domain::Reals);
        assert_eq!(a.native_type().unwrap(), HostType::array(HostType::Integer));
    }

    #[derive(Debug)]
    struct Angles;

    impl DomainRules for Angles {
        fn name(&self) -> &str {
            "angles"
        }

        fn base(&self) -> Domain {
            Domain::Reals
        }
    }

    #[test]
    fn test_custom_domain_delegates_to_base() {
        let angles = Domain::custom(Angles);
        assert!(angles.is_contained_in(&Domain::Reals));
        assert!(angles.is_commutative(&Domain::Reals));
        assert_eq!(angles.sum(&Domain::Reals), Some(Domain::Reals));
        assert_eq!(angles.native_type(), Some(HostType::Real));
        assert_eq!(angles.to_string(), "angles");
    }
}
