//! Expression constructors.
//!
//! Leaf constructors (`symbol`, `int`, `real`, `constant`, `field`,
//! `function`) cannot fail except by exhausting the ordinal space, which is
//! fatal. Composite factories type-check against the domain lattice and
//! return `Result`.

use std::sync::Arc;

use super::{Expr, ExprKind, Node, product, sum};
use crate::core::domain::Domain;
use crate::core::host::{self, MemberResolver, Value};
use crate::core::number::Number;
use crate::core::store::{self, Key};
use crate::error::ExprError;
use crate::functions::{self, Function};
use crate::matrix;

/// Ordinal exhaustion leaves no way to build further nodes.
#[allow(clippy::panic, reason = "Ordinal exhaustion is unrecoverable")]
fn fatal(err: ExprError) -> ! {
    panic!("{err}")
}

impl Expr {
    // -------------------------------------------------------------------------
    // Leaf constructors
    // -------------------------------------------------------------------------

    /// Create a fresh symbol. Two calls with the same name give two symbols.
    ///
    /// # Panics
    /// Only if the node ordinal space is exhausted.
    pub fn symbol(name: impl Into<Arc<str>>, domain: Domain) -> Self {
        let name = name.into();
        store::fresh(|ordinal| Node::new(ordinal, domain, ExprKind::Symbol(name)))
            .unwrap_or_else(|err| fatal(err))
    }

    /// Numeric constant, interned by value.
    ///
    /// # Panics
    /// Only if the node ordinal space is exhausted.
    #[must_use]
    pub fn number(n: Number) -> Self {
        let domain = if n.is_int() {
            Domain::Integers
        } else {
            Domain::Reals
        };
        store::intern(Key::Number(n.bits()), |ordinal| {
            Node::new(ordinal, domain, ExprKind::Number(n))
        })
        .unwrap_or_else(|err| fatal(err))
    }

    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::number(Number::Int(n))
    }

    #[must_use]
    pub fn real(x: f64) -> Self {
        Self::number(Number::Float(x))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self::int(0)
    }

    #[must_use]
    pub fn one() -> Self {
        Self::int(1)
    }

    /// Member tag for `Apply(x, field)`.
    ///
    /// # Panics
    /// Only if the node ordinal space is exhausted.
    pub fn field(name: impl Into<Arc<str>>) -> Self {
        let name: Arc<str> = name.into();
        store::intern(Key::Field(name.clone()), |ordinal| {
            Node::new(ordinal, Domain::Fields, ExprKind::Field(name))
        })
        .unwrap_or_else(|err| fatal(err))
    }

    /// Function used as a value, ready to be applied.
    ///
    /// # Panics
    /// Only if the node ordinal space is exhausted.
    #[must_use]
    pub fn function(function: &Function) -> Self {
        let function = function.clone();
        store::intern(Key::Function(function.id()), |ordinal| {
            Node::new(ordinal, Domain::Functions, ExprKind::Function(function))
        })
        .unwrap_or_else(|err| fatal(err))
    }

    /// Bind a host value into an expression.
    ///
    /// Numbers, functions and fields become their own node kinds; tuples become
    /// tuples of constants; anything else is an object constant interned by the
    /// identity of its shared payload and its declared type.
    ///
    /// # Panics
    /// Only if the node ordinal space is exhausted.
    #[must_use]
    pub fn constant(value: Value) -> Self {
        Self::constant_resolved_by(value, host::reflect())
    }

    /// [`Expr::constant`] whose object members are typed by `resolver`, as
    /// with [`Domain::resolved_by`].
    ///
    /// # Panics
    /// Only if the node ordinal space is exhausted.
    #[must_use]
    pub fn constant_resolved_by(value: Value, resolver: &Arc<dyn MemberResolver>) -> Self {
        if let Some(n) = value.as_number() {
            return Self::number(n);
        }
        match value {
            Value::Function(function) => Self::function(&function),
            Value::Field(name) => Self::field(name),
            Value::Tuple(items) => Self::tuple(
                items
                    .iter()
                    .map(|item| Self::constant_resolved_by(item.clone(), resolver))
                    .collect(),
            )
            .unwrap_or_else(|err| fatal(err)),
            value => {
                let ty = value.host_type();
                let domain = Domain::resolved_by(&ty, resolver);
                let identity = value.identity().unwrap_or_default();
                let key = Key::Object(identity, ty, store::address_of(resolver));
                store::intern(key, |ordinal| {
                    Node::new(ordinal, domain, ExprKind::Object(value))
                })
                .unwrap_or_else(|err| fatal(err))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Composite factories
    // -------------------------------------------------------------------------

    /// Argument package. A one-element tuple is its element.
    ///
    /// # Errors
    /// Only [`ExprError::CounterExhausted`].
    pub fn tuple(items: Vec<Expr>) -> Result<Self, ExprError> {
        if items.len() == 1 {
            return Ok(items.into_iter().next().unwrap_or_else(Self::zero));
        }
        let key = Key::Tuple(items.iter().map(Expr::ordinal).collect());
        store::intern(key, |ordinal| {
            Node::new(ordinal, Domain::Universal, ExprKind::Tuple(items))
        })
    }

    /// Generalized application: product, call, indexing or member access.
    ///
    /// Multiplicative applications are collected into canonical product chains
    /// (coefficient first, equal bases merged into powers, scalars sorted,
    /// matrix factors last). Other applications are re-associated and ordered
    /// as far as the operands' domains allow.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedApplication`] when no domain hook types the pair,
    /// [`ExprError::ArityMismatch`] for calls with the wrong argument count.
    pub fn apply(target: Expr, argument: Expr) -> Result<Self, ExprError> {
        if let ExprKind::Function(function) = target.kind() {
            let function = function.clone();
            return function.apply(target, argument);
        }
        let domain = Self::resolve_apply(&target, &argument)?;
        if target.domain().is_contained_in(&Domain::Matrices)
            && argument.domain().is_contained_in(&Domain::Matrices)
        {
            return product::build(vec![target, argument]);
        }

        if let ExprKind::Apply {
            target: inner_target,
            argument: inner_argument,
        } = argument.kind()
            && Domain::are_associative(&target, inner_target, inner_argument)
        {
            let left = Self::apply(target, inner_target.clone())?;
            return Self::apply(left, inner_argument.clone());
        }
        if Domain::are_commutative(&target, &argument) && argument < target {
            let domain = Self::resolve_apply(&argument, &target)?;
            return Self::intern_apply(argument, target, domain);
        }
        Self::intern_apply(target, argument, domain)
    }

    /// `f(args...)`.
    ///
    /// # Errors
    /// See [`Expr::apply`].
    pub fn call(function: &Function, args: Vec<Expr>) -> Result<Self, ExprError> {
        Self::apply(Self::function(function), Self::tuple(args)?)
    }

    /// `base ^ exponent`.
    ///
    /// # Errors
    /// When either operand is not real-valued.
    pub fn pow(base: Expr, exponent: impl Into<Expr>) -> Result<Self, ExprError> {
        Self::call(functions::pow(), vec![base, exponent.into()])
    }

    /// Product of any number of factors; the empty product is one.
    ///
    /// # Errors
    /// See [`Expr::apply`].
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Result<Self, ExprError> {
        let mut factors = factors.into_iter();
        let Some(first) = factors.next() else {
            return Ok(Self::one());
        };
        factors.try_fold(first, Self::apply)
    }

    /// Sum with collected coefficients.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedSum`] when two terms cannot be added.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Result<Self, ExprError> {
        sum::build(terms)
    }

    /// Member access `self.name`.
    ///
    /// # Errors
    /// When the target's type has no such member.
    pub fn member(&self, name: &str) -> Result<Self, ExprError> {
        Self::apply(self.clone(), Self::field(name))
    }

    /// Positional access `self[args]`.
    ///
    /// # Errors
    /// When the target cannot be indexed by these arguments.
    pub fn at(&self, args: impl IntoIterator<Item = Expr>) -> Result<Self, ExprError> {
        Self::apply(self.clone(), Self::tuple(args.into_iter().collect())?)
    }

    // -------------------------------------------------------------------------
    // Fallible arithmetic
    // -------------------------------------------------------------------------

    /// # Errors
    /// [`ExprError::UnsupportedSum`].
    pub fn try_add(self, rhs: Expr) -> Result<Self, ExprError> {
        Self::sum([self, rhs])
    }

    /// # Errors
    /// [`ExprError::UnsupportedSum`].
    pub fn try_sub(self, rhs: Expr) -> Result<Self, ExprError> {
        let negated = rhs.try_neg()?;
        Self::sum([self, negated])
    }

    /// # Errors
    /// [`ExprError::UnsupportedApplication`].
    pub fn try_mul(self, rhs: Expr) -> Result<Self, ExprError> {
        Self::apply(self, rhs)
    }

    /// Division; dividing by a matrix multiplies by its inverse.
    ///
    /// # Errors
    /// [`ExprError::UnsupportedApplication`].
    pub fn try_div(self, rhs: Expr) -> Result<Self, ExprError> {
        let reciprocal = if rhs.domain().is_contained_in(&Domain::Reals) {
            Self::pow(rhs, Self::int(-1))?
        } else {
            matrix::inverse(rhs)?
        };
        Self::apply(self, reciprocal)
    }

    /// # Errors
    /// [`ExprError::UnsupportedApplication`].
    pub fn try_neg(self) -> Result<Self, ExprError> {
        Self::apply(Self::int(-1), self)
    }

    // -------------------------------------------------------------------------
    // Internals shared with the other factories
    // -------------------------------------------------------------------------

    /// Same node kind over new children (in [`Expr::children`] order), rebuilt
    /// through the canonicalizing factories.
    pub(crate) fn rebuild(&self, children: Vec<Expr>) -> Result<Self, ExprError> {
        if children.iter().zip(self.children()).all(|(new, old)| new == old) {
            return Ok(self.clone());
        }
        let mut children = children.into_iter();
        let mut next = || children.next().unwrap_or_else(Self::zero);
        match self.kind() {
            ExprKind::Symbol(_)
            | ExprKind::Number(_)
            | ExprKind::Object(_)
            | ExprKind::Field(_)
            | ExprKind::Function(_) => Ok(self.clone()),
            ExprKind::Tuple(items) => Self::tuple((0..items.len()).map(|_| next()).collect()),
            ExprKind::Sum(terms) => Self::sum((0..terms.len()).map(|_| next()).collect::<Vec<_>>()),
            ExprKind::MatrixMultiply(factors) => {
                matrix::multiply((0..factors.len()).map(|_| next()).collect())
            }
            ExprKind::Apply { .. } => {
                let target = next();
                Self::apply(target, next())
            }
            ExprKind::MatrixGenerator { rows, cols, .. } => matrix::generator(*rows, *cols, next()),
            ExprKind::MatrixInverse(_) => matrix::inverse(next()),
            ExprKind::MatrixTranspose(_) => matrix::transpose(next()),
            ExprKind::IndexedSum { index, .. } => {
                let (_, lower, upper, body) = (next(), next(), next(), next());
                Self::indexed_sum(lower, upper, |i| body.substitute(&[(index.clone(), i.clone())]))
            }
            ExprKind::CollectionSum { index, .. } => {
                let (_, collection, body) = (next(), next(), next());
                Self::collection_sum(collection, |v| {
                    body.substitute(&[(index.clone(), v.clone())])
                })
            }
        }
    }

    pub(crate) fn resolve_apply(target: &Expr, argument: &Expr) -> Result<Domain, ExprError> {
        Domain::resolve_apply(target, argument).ok_or_else(|| {
            ExprError::UnsupportedApplication {
                target: target.to_string(),
                target_domain: target.domain().to_string(),
                argument: argument.to_string(),
                argument_domain: argument.domain().to_string(),
            }
        })
    }

    /// Interns `Apply(target, argument)` as is.
    pub(crate) fn intern_apply(
        target: Expr,
        argument: Expr,
        domain: Domain,
    ) -> Result<Self, ExprError> {
        let key = Key::Apply(target.ordinal(), argument.ordinal());
        store::intern(key, |ordinal| {
            Node::new(ordinal, domain, ExprKind::Apply { target, argument })
        })
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Self::int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Self::int(i64::from(n))
    }
}

impl From<f64> for Expr {
    fn from(x: f64) -> Self {
        Self::real(x)
    }
}

impl From<Number> for Expr {
    fn from(n: Number) -> Self {
        Self::number(n)
    }
}

impl From<&Expr> for Expr {
    fn from(e: &Expr) -> Self {
        e.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::core::host::{HostArray, HostType};
    use crate::error::ErrorKind;

    #[test]
    fn test_numbers_intern_by_value() {
        assert_eq!(Expr::int(3), Expr::int(3));
        assert_eq!(Expr::real(0.5), Expr::real(0.5));
        assert_ne!(Expr::int(2), Expr::real(2.0));
        assert_eq!(*Expr::int(2).domain(), Domain::Integers);
        assert_eq!(*Expr::real(2.0).domain(), Domain::Reals);
    }

    #[test]
    fn test_symbols_are_distinct_handles() {
        let a = Expr::symbol("x", Domain::Reals);
        let b = Expr::symbol("x", Domain::Reals);
        assert_ne!(a, b);
    }

    #[test]
    fn test_one_element_tuple_collapses() {
        let x = Expr::symbol("x", Domain::Reals);
        assert_eq!(Expr::tuple(vec![x.clone()]).unwrap(), x);
        let pair = Expr::tuple(vec![x.clone(), Expr::int(1)]).unwrap();
        assert_eq!(pair, Expr::tuple(vec![x, Expr::int(1)]).unwrap());
    }

    #[test]
    fn test_type_error_on_unsupported_application() {
        let x = Expr::symbol("x", Domain::Reals);
        let err = Expr::apply(x, Expr::field("F")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_array_indexing_types_to_element_domain() {
        let a = Expr::symbol("a", Domain::of(&HostType::array(HostType::Integer)));
        let i = Expr::symbol("i", Domain::Integers);
        let element = a.at([i]).unwrap();
        assert_eq!(*element.domain(), Domain::Integers);
        assert!(!element.is_product());
    }

    #[test]
    fn test_constant_objects_intern_by_identity() {
        let array = Value::ints([1, 2]);
        let a = Expr::constant(array.clone());
        let b = Expr::constant(array);
        let c = Expr::constant(Value::ints([1, 2]));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(*a.domain(), Domain::of(&HostType::array(HostType::Integer)));
    }

    #[test]
    fn test_shared_items_with_different_element_types() {
        let Value::Array(ints) = Value::ints([1, 2]) else {
            unreachable!("ints builds an array");
        };
        let reals = Value::Array(HostArray {
            element: HostType::Real,
            items: ints.items.clone(),
        });
        let a = Expr::constant(Value::Array(ints));
        let b = Expr::constant(reals);
        assert_ne!(a, b);
        assert_eq!(*a.domain(), Domain::of(&HostType::array(HostType::Integer)));
        assert_eq!(*b.domain(), Domain::of(&HostType::array(HostType::Real)));
    }
}
