//! Named functions
//!
//! A [`Function`] is a value that can be the target of an application:
//! `Apply(Function(f), Tuple(args))` is the call `f(args)`. Three kinds exist:
//!
//! - built-ins from the registry (`log`, `exp`, `pow`, `sin`, `cos`), with
//!   numeric evaluation and partial derivatives
//! - native functions backed by user closures
//! - lambdas, whose application substitutes the arguments into the body and
//!   therefore never appears as a call node

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::domain::Domain;
use crate::core::environment::Environment;
use crate::core::expr::{Expr, ExprKind};
use crate::core::host::Value;
use crate::core::number::Number;
use crate::diff::DeriveCache;
use crate::error::ExprError;
use crate::simplification::Normalizer;

pub(crate) mod definitions;
pub(crate) mod registry;

use registry::{FunctionDefinition, Registry};

/// Closure evaluating a native function on concrete arguments.
pub type NativeEval = dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync;

/// Closure returning `∂f/∂args[k]` as an expression of the call arguments.
pub type NativePartial = dyn Fn(usize, &[Expr]) -> Result<Expr, ExprError> + Send + Sync;

/// Shared handle to a named function. Equality is identity.
#[derive(Clone)]
pub struct Function(Arc<FunctionDef>);

struct FunctionDef {
    id: u64,
    name: Arc<str>,
    arity: usize,
    body: Body,
}

enum Body {
    Builtin(&'static FunctionDefinition),
    Native {
        eval: Arc<NativeEval>,
        partial: Option<Arc<NativePartial>>,
    },
    Lambda {
        params: Vec<Expr>,
        body: Expr,
    },
}

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

impl Function {
    fn new(name: Arc<str>, arity: usize, body: Body) -> Self {
        Self(Arc::new(FunctionDef {
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
            name,
            arity,
            body,
        }))
    }

    pub(crate) fn builtin(def: &'static FunctionDefinition) -> Self {
        Self::new(def.name.into(), def.arity, Body::Builtin(def))
    }

    /// Function evaluated by a host closure, without derivative rules.
    pub fn native<F>(name: impl Into<Arc<str>>, arity: usize, eval: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        Self::new(
            name.into(),
            arity,
            Body::Native {
                eval: Arc::new(eval),
                partial: None,
            },
        )
    }

    /// Function evaluated by a host closure, differentiable through `partial`.
    pub fn native_differentiable<F, P>(
        name: impl Into<Arc<str>>,
        arity: usize,
        eval: F,
        partial: P,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
        P: Fn(usize, &[Expr]) -> Result<Expr, ExprError> + Send + Sync + 'static,
    {
        Self::new(
            name.into(),
            arity,
            Body::Native {
                eval: Arc::new(eval),
                partial: Some(Arc::new(partial)),
            },
        )
    }

    /// `name(params) = body`.
    ///
    /// # Errors
    /// [`ExprError::NotASymbol`] if a parameter is not a symbol.
    pub fn lambda(
        name: impl Into<Arc<str>>,
        params: Vec<Expr>,
        body: Expr,
    ) -> Result<Self, ExprError> {
        if let Some(bad) = params.iter().find(|p| !p.is_symbol()) {
            return Err(ExprError::NotASymbol(bad.to_string()));
        }
        let arity = params.len();
        Ok(Self::new(name.into(), arity, Body::Lambda { params, body }))
    }

    /// Built-in function by name.
    #[must_use]
    pub fn builtin_named(name: &str) -> Option<Function> {
        Registry::get(name).cloned()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.0.arity
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }

    pub(crate) fn is_pow(&self) -> bool {
        *self == Registry::builtins().pow
    }

    /// Arguments carried by a call argument node.
    pub(crate) fn split_arguments<'a>(&self, argument: &'a Expr) -> Vec<&'a Expr> {
        match argument.kind() {
            ExprKind::Tuple(items) if self.arity() != 1 => items.iter().collect(),
            _ => vec![argument],
        }
    }

    fn check_arity(&self, got: usize) -> Result<(), ExprError> {
        if got == self.arity() {
            Ok(())
        } else {
            Err(ExprError::ArityMismatch {
                function: self.name().to_owned(),
                expected: self.arity(),
                got,
            })
        }
    }

    /// Result domain of a call; real-valued when every argument is.
    #[must_use]
    pub fn result_domain(&self, argument: &Expr) -> Option<Domain> {
        if let Body::Lambda { body, .. } = &self.0.body {
            return Some(body.domain().clone());
        }
        let args = self.split_arguments(argument);
        (args.len() == self.arity() && args.iter().all(|a| a.domain().is_contained_in(&Domain::Reals)))
            .then_some(Domain::Reals)
    }

    /// Builds `Apply(target, argument)` where `target` is this function's node.
    pub(crate) fn apply(&self, target: Expr, argument: Expr) -> Result<Expr, ExprError> {
        let args = self.split_arguments(&argument);
        self.check_arity(args.len())?;

        if let Body::Lambda { params, body } = &self.0.body {
            let pairs: Vec<(Expr, Expr)> = params
                .iter()
                .cloned()
                .zip(args.into_iter().cloned())
                .collect();
            return body.substitute(&pairs);
        }

        if self.is_pow() {
            let (base, exponent) = (args[0], args[1]);
            if exponent.is_zero() || base.is_one() {
                return Ok(Expr::one());
            }
            if exponent.is_one() {
                return Ok(base.clone());
            }
        }
        let domain = Expr::resolve_apply(&target, &argument)?;
        Expr::intern_apply(target, argument, domain)
    }

    /// `∂f/∂args[k]`.
    fn partial(&self, k: usize, args: &[Expr]) -> Result<Expr, ExprError> {
        let missing = || ExprError::unimplemented("partial derivative", self.name());
        match &self.0.body {
            Body::Builtin(def) => (def.partial)(k, args),
            Body::Native {
                partial: Some(partial),
                ..
            } => partial(k, args),
            Body::Native { partial: None, .. } | Body::Lambda { .. } => Err(missing()),
        }
    }

    /// Chain rule: `d f(u₁..uₙ) = Σ ∂f/∂uₖ · duₖ`, skipping constant arguments.
    pub(crate) fn chain_rule(
        &self,
        argument: &Expr,
        var: &Expr,
        cache: &mut DeriveCache,
    ) -> Result<Expr, ExprError> {
        let args: Vec<Expr> = self.split_arguments(argument).into_iter().cloned().collect();
        let mut terms = Vec::with_capacity(args.len());
        for (k, arg) in args.iter().enumerate() {
            let d = cache.derive(arg, var)?;
            if d.is_zero() {
                continue;
            }
            terms.push(Expr::product([self.partial(k, &args)?, d])?);
        }
        Expr::sum(terms)
    }

    /// Evaluate on concrete arguments.
    ///
    /// # Errors
    /// Arity mismatch, non-numeric arguments to a built-in, or whatever a
    /// native closure reports.
    pub fn evaluate(&self, args: &[Value], env: &Environment) -> Result<Value, ExprError> {
        self.check_arity(args.len())?;
        match &self.0.body {
            Body::Builtin(def) => {
                let numbers = args
                    .iter()
                    .map(|a| {
                        a.as_number().ok_or_else(|| {
                            ExprError::evaluation(format!("{}({a}): not a number", self.name()))
                        })
                    })
                    .collect::<Result<Vec<Number>, _>>()?;
                Ok(Value::from((def.eval)(&numbers)))
            }
            Body::Native { eval, .. } => eval(args),
            Body::Lambda { params, body } => {
                let pairs: Vec<(Expr, Expr)> = params
                    .iter()
                    .cloned()
                    .zip(args.iter().cloned().map(Expr::constant))
                    .collect();
                let bound = body.substitute(&pairs)?;
                let folded = Normalizer::with_environment(env.clone()).normalize(&bound)?;
                folded.value().ok_or_else(|| {
                    ExprError::evaluation(format!("{}: result `{folded}` is not constant", self.name()))
                })
            }
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Function {}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name(), self.arity())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ===== Built-in accessors =====

/// Natural logarithm.
#[must_use]
pub fn log() -> &'static Function {
    &Registry::builtins().log
}

#[must_use]
pub fn exp() -> &'static Function {
    &Registry::builtins().exp
}

/// `pow(base, exponent)`.
#[must_use]
pub fn pow() -> &'static Function {
    &Registry::builtins().pow
}

#[must_use]
pub fn sin() -> &'static Function {
    &Registry::builtins().sin
}

#[must_use]
pub fn cos() -> &'static Function {
    &Registry::builtins().cos
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builtins_are_unique() {
        assert_eq!(*pow(), *pow());
        assert_ne!(*sin(), *cos());
        assert_eq!(Function::builtin_named("exp").unwrap(), *exp());
        assert!(Function::builtin_named("tan").is_none());
    }

    #[test]
    fn test_arity_is_checked() {
        let x = Expr::symbol("x", Domain::Reals);
        let err = Expr::call(pow(), vec![x]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_pow_identities() {
        let x = Expr::symbol("x", Domain::Reals);
        assert!(Expr::pow(x.clone(), 0).unwrap().is_one());
        assert_eq!(Expr::pow(x.clone(), 1).unwrap(), x);
        assert!(Expr::pow(Expr::int(1), x).unwrap().is_one());
    }

    #[test]
    fn test_lambda_substitutes() {
        let a = Expr::symbol("a", Domain::Reals);
        let b = Expr::symbol("b", Domain::Reals);
        let f = Function::lambda("f", vec![a.clone(), b.clone()], &a * &b + &a).unwrap();
        let x = Expr::symbol("x", Domain::Reals);
        let call = Expr::call(&f, vec![x.clone(), Expr::int(2)]).unwrap();
        assert_eq!(call, 3 * &x);
        assert!(Function::lambda("g", vec![Expr::int(1)], a).is_err());
    }

    #[test]
    fn test_native_evaluation() {
        let twice = Function::native("twice", 1, |args: &[Value]| {
            let x = args[0].as_f64().unwrap_or_default();
            Ok(Value::Float(2.0 * x))
        });
        let env = Environment::default();
        assert_eq!(
            twice.evaluate(&[Value::Int(4)], &env).unwrap(),
            Value::Float(8.0)
        );
        assert_eq!(
            twice.evaluate(&[], &env).unwrap_err().kind(),
            ErrorKind::Type
        );
    }

    #[test]
    fn test_missing_partial_is_an_error() {
        let opaque = Function::native("opaque", 1, |args: &[Value]| Ok(args[0].clone()));
        let x = Expr::symbol("x", Domain::Reals);
        let call = Expr::call(&opaque, vec![x.clone()]).unwrap();
        let err = call.derive(&x).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnimplementedRule);
    }
}
