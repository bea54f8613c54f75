//! Built-in function definitions for the function registry
//!
//! Contains numeric evaluation and partial derivatives of the elementary
//! functions. Partials are expressed through the registry itself, so a partial
//! of `exp` is again an `exp` call node.
//!
//! # Derivative References
//! - `log`: ∂/∂x ln(x) = x⁻¹
//! - `exp`: ∂/∂x eˣ = eˣ
//! - `sin`, `cos`: ∂/∂x sin(x) = cos(x), ∂/∂x cos(x) = -sin(x)
//! - `pow`: ∂/∂b bᵉ = e·bᵉ⁻¹, ∂/∂e bᵉ = ln(b)·bᵉ

use super::registry::FunctionDefinition;
use super::{cos, exp, log, pow, sin};
use crate::Expr;
use crate::core::number::Number;
use crate::error::ExprError;

pub(crate) static LOG: FunctionDefinition = FunctionDefinition {
    name: "log",
    arity: 1,
    eval: eval_log,
    partial: partial_log,
};

pub(crate) static EXP: FunctionDefinition = FunctionDefinition {
    name: "exp",
    arity: 1,
    eval: eval_exp,
    partial: partial_exp,
};

pub(crate) static POW: FunctionDefinition = FunctionDefinition {
    name: "pow",
    arity: 2,
    eval: eval_pow,
    partial: partial_pow,
};

pub(crate) static SIN: FunctionDefinition = FunctionDefinition {
    name: "sin",
    arity: 1,
    eval: eval_sin,
    partial: partial_sin,
};

pub(crate) static COS: FunctionDefinition = FunctionDefinition {
    name: "cos",
    arity: 1,
    eval: eval_cos,
    partial: partial_cos,
};

// ===== Evaluation =====

fn eval_log(args: &[Number]) -> Number {
    Number::Float(args[0].to_f64().ln())
}

fn eval_exp(args: &[Number]) -> Number {
    Number::Float(args[0].to_f64().exp())
}

fn eval_pow(args: &[Number]) -> Number {
    args[0].pow(args[1])
}

fn eval_sin(args: &[Number]) -> Number {
    Number::Float(args[0].to_f64().sin())
}

fn eval_cos(args: &[Number]) -> Number {
    Number::Float(args[0].to_f64().cos())
}

// ===== Partial derivatives =====

fn partial_log(_: usize, args: &[Expr]) -> Result<Expr, ExprError> {
    Expr::pow(args[0].clone(), -1)
}

fn partial_exp(_: usize, args: &[Expr]) -> Result<Expr, ExprError> {
    Expr::call(exp(), vec![args[0].clone()])
}

fn partial_sin(_: usize, args: &[Expr]) -> Result<Expr, ExprError> {
    Expr::call(cos(), vec![args[0].clone()])
}

fn partial_cos(_: usize, args: &[Expr]) -> Result<Expr, ExprError> {
    Expr::call(sin(), vec![args[0].clone()])?.try_neg()
}

fn partial_pow(k: usize, args: &[Expr]) -> Result<Expr, ExprError> {
    let (base, exponent) = (&args[0], &args[1]);
    if k == 0 {
        // e · b^(e - 1)
        let lowered = Expr::sum([exponent.clone(), Expr::int(-1)])?;
        Expr::product([exponent.clone(), Expr::call(pow(), vec![base.clone(), lowered])?])
    } else {
        // ln(b) · b^e
        Expr::product([
            Expr::call(log(), vec![base.clone()])?,
            Expr::call(pow(), vec![base.clone(), exponent.clone()])?,
        ])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;
    use crate::Domain;

    #[test]
    fn test_pow_stays_exact_for_integers() {
        assert_eq!(eval_pow(&[Number::Int(3), Number::Int(2)]), Number::Int(9));
        assert_eq!(
            eval_pow(&[Number::Int(2), Number::Int(-1)]),
            Number::Float(0.5)
        );
    }

    #[test]
    fn test_partials() {
        let x = Expr::symbol("x", Domain::Reals);
        assert_eq!(
            partial_log(0, &[x.clone()]).unwrap(),
            Expr::pow(x.clone(), -1).unwrap()
        );
        assert_eq!(partial_cos(0, &[x.clone()]).unwrap(), -x.sin());
        let square = partial_pow(0, &[x.clone(), Expr::int(2)]).unwrap();
        assert_eq!(square, 2 * &x);
    }
}
