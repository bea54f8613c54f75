//! Operator overloading and elementary function methods.
//!
//! The operators are thin wrappers over the fallible factories in
//! [`constructors`](super). A type error (adding a matrix to a function,
//! multiplying by a field tag, ...) panics with the error message; use
//! [`Expr::try_add`] and friends to handle it instead.

use std::ops::{Add, Div, Mul, Neg, Sub};

use super::Expr;
use crate::error::ExprError;
use crate::functions;

#[track_caller]
#[allow(clippy::panic, reason = "Operator overloads cannot return errors")]
fn checked(result: Result<Expr, ExprError>) -> Expr {
    match result {
        Ok(e) => e,
        Err(err) => panic!("{err}"),
    }
}

// ============================================================================
// Elementary functions
// ============================================================================

macro_rules! impl_math_functions {
    ($($fn_name:ident => $registry:path),* $(,)?) => {
        impl Expr {
            $(
                #[doc = concat!("`", stringify!($fn_name), "(self)`.")]
                ///
                /// # Panics
                /// If `self` is not real-valued.
                #[must_use]
                #[track_caller]
                pub fn $fn_name(&self) -> Expr {
                    checked(Expr::call($registry(), vec![self.clone()]))
                }
            )*
        }
    };
}

impl_math_functions!(
    sin => functions::sin,
    cos => functions::cos,
    exp => functions::exp,
    log => functions::log,
);

impl Expr {
    /// `self ^ exponent`.
    ///
    /// # Panics
    /// If either operand is not real-valued.
    #[must_use]
    #[track_caller]
    pub fn powi(&self, exponent: impl Into<Expr>) -> Expr {
        checked(Expr::pow(self.clone(), exponent))
    }
}

// ============================================================================
// Operator Overloading
// ============================================================================

macro_rules! impl_binary_ops {
    ($lhs:ty, $rhs:ty, $to_lhs:expr, $to_rhs:expr) => {
        impl Add<$rhs> for $lhs {
            type Output = Expr;
            #[track_caller]
            fn add(self, rhs: $rhs) -> Expr {
                checked(Expr::try_add($to_lhs(self), $to_rhs(rhs)))
            }
        }
        impl Sub<$rhs> for $lhs {
            type Output = Expr;
            #[track_caller]
            fn sub(self, rhs: $rhs) -> Expr {
                checked(Expr::try_sub($to_lhs(self), $to_rhs(rhs)))
            }
        }
        impl Mul<$rhs> for $lhs {
            type Output = Expr;
            #[track_caller]
            fn mul(self, rhs: $rhs) -> Expr {
                checked(Expr::try_mul($to_lhs(self), $to_rhs(rhs)))
            }
        }
        impl Div<$rhs> for $lhs {
            type Output = Expr;
            #[track_caller]
            fn div(self, rhs: $rhs) -> Expr {
                checked(Expr::try_div($to_lhs(self), $to_rhs(rhs)))
            }
        }
    };
}

impl_binary_ops!(Expr, Expr, |e: Expr| e, |r: Expr| r);
impl_binary_ops!(Expr, &Expr, |e: Expr| e, |r: &Expr| r.clone());
impl_binary_ops!(Expr, i64, |e: Expr| e, Expr::int);
impl_binary_ops!(Expr, f64, |e: Expr| e, Expr::real);
impl_binary_ops!(&Expr, &Expr, |e: &Expr| e.clone(), |r: &Expr| r.clone());
impl_binary_ops!(&Expr, Expr, |e: &Expr| e.clone(), |r: Expr| r);
impl_binary_ops!(&Expr, i64, |e: &Expr| e.clone(), Expr::int);
impl_binary_ops!(&Expr, f64, |e: &Expr| e.clone(), Expr::real);

// numbers on the left side
impl_binary_ops!(i64, Expr, Expr::int, |r: Expr| r);
impl_binary_ops!(i64, &Expr, Expr::int, |r: &Expr| r.clone());
impl_binary_ops!(f64, Expr, Expr::real, |r: Expr| r);
impl_binary_ops!(f64, &Expr, Expr::real, |r: &Expr| r.clone());

impl Neg for Expr {
    type Output = Expr;
    #[track_caller]
    fn neg(self) -> Expr {
        checked(self.try_neg())
    }
}

impl Neg for &Expr {
    type Output = Expr;
    #[track_caller]
    fn neg(self) -> Expr {
        checked(self.clone().try_neg())
    }
}
