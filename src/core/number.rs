//! Scalar literal type carried by numeric constants.
//!
//! A [`Number`] is either an exact machine integer or a float. Arithmetic
//! promotes to float as soon as one operand is a float, or when an integer
//! operation would overflow.

use num_traits::{One, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg};

/// Numeric literal: `Int` or `Float`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Value as `f64` (lossy for very large integers).
    #[inline]
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "Integers above 2^53 round to the nearest float"
    )]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(x) => x,
        }
    }

    /// Exact integer value, also for integral floats.
    #[must_use]
    pub fn to_i64(self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(n),
            Self::Float(x) if x.fract() == 0.0 => x.to_i64(),
            Self::Float(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_int(self) -> bool {
        matches!(self, Self::Int(_))
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        match self {
            Self::Int(n) => n < 0,
            Self::Float(x) => x < 0.0,
        }
    }

    /// `self ^ exponent`; integer powers with a non-negative exponent stay exact.
    #[must_use]
    pub fn pow(self, exponent: Self) -> Self {
        if let (Self::Int(base), Self::Int(exp)) = (self, exponent)
            && let Ok(exp) = u32::try_from(exp)
            && let Some(value) = base.checked_pow(exp)
        {
            return Self::Int(value);
        }
        Self::Float(self.to_f64().powf(exponent.to_f64()))
    }

    /// Key used for interning: floats by bit pattern with `-0.0` and NaN canonicalized.
    pub(crate) fn bits(self) -> NumberBits {
        match self {
            Self::Int(n) => NumberBits::Int(n),
            Self::Float(x) if x == 0.0 => NumberBits::Float(0.0_f64.to_bits()),
            Self::Float(x) if x.is_nan() => NumberBits::Float(f64::NAN.to_bits()),
            Self::Float(x) => NumberBits::Float(x.to_bits()),
        }
    }

    /// Total order by numeric value; equal values order `Int` before `Float`.
    #[must_use]
    pub fn total_cmp(self, other: Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(&b),
            _ => self
                .to_f64()
                .total_cmp(&other.to_f64())
                .then_with(|| other.is_int().cmp(&self.is_int())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NumberBits {
    Int(i64),
    Float(u64),
}

/// Same variant and same value. `Int(2) != Float(2.0)`: they live in different domains.
impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl Add for Number {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        if let (Self::Int(a), Self::Int(b)) = (self, rhs)
            && let Some(sum) = a.checked_add(b)
        {
            return Self::Int(sum);
        }
        Self::Float(self.to_f64() + rhs.to_f64())
    }
}

impl Mul for Number {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        if let (Self::Int(a), Self::Int(b)) = (self, rhs)
            && let Some(product) = a.checked_mul(b)
        {
            return Self::Int(product);
        }
        Self::Float(self.to_f64() * rhs.to_f64())
    }
}

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self {
        match self {
            Self::Int(n) => n.checked_neg().map_or(Self::Float(-self.to_f64()), Self::Int),
            Self::Float(x) => Self::Float(-x),
        }
    }
}

impl Zero for Number {
    fn zero() -> Self {
        Self::Int(0)
    }

    fn is_zero(&self) -> bool {
        match *self {
            Self::Int(n) => n == 0,
            Self::Float(x) => x == 0.0,
        }
    }
}

impl One for Number {
    fn one() -> Self {
        Self::Int(1)
    }

    fn is_one(&self) -> bool {
        match *self {
            Self::Int(n) => n == 1,
            Self::Float(x) => x == 1.0,
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Number {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) if x.fract() == 0.0 && x.abs() < 1e15 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}
