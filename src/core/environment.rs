//! Concrete evaluation of the two generic operations.
//!
//! Constant folding and compiled code both reduce `Apply` and `Sum` on
//! concrete [`Value`]s. Both go through an [`Environment`] so they agree on
//! every operand combination.

use std::sync::Arc;

use crate::core::host::{self, MemberResolver, Value};
use crate::error::ExprError;
use crate::matrix::{DenseArithmetic, Matrix, MatrixArithmetic};

/// Collaborators used to evaluate concrete values.
#[derive(Clone)]
pub struct Environment {
    pub(crate) resolver: Arc<dyn MemberResolver>,
    pub(crate) matrices: Arc<dyn MatrixArithmetic>,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            resolver: host::reflect().clone(),
            matrices: Arc::new(DenseArithmetic),
        }
    }
}

impl Environment {
    pub fn new(resolver: Arc<dyn MemberResolver>, matrices: Arc<dyn MatrixArithmetic>) -> Self {
        Self { resolver, matrices }
    }

    #[must_use]
    pub fn resolver(&self) -> &dyn MemberResolver {
        &*self.resolver
    }

    #[must_use]
    pub fn matrices(&self) -> &dyn MatrixArithmetic {
        &*self.matrices
    }

    /// `target(argument)`: call, product, member access or indexing.
    ///
    /// # Errors
    /// Resolver and matrix failures, and operand combinations with no meaning.
    pub fn apply(&self, target: &Value, argument: &Value) -> Result<Value, ExprError> {
        match (target, argument) {
            (Value::Function(function), _) => {
                let args = match argument {
                    Value::Tuple(items) if function.arity() != 1 => items.to_vec(),
                    _ => vec![argument.clone()],
                };
                function.evaluate(&args, self)
            }
            (Value::Matrix(a), Value::Matrix(b)) => {
                Ok(Value::from(self.matrices.multiply(a, b)?))
            }
            (Value::Matrix(m), scalar) | (scalar, Value::Matrix(m)) if scalar.as_number().is_some() => {
                let s = scalar.as_f64().unwrap_or_default();
                Ok(Value::from(self.matrices.scale(m, s)))
            }
            (_, Value::Field(name)) => Ok(self.resolver.field(target, name)?),
            (Value::Array(_) | Value::Object(_), Value::Tuple(items)) => {
                Ok(self.resolver.index(target, items)?)
            }
            (Value::Array(_) | Value::Object(_), _) => {
                Ok(self.resolver.index(target, std::slice::from_ref(argument))?)
            }
            _ => match (target.as_number(), argument.as_number()) {
                (Some(a), Some(b)) => Ok(Value::from(a * b)),
                _ => Err(ExprError::evaluation(format!("{target} applied to {argument}"))),
            },
        }
    }

    /// `left + right`. A scalar `s` added to a matrix stands for `s·I`.
    ///
    /// # Errors
    /// Shape mismatches and operands that cannot be added.
    pub fn add(&self, left: &Value, right: &Value) -> Result<Value, ExprError> {
        match (left, right) {
            (Value::Matrix(a), Value::Matrix(b)) => Ok(Value::from(self.matrices.add(a, b)?)),
            (Value::Matrix(m), scalar) | (scalar, Value::Matrix(m)) if scalar.as_number().is_some() => {
                let s = scalar.as_f64().unwrap_or_default();
                let diagonal = self.matrices.scale(&Matrix::identity(m.nrows(), m.ncols()), s);
                Ok(Value::from(self.matrices.add(m, &diagonal)?))
            }
            _ => match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => Ok(Value::from(a + b)),
                _ => Err(ExprError::evaluation(format!("{left} + {right}"))),
            },
        }
    }

    /// Sum of any number of values; the empty sum is `0`.
    ///
    /// # Errors
    /// See [`Environment::add`].
    pub fn sum<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> Result<Value, ExprError> {
        values
            .into_iter()
            .try_fold(Value::Int(0), |acc, v| self.add(&acc, v))
    }

    /// # Errors
    /// Non-square or singular matrices.
    pub fn inverse(&self, value: &Value) -> Result<Value, ExprError> {
        match value {
            Value::Matrix(m) => Ok(Value::from(self.matrices.invert(m)?)),
            _ => match value.as_number() {
                Some(n) => Ok(Value::from(n.pow(crate::Number::Int(-1)))),
                None => Err(ExprError::evaluation(format!("inverse of {value}"))),
            },
        }
    }

    /// # Errors
    /// Values that are neither scalars nor matrices.
    pub fn transpose(&self, value: &Value) -> Result<Value, ExprError> {
        match value {
            Value::Matrix(m) => Ok(Value::from(self.matrices.transpose(m))),
            _ if value.as_number().is_some() => Ok(value.clone()),
            _ => Err(ExprError::evaluation(format!("transpose of {value}"))),
        }
    }
}
