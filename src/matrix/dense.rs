//! Concrete matrix arithmetic.

use super::Matrix;
use crate::error::ExprError;

/// Dense arithmetic used when every operand of a matrix operation is concrete.
pub trait MatrixArithmetic: Send + Sync {
    /// # Errors
    /// Inner dimensions disagree.
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix, ExprError>;

    /// # Errors
    /// Shapes disagree.
    fn add(&self, a: &Matrix, b: &Matrix) -> Result<Matrix, ExprError>;

    fn scale(&self, a: &Matrix, factor: f64) -> Matrix;

    /// # Errors
    /// Non-square or singular input.
    fn invert(&self, a: &Matrix) -> Result<Matrix, ExprError>;

    fn transpose(&self, a: &Matrix) -> Matrix;
}

/// [`MatrixArithmetic`] over `nalgebra` dense matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseArithmetic;

impl MatrixArithmetic for DenseArithmetic {
    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix, ExprError> {
        if a.ncols() != b.nrows() {
            return Err(ExprError::matrix(
                "multiply",
                format!(
                    "{}x{} by {}x{}",
                    a.nrows(),
                    a.ncols(),
                    b.nrows(),
                    b.ncols()
                ),
            ));
        }
        Ok(a * b)
    }

    fn add(&self, a: &Matrix, b: &Matrix) -> Result<Matrix, ExprError> {
        if a.shape() != b.shape() {
            return Err(ExprError::matrix(
                "add",
                format!("{:?} and {:?}", a.shape(), b.shape()),
            ));
        }
        Ok(a + b)
    }

    fn scale(&self, a: &Matrix, factor: f64) -> Matrix {
        a * factor
    }

    fn invert(&self, a: &Matrix) -> Result<Matrix, ExprError> {
        if !a.is_square() {
            return Err(ExprError::matrix(
                "inverse",
                format!("{}x{} is not square", a.nrows(), a.ncols()),
            ));
        }
        a.clone()
            .try_inverse()
            .ok_or_else(|| ExprError::matrix("inverse", "matrix is singular"))
    }

    fn transpose(&self, a: &Matrix) -> Matrix {
        a.transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Standard test relaxations")]
mod tests {
    use super::*;

    #[test]
    fn test_shape_errors() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        assert!(DenseArithmetic.multiply(&a, &b).is_err());
        assert!(DenseArithmetic.add(&a, &b).is_ok());
        assert!(DenseArithmetic.invert(&a).is_err());
        assert!(DenseArithmetic.invert(&Matrix::zeros(2, 2)).is_err());
    }

    #[test]
    fn test_inverse() {
        let a = Matrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let inv = DenseArithmetic.invert(&a).unwrap();
        let id = DenseArithmetic.multiply(&a, &inv).unwrap();
        assert!((id - Matrix::identity(2, 2)).norm() < 1e-12);
    }
}
