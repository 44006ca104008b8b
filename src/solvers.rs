//! Banded linear solvers.

use crate::error::SimError;

/// Square tridiagonal matrix stored as its three bands.
///
/// For an `n × n` matrix, `lower[i]` is entry `(i + 1, i)`, `diag[i]` is
/// entry `(i, i)` and `upper[i]` is entry `(i, i + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal {
    pub lower: Vec<f64>,
    pub diag: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Tridiagonal {
    /// # Panics
    ///
    /// Panics if the off-diagonal bands are not exactly one shorter than the
    /// diagonal.
    pub fn new(lower: Vec<f64>, diag: Vec<f64>, upper: Vec<f64>) -> Self {
        let n = diag.len();
        assert!(n > 0, "tridiagonal matrix must not be empty");
        assert_eq!(lower.len(), n - 1);
        assert_eq!(upper.len(), n - 1);
        Self { lower, diag, upper }
    }

    pub fn dim(&self) -> usize {
        self.diag.len()
    }

    /// Computes `A·x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        let n = self.dim();
        (0..n)
            .map(|i| {
                let mut v = self.diag[i] * x[i];
                if i > 0 {
                    v += self.lower[i - 1] * x[i - 1];
                }
                if i + 1 < n {
                    v += self.upper[i] * x[i + 1];
                }
                v
            })
            .collect()
    }

    /// LU-factorizes the matrix (Thomas algorithm, no pivoting).
    ///
    /// The factorization can be reused for any number of right-hand sides.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::SingularSystem`] if a pivot vanishes.
    pub fn factorize(&self) -> Result<TridiagonalFactorization, SimError> {
        let n = self.dim();
        let mut pivots = Vec::with_capacity(n);
        let mut upper_scaled = Vec::with_capacity(n.saturating_sub(1));

        for i in 0..n {
            let pivot = if i == 0 {
                self.diag[0]
            } else {
                self.diag[i] - self.lower[i - 1] * upper_scaled[i - 1]
            };
            if !pivot.is_finite() || pivot.abs() <= f64::MIN_POSITIVE {
                return Err(SimError::SingularSystem { row: i });
            }
            pivots.push(pivot);
            if i + 1 < n {
                upper_scaled.push(self.upper[i] / pivot);
            }
        }

        Ok(TridiagonalFactorization {
            lower: self.lower.clone(),
            pivots,
            upper_scaled,
        })
    }
}

/// Factorized form of a [`Tridiagonal`] matrix; O(n) per solve.
#[derive(Debug, Clone, PartialEq)]
pub struct TridiagonalFactorization {
    lower: Vec<f64>,
    pivots: Vec<f64>,
    upper_scaled: Vec<f64>,
}

impl TridiagonalFactorization {
    /// Solves `A·x = rhs`.
    ///
    /// # Panics
    ///
    /// Panics if `rhs` does not match the matrix dimension.
    pub fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.pivots.len();
        assert_eq!(rhs.len(), n, "right-hand side has wrong dimension");

        let mut x = Vec::with_capacity(n);
        for i in 0..n {
            let carried = if i == 0 { 0.0 } else { self.lower[i - 1] * x[i - 1] };
            x.push((rhs[i] - carried) / self.pivots[i]);
        }
        for i in (0..n.saturating_sub(1)).rev() {
            x[i] -= self.upper_scaled[i] * x[i + 1];
        }
        x
    }
}
