//! Dense nodal matrix with LU factorisation.
//!
//! Used at build time only: the R-type adaptor of a rigid group solves its
//! nodal equations once per port to obtain the scattering matrix.

use crate::error::{Result, WdfError};

/// Pivots smaller than this are treated as zero.
const PIVOT_EPSILON: f64 = 1e-15;

/// Square nodal admittance matrix `Y`, row-major.
#[derive(Debug, Clone)]
pub struct NodalMatrix {
    /// Matrix entries (row-major)
    pub a: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of A, valid after [`factor`](Self::factor)
    lu: Vec<f64>,
    /// Pivot permutation
    pivots: Vec<usize>,
    factored: bool,
}

impl NodalMatrix {
    /// Create a zero matrix of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            size,
            lu: vec![0.0; size * size],
            pivots: (0..size).collect(),
            factored: false,
        }
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
        self.factored = false;
    }

    /// Stamp a conductance between two nodes. `None` is the datum node.
    ///
    /// For a conductance G between nodes n1 and n2:
    ///   A[n1,n1] += G
    ///   A[n2,n2] += G
    ///   A[n1,n2] -= G
    ///   A[n2,n1] -= G
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.add(i, i, g);
        }
        if let Some(j) = n2 {
            self.add(j, j, g);
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.add(i, j, -g);
            self.add(j, i, -g);
        }
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);
        for (i, p) in self.pivots.iter_mut().enumerate() {
            *p = i;
        }

        for k in 0..n {
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val < PIVOT_EPSILON {
                return Err(WdfError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        self.factored = true;
        Ok(())
    }

    /// Solve `A x = rhs` using the LU decomposition, factoring first if the
    /// matrix changed.
    pub fn solve(&mut self, rhs: &[f64]) -> Result<Vec<f64>> {
        if !self.factored {
            self.factor()?;
        }
        let n = self.size;

        // Apply pivot permutation
        let mut x: Vec<f64> = self.pivots.iter().map(|&p| rhs[p]).collect();

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i * n + j] * x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i * n + j] * x[j];
            }
            let diag = self.lu[i * n + i];
            if diag.abs() < PIVOT_EPSILON {
                return Err(WdfError::SingularMatrix);
            }
            x[i] /= diag;
        }

        Ok(x)
    }
}
