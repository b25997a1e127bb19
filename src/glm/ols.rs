//! Ordinary least squares via Householder QR with column pivoting
//!
//! Aliased (linearly dependent) columns are detected from the pivoted
//! diagonal of R and receive a zero coefficient, so collinear covariates do
//! not abort a fit: the fitted values are still the projection of `y` onto
//! the column space of `x`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{PipelineError, Result};

/// A pivoted QR factorization of a design matrix
#[derive(Debug, Clone)]
pub struct QrFactorization {
    /// Upper triangle holds R (columns in pivot order)
    r: Array2<f64>,
    /// Householder reflectors (v, tau) for each elimination step
    reflectors: Vec<(Vec<f64>, f64)>,
    /// perm[k] = original column placed at pivot position k
    perm: Vec<usize>,
    rank: usize,
}

impl QrFactorization {
    /// Factorize an m x p matrix (m rows = observations)
    pub fn new(x: ArrayView2<'_, f64>) -> Result<Self> {
        let (m, p) = x.dim();
        if m == 0 || p == 0 {
            return Err(PipelineError::InvalidInput {
                reason: "Design matrix has zero rows or columns".to_string(),
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::InvalidInput {
                reason: "Design matrix contains non-finite values".to_string(),
            });
        }

        let mut r = x.to_owned();
        let mut perm: Vec<usize> = (0..p).collect();
        let mut reflectors: Vec<(Vec<f64>, f64)> = Vec::with_capacity(m.min(p));

        for k in 0..m.min(p) {
            // Column pivoting: largest remaining norm over rows k..m
            let mut best_col = k;
            let mut best_norm_sq = -1.0;
            for j in k..p {
                let norm_sq: f64 = (k..m).map(|i| r[[i, j]] * r[[i, j]]).sum();
                if norm_sq > best_norm_sq {
                    best_norm_sq = norm_sq;
                    best_col = j;
                }
            }

            if best_col != k {
                for i in 0..m {
                    r.swap([i, k], [i, best_col]);
                }
                perm.swap(k, best_col);
            }

            let norm = best_norm_sq.sqrt();
            if norm == 0.0 {
                // Remaining columns are exactly zero
                break;
            }

            // Choose sign to avoid cancellation
            let alpha = if r[[k, k]] > 0.0 { -norm } else { norm };
            let mut v: Vec<f64> = (k..m).map(|i| r[[i, k]]).collect();
            v[0] -= alpha;
            let v_norm_sq: f64 = v.iter().map(|a| a * a).sum();
            let tau = 2.0 / v_norm_sq;

            for j in k..p {
                let dot: f64 = (k..m).map(|i| v[i - k] * r[[i, j]]).sum();
                let scale = tau * dot;
                for i in k..m {
                    r[[i, j]] -= scale * v[i - k];
                }
            }

            reflectors.push((v, tau));
        }

        // Tolerance: max(nrow, ncol) * eps * max(|diag(R)|)
        let max_abs_diag = (0..reflectors.len())
            .map(|i| r[[i, i]].abs())
            .fold(0.0f64, f64::max);
        let tol = (m.max(p) as f64) * f64::EPSILON * max_abs_diag;
        let rank = (0..reflectors.len())
            .take_while(|&i| r[[i, i]].abs() > tol)
            .count();

        Ok(Self {
            r,
            reflectors,
            perm,
            rank,
        })
    }

    /// Numerical rank of the factorized matrix
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of observations (rows)
    pub fn n_rows(&self) -> usize {
        self.r.nrows()
    }

    /// Number of coefficients (columns)
    pub fn n_cols(&self) -> usize {
        self.r.ncols()
    }

    /// Original column indices that were found to be aliased
    pub fn aliased_columns(&self) -> Vec<usize> {
        let mut cols: Vec<usize> = self.perm[self.rank..].to_vec();
        cols.sort_unstable();
        cols
    }

    /// Least-squares coefficients for response `y`
    ///
    /// Aliased columns get a zero coefficient.
    pub fn solve(&self, y: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let m = self.n_rows();
        if y.len() != m {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} observations", m),
                got: format!("{} observations", y.len()),
            });
        }

        // Apply Q' to y
        let mut qtb = y.to_vec();
        for (k, (v, tau)) in self.reflectors.iter().enumerate() {
            let dot: f64 = (k..m).map(|i| v[i - k] * qtb[i]).sum();
            let scale = tau * dot;
            for i in k..m {
                qtb[i] -= scale * v[i - k];
            }
        }

        // Back-substitution on the leading rank x rank block of R
        let rank = self.rank;
        let mut z = vec![0.0; rank];
        for i in (0..rank).rev() {
            let mut sum = qtb[i];
            for j in (i + 1)..rank {
                sum -= self.r[[i, j]] * z[j];
            }
            z[i] = sum / self.r[[i, i]];
        }

        let mut beta = Array1::zeros(self.n_cols());
        for (k, &col) in self.perm.iter().enumerate().take(rank) {
            beta[col] = z[k];
        }
        Ok(beta)
    }

    /// Residuals `y - x * beta` of the least-squares fit
    ///
    /// `x` must be the matrix this factorization was built from.
    pub fn residuals(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if x.dim() != (self.n_rows(), self.n_cols()) {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} x {} design", self.n_rows(), self.n_cols()),
                got: format!("{} x {} design", x.nrows(), x.ncols()),
            });
        }
        let beta = self.solve(y)?;
        Ok(&y - &x.dot(&beta))
    }
}
