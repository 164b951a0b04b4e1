//! Utilities for covariance matrix validation
//!
//! Symmetry checks, symmetrization and a cyclic Jacobi eigenvalue
//! decomposition used to confirm that a covariance matrix is positive
//! semidefinite before it reaches the optimizer.

use super::CovarianceError;
use ndarray::{Array1, Array2};

/// Result of eigenvalue decomposition
#[derive(Debug, Clone)]
pub struct EigenDecomposition {
    /// Eigenvalues (sorted in descending order)
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors (columns are eigenvectors)
    pub eigenvectors: Array2<f64>,
}

impl EigenDecomposition {
    /// Smallest eigenvalue, or `None` for an empty matrix.
    pub fn min_eigenvalue(&self) -> Option<f64> {
        self.eigenvalues.iter().copied().reduce(f64::min)
    }

    /// Largest eigenvalue, or `None` for an empty matrix.
    pub fn max_eigenvalue(&self) -> Option<f64> {
        self.eigenvalues.iter().copied().reduce(f64::max)
    }
}

/// Return (A + Aᵀ) / 2.
pub fn symmetrize(matrix: &Array2<f64>) -> Array2<f64> {
    (matrix + &matrix.t()) / 2.0
}

/// Check symmetry up to a tolerance relative to the largest entry.
pub fn is_symmetric(matrix: &Array2<f64>, tolerance: f64) -> bool {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return false;
    }
    let scale = matrix.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
    for i in 0..n {
        for j in (i + 1)..n {
            if (matrix[[i, j]] - matrix[[j, i]]).abs() > tolerance * scale {
                return false;
            }
        }
    }
    true
}

/// Check positive semidefiniteness.
///
/// Eigenvalues down to `-tolerance * max(1, trace)` are accepted as rounding
/// noise, since sample covariances of collinear series are singular.
pub fn is_positive_semidefinite(
    matrix: &Array2<f64>,
    tolerance: f64,
) -> Result<bool, CovarianceError> {
    if matrix.nrows() == 0 {
        return Ok(true);
    }
    if matrix.diag().iter().any(|&d| d < 0.0) {
        return Ok(false);
    }

    let decomp = jacobi_eigendecomp(matrix, 100, 1e-14)?;
    let trace: f64 = matrix.diag().sum();
    let floor = -tolerance * trace.max(1.0);

    Ok(decomp.min_eigenvalue().is_none_or(|min| min >= floor))
}

/// Cyclic Jacobi eigenvalue decomposition for symmetric matrices
///
/// Each sweep annihilates every off-diagonal pair once. Converges
/// quadratically for the small matrices seen in portfolio problems.
///
/// # Arguments
/// * `matrix` - Symmetric matrix to decompose
/// * `max_sweeps` - Maximum number of full sweeps
/// * `tolerance` - Convergence threshold on the off-diagonal Frobenius norm
///
/// # Returns
/// * Eigenvalues and eigenvectors
pub fn jacobi_eigendecomp(
    matrix: &Array2<f64>,
    max_sweeps: usize,
    tolerance: f64,
) -> Result<EigenDecomposition, CovarianceError> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(CovarianceError::DimensionMismatch {
            expected: n,
            actual: matrix.ncols(),
        });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(CovarianceError::NonFinite);
    }

    let mut a = symmetrize(matrix);
    let mut v = Array2::<f64>::eye(n);
    let scale = a.iter().fold(0.0_f64, |acc, x| acc.max(x.abs())).max(1e-300);

    for _sweep in 0..max_sweeps {
        if off_diagonal_norm(&a) <= tolerance * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let (c, s) = rotation(a[[p, p]], a[[q, q]], a[[p, q]]);
                rotate(&mut a, &mut v, p, q, c, s);
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[j, j]].total_cmp(&a[[i, i]]));

    let eigenvalues = order.iter().map(|&i| a[[i, i]]).collect();
    let mut eigenvectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        eigenvectors.column_mut(dst).assign(&v.column(src));
    }

    Ok(EigenDecomposition {
        eigenvalues,
        eigenvectors,
    })
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            sum += 2.0 * a[[i, j]] * a[[i, j]];
        }
    }
    sum.sqrt()
}

/// (cos, sin) of the rotation zeroing a[p, q].
fn rotation(app: f64, aqq: f64, apq: f64) -> (f64, f64) {
    let theta = (aqq - app) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    (c, t * c)
}

fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    let n = a.nrows();

    // A <- Jᵀ A J, applied to columns then rows
    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = c * akp - s * akq;
        a[[k, q]] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = c * apk - s * aqk;
        a[[q, k]] = s * apk + c * aqk;
    }
    a[[p, q]] = 0.0;
    a[[q, p]] = 0.0;

    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}
