//! Small dense linear algebra on ndarray.
//!
//! Normal-equation systems in this crate are `n × n` with `n` the number of
//! free parameters, so an unpivoted Cholesky factorization is sufficient.

use crate::error::{FitError, Result};
use ndarray::{Array1, Array2};

/// Lower-triangular Cholesky factor `L` with `A = L Lᵀ`
///
/// # Errors
///
/// [`FitError::SingularMatrix`] if `a` is not symmetric positive definite
/// to working precision.
pub fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(FitError::shape("square matrix columns", n, a.ncols()));
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for k in 0..n {
        let mut diagonal = a[[k, k]];
        for j in 0..k {
            diagonal -= l[[k, j]] * l[[k, j]];
        }

        if diagonal <= 0.0 || !diagonal.is_finite() {
            return Err(FitError::SingularMatrix);
        }

        let lkk = diagonal.sqrt();
        l[[k, k]] = lkk;

        for i in k + 1..n {
            let mut value = a[[i, k]];
            for j in 0..k {
                value -= l[[i, j]] * l[[k, j]];
            }
            l[[i, k]] = value / lkk;
        }
    }

    Ok(l)
}

/// Solve `L Lᵀ x = b` given the Cholesky factor `L`
pub fn cholesky_solve_factored(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = b.clone();

    // Forward substitution (L * y = b)
    for i in 0..n {
        for j in 0..i {
            y[i] -= l[[i, j]] * y[j];
        }
        y[i] /= l[[i, i]];
    }

    // Backward substitution (L^T * x = y)
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = y[i];
        for j in (i + 1)..n {
            x[i] -= l[[j, i]] * x[j];
        }
        x[i] /= l[[i, i]];
    }

    x
}

/// Solve `A x = b` for symmetric positive definite `A`
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    if b.len() != a.nrows() {
        return Err(FitError::shape("right-hand side", a.nrows(), b.len()));
    }
    let l = cholesky(a)?;
    Ok(cholesky_solve_factored(&l, b))
}

/// Inverse of a symmetric positive definite matrix
pub fn cholesky_inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let l = cholesky(a)?;

    let mut inverse = Array2::zeros((n, n));
    let mut unit = Array1::zeros(n);
    for j in 0..n {
        unit[j] = 1.0;
        let column = cholesky_solve_factored(&l, &unit);
        inverse.column_mut(j).assign(&column);
        unit[j] = 0.0;
    }

    // Symmetrize against round-off
    let transposed = inverse.t().to_owned();
    Ok((inverse + transposed) * 0.5)
}
