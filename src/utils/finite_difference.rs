//! Finite difference methods for numerical differentiation.
//!
//! Forward differences back the solver when a problem has no analytical
//! Jacobian. Central differences with an absolute step are used to check
//! model Jacobians and derivatives.

use crate::error::{FitError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step size for forward differences.
const DEFAULT_EPSILON: f64 = 1e-8;

/// Default absolute step size for central differences.
pub const DEFAULT_DX: f64 = 1e-6;

/// Compute the Jacobian matrix using forward finite differences.
///
/// `J[i,j] = ∂residual[i]/∂param[j]`. The step is scaled with the magnitude
/// of each parameter.
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(FitError::shape("residuals", n_residuals, residuals.len()));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut perturbed = params.clone();

    for j in 0..n_params {
        let param_j = params[j];
        let eps_j = if param_j.abs() > 1.0 {
            param_j.abs() * eps
        } else {
            eps
        };

        perturbed[j] = param_j + eps_j;
        let residuals_perturbed = problem.eval(&perturbed)?;
        perturbed[j] = param_j;

        let mut column = jac.column_mut(j);
        column.assign(&((&residuals_perturbed - &residuals) / eps_j));
    }

    Ok(jac)
}

/// Central-difference Jacobian of a vector function of a parameter slice.
///
/// Returns shape `(params.len(), n_points)`, one row per parameter:
/// `(f(p + dx) - f(p - dx)) / (2 dx)`.
pub fn central_jacobian<F>(f: F, params: &[f64], dx: f64) -> Result<Array2<f64>>
where
    F: Fn(&[f64]) -> Result<Array1<f64>>,
{
    let mut perturbed = params.to_vec();
    let mut rows: Vec<Array1<f64>> = Vec::with_capacity(params.len());

    for j in 0..params.len() {
        perturbed[j] = params[j] + dx;
        let forward = f(&perturbed)?;
        perturbed[j] = params[j] - dx;
        let backward = f(&perturbed)?;
        perturbed[j] = params[j];

        rows.push((forward - backward) / (2.0 * dx));
    }

    let n_points = rows.first().map_or(0, Array1::len);
    let mut jac = Array2::zeros((params.len(), n_points));
    for (j, row) in rows.iter().enumerate() {
        if row.len() != n_points {
            return Err(FitError::shape("finite difference row", n_points, row.len()));
        }
        jac.row_mut(j).assign(row);
    }

    Ok(jac)
}

/// Central-difference derivative of a vector function w.r.t. its pointwise argument.
pub fn central_derivative<F>(f: F, x: &Array1<f64>, dx: f64) -> Result<Array1<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let forward = f(&(x + dx))?;
    let backward = f(&(x - dx))?;
    Ok((forward - backward) / (2.0 * dx))
}
