//! Function inversion engine.
//!
//! A forward model `d = f(F, p)` that is monotonic in `F` is inverted point by
//! point with the batched diagonal solver. The parameter Jacobian and the
//! derivative of the inverse follow from the implicit function theorem:
//! differentiating `f(F(d), p) = d` gives
//! `∂F/∂p_k = -(∂f/∂p_k) / (∂f/∂F)` and `dF/dd = 1 / (∂f/∂F)`.

use crate::error::{FitError, Result};
use crate::lm::config::InversionConfig;
use crate::lm::diagonal::{minimize_diagonal, PointwiseFn};
use ndarray::{Array1, Array2, Axis};

/// Solve `forward(F) == target` for `F` within `[lower, upper]`
///
/// With `derivative`, the solver's diagonal Jacobian is `derivative(F)`;
/// otherwise it is estimated numerically.
///
/// # Errors
///
/// [`FitError::InversionFailure`] when the solver does not converge for one
/// or more points. No partially solved values are returned.
pub fn invert_function(
    target: &Array1<f64>,
    initial: &Array1<f64>,
    lower: f64,
    upper: f64,
    forward: PointwiseFn<'_>,
    derivative: Option<PointwiseFn<'_>>,
    config: &InversionConfig,
) -> Result<Array1<f64>> {
    let n = target.len();
    if initial.len() != n {
        return Err(FitError::shape("initial guess", n, initial.len()));
    }

    let residual = |f: &Array1<f64>| -> Result<Array1<f64>> { Ok(forward(f)? - target) };
    let result = minimize_diagonal(
        &residual,
        derivative,
        initial,
        &Array1::from_elem(n, lower),
        &Array1::from_elem(n, upper),
        config,
    )?;

    if !result.success() {
        let failed = result.n_failed();
        log::warn!("Inversion did not converge for {} of {} points", failed, n);
        return Err(FitError::InversionFailure {
            failed,
            total: n,
            message: format!(
                "no root within [{}, {}] after {} iterations",
                lower, upper, result.iterations
            ),
        });
    }

    Ok(result.x)
}

/// Parameter Jacobian of an inverted model
///
/// `inverted` solves the inverse at `target`; `forward_jacobian` (shape
/// `(n_params, n_points)`) and `forward_derivative` are evaluated at that
/// solution.
pub fn invert_jacobian<I, J, D>(
    target: &Array1<f64>,
    inverted: I,
    forward_jacobian: J,
    forward_derivative: D,
) -> Result<Array2<f64>>
where
    I: FnOnce(&Array1<f64>) -> Result<Array1<f64>>,
    J: FnOnce(&Array1<f64>) -> Result<Array2<f64>>,
    D: FnOnce(&Array1<f64>) -> Result<Array1<f64>>,
{
    let solved = inverted(target)?;
    let jacobian = forward_jacobian(&solved)?;
    let derivative = forward_derivative(&solved)?;

    if jacobian.ncols() != solved.len() {
        return Err(FitError::shape(
            "forward jacobian columns",
            solved.len(),
            jacobian.ncols(),
        ));
    }
    if derivative.len() != solved.len() {
        return Err(FitError::shape(
            "forward derivative",
            solved.len(),
            derivative.len(),
        ));
    }

    Ok(-(jacobian / &derivative.insert_axis(Axis(0))))
}

/// Derivative of an inverted model with respect to its own independent variable
pub fn invert_derivative<I, D>(
    target: &Array1<f64>,
    inverted: I,
    forward_derivative: D,
) -> Result<Array1<f64>>
where
    I: FnOnce(&Array1<f64>) -> Result<Array1<f64>>,
    D: FnOnce(&Array1<f64>) -> Result<Array1<f64>>,
{
    let solved = inverted(target)?;
    let derivative = forward_derivative(&solved)?;
    if derivative.len() != solved.len() {
        return Err(FitError::shape(
            "forward derivative",
            solved.len(),
            derivative.len(),
        ));
    }
    Ok(derivative.mapv(|d| 1.0 / d))
}
