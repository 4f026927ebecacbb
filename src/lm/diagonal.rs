//! Batched solver for least-squares problems with a diagonal Jacobian.
//!
//! Each residual depends only on its own coordinate, so the problem splits
//! into independent scalar problems that are iterated together: one call of
//! the residual function advances every point. Each point keeps its own
//! damping factor and convergence flag.

use crate::error::{FitError, Result};
use ndarray::{Array1, Zip};

use super::algorithm::make_strictly_feasible;
use super::config::InversionConfig;

const INITIAL_LAMBDA: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e12;
const BOUNDARY_FRACTION: f64 = 0.995;

/// Vector function of a vector, evaluated pointwise.
pub type PointwiseFn<'a> = &'a dyn Fn(&Array1<f64>) -> Result<Array1<f64>>;

/// Outcome of [`minimize_diagonal`]
#[derive(Debug, Clone)]
pub struct DiagonalResult {
    /// Solution, one coordinate per residual
    pub x: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Per-point convergence flags
    pub converged: Vec<bool>,

    /// Number of sweeps over the active points
    pub iterations: usize,

    /// Number of residual evaluations, finite-difference evaluations included
    pub func_evals: usize,
}

impl DiagonalResult {
    /// Number of points that did not converge
    pub fn n_failed(&self) -> usize {
        self.converged.iter().filter(|&&c| !c).count()
    }

    pub fn success(&self) -> bool {
        self.n_failed() == 0
    }
}

/// Minimize `sum(residual(x)^2)` subject to `lower <= x <= upper`, where
/// `residual(x)[i]` depends only on `x[i]`.
///
/// `derivative(x)[i]` is `d residual[i] / d x[i]`. Without it the diagonal is
/// estimated by a forward difference that perturbs every coordinate at once.
///
/// # Errors
///
/// [`FitError::ShapeMismatch`] if the bounds or a function output do not
/// match `x0`. Points that fail to converge are reported in
/// [`DiagonalResult::converged`], not as an error.
pub fn minimize_diagonal(
    residual: PointwiseFn<'_>,
    derivative: Option<PointwiseFn<'_>>,
    x0: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    config: &InversionConfig,
) -> Result<DiagonalResult> {
    let n = x0.len();
    if lower.len() != n {
        return Err(FitError::shape("lower bounds", n, lower.len()));
    }
    if upper.len() != n {
        return Err(FitError::shape("upper bounds", n, upper.len()));
    }

    let mut func_evals = 0;
    let mut evaluate = |x: &Array1<f64>| -> Result<Array1<f64>> {
        func_evals += 1;
        let r = residual(x)?;
        if r.len() != n {
            return Err(FitError::shape("pointwise residuals", n, r.len()));
        }
        Ok(r)
    };

    let mut x = make_strictly_feasible(x0, lower, upper);
    let mut r = evaluate(&x)?;
    let mut lambda = Array1::from_elem(n, INITIAL_LAMBDA);
    let mut converged = vec![false; n];
    let mut failed = vec![false; n];
    let mut iterations = 0;

    while iterations < config.max_iterations {
        let jac = match derivative {
            Some(derivative) => {
                let d = derivative(&x)?;
                if d.len() != n {
                    return Err(FitError::shape("pointwise derivative", n, d.len()));
                }
                d
            }
            None => {
                let mut step = x.mapv(|v| config.diff_step * v.abs().max(1.0));
                Zip::from(&mut step).and(&x).and(upper).for_each(|h, &xi, &ub| {
                    if xi + *h > ub {
                        *h = -*h;
                    }
                });
                let shifted = evaluate(&(&x + &step))?;
                (&shifted - &r) / &step
            }
        };

        let mut trial = x.clone();
        let mut active = false;
        for i in 0..n {
            if converged[i] || failed[i] {
                continue;
            }

            let g = jac[i] * r[i];
            let v = if g < 0.0 && upper[i].is_finite() {
                upper[i] - x[i]
            } else if g > 0.0 && lower[i].is_finite() {
                x[i] - lower[i]
            } else {
                1.0
            };
            if (v * g).abs() < config.gtol || r[i] == 0.0 {
                converged[i] = true;
                continue;
            }
            if jac[i] == 0.0 || !jac[i].is_finite() {
                failed[i] = true;
                continue;
            }

            let mut delta = -r[i] / (jac[i] * (1.0 + lambda[i]));
            let target = x[i] + delta;
            if target >= upper[i] {
                delta = BOUNDARY_FRACTION * (upper[i] - x[i]);
            } else if target <= lower[i] {
                delta = BOUNDARY_FRACTION * (lower[i] - x[i]);
            }
            trial[i] = x[i] + delta;
            active = true;
        }

        if !active {
            break;
        }
        iterations += 1;

        let r_trial = evaluate(&trial)?;
        for i in 0..n {
            if converged[i] || failed[i] {
                continue;
            }
            // Step below the resolution of x
            if trial[i] == x[i] {
                converged[i] = true;
                continue;
            }

            let cost = r[i] * r[i];
            let new_cost = r_trial[i] * r_trial[i];
            let delta = trial[i] - x[i];
            let small_step = delta.abs() < config.xtol * (config.xtol + trial[i].abs());

            if new_cost.is_finite() && new_cost < cost {
                if cost - new_cost < config.ftol * cost || small_step {
                    converged[i] = true;
                }
                x[i] = trial[i];
                r[i] = r_trial[i];
                lambda[i] = (lambda[i] * LAMBDA_DOWN).max(MIN_LAMBDA);
            } else if small_step {
                converged[i] = true;
            } else {
                lambda[i] *= LAMBDA_UP;
                if lambda[i] > MAX_LAMBDA {
                    failed[i] = true;
                }
            }
        }
    }

    let n_failed = converged.iter().filter(|&&c| !c).count();
    log::debug!(
        "Diagonal solve: {} points, {} iterations, {} not converged",
        n,
        iterations,
        n_failed
    );

    Ok(DiagonalResult {
        x,
        residuals: r,
        converged,
        iterations,
        func_evals,
    })
}
