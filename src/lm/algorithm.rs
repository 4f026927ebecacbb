//! Implementation of the bounded Levenberg-Marquardt algorithm.
//!
//! Iterates stay strictly inside the box `lower < x < upper`: a trial step
//! that would cross a bound is cut back, per component, to 99.5 % of the
//! distance to that bound. Models that are singular on a bound (for example
//! at zero persistence length) are therefore never evaluated there.

use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{FitError, Result};
use crate::problem::Problem;
use crate::utils::{finite_difference, linalg};

use super::config::{DiffMethod, LmConfig};
use super::convergence::{max_abs, norm, scaled_gradient, ConvergenceCriteria, ConvergenceStatus};

/// Fraction of the distance to a bound a cut-back step may travel.
const BOUNDARY_FRACTION: f64 = 0.995;

/// Relative offset used to move initial values strictly inside their bounds.
const FEASIBLE_STEP: f64 = 1e-10;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of residual evaluations, finite-difference evaluations included
    pub func_evals: usize,

    /// Whether the optimization converged
    pub success: bool,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for change in cost.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for the scaled gradient.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the method used for calculating the Jacobian.
    pub fn with_differentiation_method(mut self, method: DiffMethod) -> Self {
        self.config.diff_method = method;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Minimize the sum of squared residuals without bounds.
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
    ) -> Result<LmResult> {
        let n = initial_params.len();
        self.minimize_bounded(
            problem,
            initial_params,
            &Array1::from_elem(n, f64::NEG_INFINITY),
            &Array1::from_elem(n, f64::INFINITY),
        )
    }

    /// Minimize the sum of squared residuals subject to `lower <= x <= upper`.
    ///
    /// Initial values outside the box are moved strictly inside it first.
    ///
    /// # Errors
    ///
    /// - [`FitError::ShapeMismatch`] if `initial_params`, `lower` or `upper`
    ///   do not match the problem's parameter count
    /// - [`FitError::InvalidInput`] if a lower bound exceeds its upper bound
    /// - [`FitError::ConvergenceFailure`] if the residuals are not finite at
    ///   the start, or no finite trial step could be produced at all
    pub fn minimize_bounded<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(FitError::shape("initial parameters", n_params, initial_params.len()));
        }
        if lower.len() != n_params {
            return Err(FitError::shape("lower bounds", n_params, lower.len()));
        }
        if upper.len() != n_params {
            return Err(FitError::shape("upper bounds", n_params, upper.len()));
        }
        if let Some(i) = (0..n_params).find(|&i| !(lower[i] <= upper[i])) {
            return Err(FitError::InvalidInput(format!(
                "lower bound {} exceeds upper bound {} for parameter {}",
                lower[i], upper[i], i
            )));
        }

        let criteria = ConvergenceCriteria::from_config(&self.config);
        let mut params = make_strictly_feasible(&initial_params, lower, upper);
        let mut residuals = problem.eval(&params)?;
        let mut func_evals = 1;
        if residuals.len() != problem.residual_count() {
            return Err(FitError::shape(
                "residuals",
                problem.residual_count(),
                residuals.len(),
            ));
        }

        let mut cost = residuals.dot(&residuals);
        if !cost.is_finite() {
            return Err(FitError::ConvergenceFailure(
                "residuals are not finite at the initial parameters".to_string(),
            ));
        }

        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;
        let mut any_finite_trial = false;

        let status = 'outer: loop {
            let jac = self.jacobian(problem, &params)?;
            if !self.uses_analytical_jacobian(problem) {
                func_evals += n_params;
            }
            if jac.nrows() != residuals.len() {
                return Err(FitError::shape("jacobian rows", residuals.len(), jac.nrows()));
            }
            if jac.ncols() != n_params {
                return Err(FitError::shape("jacobian columns", n_params, jac.ncols()));
            }

            let gradient = jac.t().dot(&residuals);
            let gradient_norm = max_abs(&scaled_gradient(&params, &gradient, lower, upper));
            if gradient_norm < criteria.gtol {
                break ConvergenceStatus::GradientConvergence;
            }
            if iterations >= criteria.max_iterations {
                break ConvergenceStatus::MaxIterationsReached;
            }

            let jtj = jac.t().dot(&jac);

            loop {
                let step = match damped_step(&jtj, &gradient, lambda) {
                    Ok(step) => cut_to_bounds(&params, &step, lower, upper),
                    Err(FitError::SingularMatrix) => {
                        lambda *= self.config.lambda_up_factor;
                        if lambda > self.config.max_lambda {
                            break 'outer ConvergenceStatus::DampingExhausted;
                        }
                        continue;
                    }
                    Err(err) => return Err(err),
                };

                let new_params = &params + &step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = new_residuals.dot(&new_residuals);

                if new_cost.is_finite() {
                    any_finite_trial = true;
                }

                if new_cost.is_finite() && new_cost < cost {
                    iterations += 1;
                    let status = criteria.check(
                        &params,
                        &new_params,
                        cost,
                        new_cost,
                        f64::INFINITY,
                        iterations,
                    );

                    log::debug!(
                        "LM iteration {}: cost {:.6e} -> {:.6e}, lambda {:.1e}",
                        iterations,
                        cost,
                        new_cost,
                        lambda
                    );

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);

                    if status.is_converged() {
                        break 'outer status;
                    }
                    continue 'outer;
                }

                // Rejected; a vanishing step means nothing is left to gain
                if norm(&step) < criteria.xtol * (criteria.xtol + norm(&params)) {
                    break 'outer ConvergenceStatus::ParameterConvergence;
                }

                lambda *= self.config.lambda_up_factor;
                if lambda > self.config.max_lambda {
                    break 'outer ConvergenceStatus::DampingExhausted;
                }
            }
        };

        let attempted = matches!(
            status,
            ConvergenceStatus::ParameterConvergence | ConvergenceStatus::DampingExhausted
        );
        if iterations == 0 && attempted && !any_finite_trial {
            return Err(FitError::ConvergenceFailure(format!(
                "no trial step produced finite residuals ({})",
                status
            )));
        }

        let success = status.is_converged();
        if success {
            log::info!(
                "LM finished after {} iterations: {} (cost {:.6e})",
                iterations,
                status,
                cost
            );
        } else {
            log::warn!(
                "LM stopped after {} iterations without converging: {}",
                iterations,
                status
            );
        }

        let jacobian = if self.config.calc_jacobian {
            Some(self.jacobian(problem, &params)?)
        } else {
            None
        };

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            success,
            status,
            message: status.description().to_string(),
            jacobian,
        })
    }

    fn uses_analytical_jacobian<P: Problem + ?Sized>(&self, problem: &P) -> bool {
        self.config.diff_method == DiffMethod::Analytical && problem.has_custom_jacobian()
    }

    fn jacobian<P: Problem + ?Sized>(&self, problem: &P, params: &Array1<f64>) -> Result<Array2<f64>> {
        if self.uses_analytical_jacobian(problem) {
            problem.jacobian(params)
        } else {
            finite_difference::jacobian(problem, params, None)
        }
    }
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr`
///
/// Zero diagonal entries (parameters the residuals do not depend on) are
/// damped with a unit scale instead.
fn damped_step(jtj: &Array2<f64>, gradient: &Array1<f64>, lambda: f64) -> Result<Array1<f64>> {
    let mut a = jtj.clone();
    for i in 0..a.nrows() {
        let scale = if jtj[[i, i]] > 0.0 { jtj[[i, i]] } else { 1.0 };
        a[[i, i]] += lambda * scale;
    }
    let step = linalg::cholesky_solve(&a, gradient)?;
    if step.iter().all(|v| v.is_finite()) {
        Ok(-step)
    } else {
        Err(FitError::SingularMatrix)
    }
}

/// Cut each component of `step` that would leave the box back to a fraction
/// of the distance to the bound it crosses.
pub(crate) fn cut_to_bounds(
    params: &Array1<f64>,
    step: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
) -> Array1<f64> {
    let mut cut = step.clone();
    for i in 0..params.len() {
        let target = params[i] + step[i];
        if target >= upper[i] {
            cut[i] = BOUNDARY_FRACTION * (upper[i] - params[i]);
        } else if target <= lower[i] {
            cut[i] = BOUNDARY_FRACTION * (lower[i] - params[i]);
        }
    }
    cut
}

/// Move values onto or outside their bounds strictly inside the box.
pub(crate) fn make_strictly_feasible(
    params: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
) -> Array1<f64> {
    let mut x = params.clone();
    for i in 0..x.len() {
        let (lb, ub) = (lower[i], upper[i]);
        if x[i] <= lb {
            x[i] = lb + FEASIBLE_STEP * lb.abs().max(1.0);
        } else if x[i] >= ub {
            x[i] = ub - FEASIBLE_STEP * ub.abs().max(1.0);
        }
        if !(x[i] > lb && x[i] < ub) {
            x[i] = 0.5 * (lb + ub);
        }
    }
    x
}
