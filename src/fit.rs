//! Global fits of one or more models to many data sets.
//!
//! A [`FitObject`] owns its models, their data and one global parameter
//! registry. Every loaded data set maps the base parameters of its model
//! onto global parameters or constants; data sets with identical mappings
//! share a [`Condition`]. The global registry, the conditions and the
//! residual layout are rebuilt lazily: loading data only invalidates the
//! build, and every read goes through [`FitObject::ensure_built`].
//!
//! Residuals are stacked model by model, condition by condition and, within
//! a condition, in data-link order. [`FitObject::residuals`] and
//! [`FitObject::jacobian`] always share that row order.
//!
//! ```
//! use fdfit_rs::fit::FitObject;
//! use fdfit_rs::models::{force_model, ForceModelKind};
//! use ndarray::Array1;
//!
//! let model = force_model("DNA", ForceModelKind::Wlc).unwrap();
//! let mut fit = FitObject::new(model);
//!
//! let force = Array1::<f64>::linspace(1.0, 10.0, 10);
//! let distance = force.mapv(|f| 16.0 * (1.0 - 0.5 * (4.11 / (40.0 * f)).sqrt() + f / 1500.0));
//! fit.load_data(force.clone(), distance.clone(), "reference", &[]).unwrap();
//! fit.load_data(force, distance, "cut", &[("DNA_Lc", "DNA_Lc_cut".into())]).unwrap();
//!
//! assert_eq!(
//!     fit.parameters().unwrap().names(),
//!     vec!["DNA_Lp", "DNA_Lc", "DNA_St", "kT", "DNA_Lc_cut"]
//! );
//! ```

use crate::condition::{build_conditions, Condition};
use crate::data::{DataHandle, FitData};
use crate::error::{FitError, Result};
use crate::lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig};
use crate::model::Model;
use crate::parameters::{Parameter, Parameters};
use crate::problem::Problem;
use crate::statistics;
use crate::transformation::{self, Transformation};
use ndarray::{s, Array1, Array2, Axis};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A model with the data sets loaded into it
#[derive(Debug, Clone)]
struct FitModel {
    model: Arc<Model>,
    data: Vec<FitData>,
    conditions: Vec<Condition>,
    data_link: Vec<Vec<usize>>,
}

impl FitModel {
    fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            data: Vec::new(),
            conditions: Vec::new(),
            data_link: Vec::new(),
        }
    }
}

/// Outcome of [`FitObject::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Whether the optimizer converged
    pub success: bool,

    /// Why the optimizer stopped
    pub status: ConvergenceStatus,

    pub message: String,

    /// Sum of squared residuals at the solution
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        write!(f, "  Function evaluations: {}", self.func_evals)
    }
}

/// A global fit: models, their data and the shared parameter registry
#[derive(Debug, Clone)]
pub struct FitObject {
    models: Vec<FitModel>,
    parameters: Parameters,
    built: bool,
    generation: u64,
}

impl FitObject {
    /// Create a fit of a single model
    pub fn new(model: impl Into<Arc<Model>>) -> Self {
        Self::with_models(std::iter::once(model))
    }

    /// Create a fit of several models sharing one parameter registry
    ///
    /// Parameters with the same global name in different models are one
    /// parameter.
    pub fn with_models<M: Into<Arc<Model>>>(models: impl IntoIterator<Item = M>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| FitModel::new(model.into()))
                .collect(),
            parameters: Parameters::new(),
            built: false,
            generation: 0,
        }
    }

    /// Add a model and return its index for [`FitObject::load_data_for`]
    pub fn add_model(&mut self, model: impl Into<Arc<Model>>) -> usize {
        self.models.push(FitModel::new(model.into()));
        self.built = false;
        self.models.len() - 1
    }

    pub fn n_models(&self) -> usize {
        self.models.len()
    }

    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index).map(|m| m.model.as_ref())
    }

    /// Load a data set into the first model
    ///
    /// See [`FitObject::load_data_for`].
    pub fn load_data(
        &mut self,
        x: Array1<f64>,
        y: Array1<f64>,
        name: &str,
        substitutions: &[(&str, Transformation)],
    ) -> Result<DataHandle> {
        self.load_data_for(0, x, y, name, substitutions)
    }

    /// Load a data set into model `model_index`
    ///
    /// Each substitution maps one of the model's parameter names onto a
    /// (renamed) global parameter or a constant; unmentioned parameters map
    /// onto themselves.
    ///
    /// # Errors
    ///
    /// - [`FitError::UnknownParameter`] if a substitution names a parameter
    ///   the model does not have
    /// - [`FitError::ShapeMismatch`] if `x` and `y` differ in length
    /// - [`FitError::InvalidInput`] if there is no model `model_index`
    pub fn load_data_for(
        &mut self,
        model_index: usize,
        x: Array1<f64>,
        y: Array1<f64>,
        name: &str,
        substitutions: &[(&str, Transformation)],
    ) -> Result<DataHandle> {
        let fit_model = self.models.get_mut(model_index).ok_or_else(|| {
            FitError::InvalidInput(format!("no model with index {}", model_index))
        })?;

        let transformations =
            transformation::resolve(&fit_model.model.parameter_names(), substitutions)?;
        fit_model
            .data
            .push(FitData::new(name, x, y, transformations)?);
        self.built = false;

        Ok(DataHandle {
            model: model_index,
            index: fit_model.data.len() - 1,
        })
    }

    /// A loaded data set
    pub fn data(&self, handle: DataHandle) -> Option<&FitData> {
        self.models
            .get(handle.model)
            .and_then(|m| m.data.get(handle.index))
    }

    /// Rebuild the global registry and the conditions if data changed
    ///
    /// # Errors
    ///
    /// [`FitError::IncompatibleModel`] if a data set's transformations do not
    /// match its model.
    pub fn ensure_built(&mut self) -> Result<()> {
        if !self.built {
            self.build()?;
        }
        Ok(())
    }

    fn build(&mut self) -> Result<()> {
        let mut names: Vec<String> = Vec::new();
        let mut defaults: Vec<Option<Parameter>> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for fit_model in &self.models {
            for data in &fit_model.data {
                for (base, transformation) in data.transformations() {
                    if let Some(name) = transformation.free_name() {
                        if seen.insert(name.to_string()) {
                            names.push(name.to_string());
                            defaults.push(fit_model.model.default_parameter(base).cloned());
                        }
                    }
                }
            }
        }

        for fit_model in &mut self.models {
            let base_names = fit_model.model.parameter_names();
            let (conditions, data_link) = build_conditions(&fit_model.data, &names, &base_names)?;
            fit_model.conditions = conditions;
            fit_model.data_link = data_link;
        }

        self.parameters.set_parameters(&names, &defaults)?;
        self.built = true;
        self.generation += 1;

        log::debug!(
            "Built fit generation {}: {} global parameters, {} residuals",
            self.generation,
            names.len(),
            self.n_residuals()
        );
        Ok(())
    }

    /// Number of completed builds
    ///
    /// Changes whenever the global parameter layout may have changed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The global parameter registry
    pub fn parameters(&mut self) -> Result<&Parameters> {
        self.ensure_built()?;
        Ok(&self.parameters)
    }

    /// Mutable access to the global registry, e.g. to fix a parameter
    pub fn parameters_mut(&mut self) -> Result<&mut Parameters> {
        self.ensure_built()?;
        Ok(&mut self.parameters)
    }

    /// Number of global parameters
    pub fn n_parameters(&mut self) -> Result<usize> {
        self.ensure_built()?;
        Ok(self.parameters.len())
    }

    /// Total number of data points over all data sets
    pub fn n_residuals(&self) -> usize {
        self.models
            .iter()
            .flat_map(|m| m.data.iter())
            .map(FitData::len)
            .sum()
    }

    /// Conditions of model `model_index`
    pub fn conditions(&mut self, model_index: usize) -> Result<&[Condition]> {
        self.ensure_built()?;
        self.built_model(model_index)
            .map(|m| m.conditions.as_slice())
    }

    /// Per condition of model `model_index`, the indices of its data sets
    pub fn data_link(&mut self, model_index: usize) -> Result<&[Vec<usize>]> {
        self.ensure_built()?;
        self.built_model(model_index)
            .map(|m| m.data_link.as_slice())
    }

    fn built_model(&self, model_index: usize) -> Result<&FitModel> {
        self.models
            .get(model_index)
            .ok_or_else(|| FitError::InvalidInput(format!("no model with index {}", model_index)))
    }

    /// Stacked residuals `y - model(x)` at `global` (default: registry values)
    ///
    /// # Errors
    ///
    /// [`FitError::ShapeMismatch`] if `global` does not have one value per
    /// global parameter. Model errors propagate unchanged.
    pub fn residuals(&mut self, global: Option<&Array1<f64>>) -> Result<Array1<f64>> {
        self.ensure_built()?;
        let values = self.global_values(global)?;
        self.stacked_residuals(&values)
    }

    /// Residual Jacobian, shape `(n_residuals, n_parameters)`
    ///
    /// # Errors
    ///
    /// [`FitError::MissingDerivativeInfo`] if a model has no Jacobian.
    pub fn jacobian(&mut self, global: Option<&Array1<f64>>) -> Result<Array2<f64>> {
        self.ensure_built()?;
        let values = self.global_values(global)?;
        self.stacked_jacobian(&values)
    }

    fn global_values(&self, global: Option<&Array1<f64>>) -> Result<Array1<f64>> {
        match global {
            Some(values) if values.len() != self.parameters.len() => Err(FitError::shape(
                "global parameter vector",
                self.parameters.len(),
                values.len(),
            )),
            Some(values) => Ok(values.clone()),
            None => Ok(self.parameters.values()),
        }
    }

    fn stacked_residuals(&self, global: &Array1<f64>) -> Result<Array1<f64>> {
        let mut residuals = Array1::zeros(self.n_residuals());
        let mut offset = 0;

        for fit_model in &self.models {
            for (condition, link) in fit_model.conditions.iter().zip(&fit_model.data_link) {
                let local = condition.localize(global);
                for &i in link {
                    let data = &fit_model.data[i];
                    let prediction = fit_model.model.evaluate(data.x(), &local)?;
                    residuals
                        .slice_mut(s![offset..offset + data.len()])
                        .assign(&(data.y() - &prediction));
                    offset += data.len();
                }
            }
        }

        Ok(residuals)
    }

    fn stacked_jacobian(&self, global: &Array1<f64>) -> Result<Array2<f64>> {
        let mut jacobian = Array2::zeros((self.n_residuals(), global.len()));
        let mut offset = 0;

        for fit_model in &self.models {
            for (condition, link) in fit_model.conditions.iter().zip(&fit_model.data_link) {
                let local = condition.localize(global);
                for &i in link {
                    let data = &fit_model.data[i];
                    let sensitivities = fit_model.model.jacobian(data.x(), &local)?;
                    let mut rows = jacobian.slice_mut(s![offset..offset + data.len(), ..]);
                    // residual = y - model
                    condition.scatter_jacobian(&sensitivities, -1.0, &mut rows);
                    offset += data.len();
                }
            }
        }

        Ok(jacobian)
    }

    /// Evaluate the model of a data set with that data set's parameters
    ///
    /// Evaluates at `x` when given, at the data set's own independent values
    /// otherwise.
    pub fn predict(&mut self, handle: DataHandle, x: Option<&Array1<f64>>) -> Result<Array1<f64>> {
        self.ensure_built()?;
        let fit_model = self.built_model(handle.model)?;
        let data = fit_model.data.get(handle.index).ok_or_else(|| {
            FitError::InvalidInput(format!("no data set with index {}", handle.index))
        })?;

        let condition = fit_model
            .data_link
            .iter()
            .position(|link| link.contains(&handle.index))
            .map(|c| &fit_model.conditions[c])
            .ok_or_else(|| {
                FitError::InvalidInput(format!("data set '{}' has no condition", data.name))
            })?;

        let local = condition.localize(&self.parameters.values());
        fit_model.model.evaluate(x.unwrap_or(data.x()), &local)
    }

    /// Names of the parameters the optimizer varies, in registry order
    pub fn free_parameter_names(&mut self) -> Result<Vec<String>> {
        self.ensure_built()?;
        Ok(self
            .parameters
            .iter()
            .filter(|(_, p)| p.vary())
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn free_indices(&self) -> Vec<usize> {
        self.parameters
            .vary_mask()
            .iter()
            .enumerate()
            .filter(|(_, &vary)| vary)
            .map(|(i, _)| i)
            .collect()
    }

    /// Fit the free parameters and write the solution back into the registry
    ///
    /// Standard errors of the free parameters are stored alongside when the
    /// covariance can be computed.
    ///
    /// # Errors
    ///
    /// - [`FitError::InvalidInput`] if no parameter is free
    /// - [`FitError::ConvergenceFailure`] if the optimizer cannot take a step
    /// - model errors such as [`FitError::InversionFailure`], unchanged
    pub fn fit(&mut self, config: &LmConfig) -> Result<FitReport> {
        self.ensure_built()?;

        let free = self.free_indices();
        if free.is_empty() {
            return Err(FitError::InvalidInput(
                "no free parameters to fit".to_string(),
            ));
        }

        let values = self.parameters.values();
        let lower = self.parameters.lower_bounds().select(Axis(0), &free);
        let upper = self.parameters.upper_bounds().select(Axis(0), &free);
        let initial = values.select(Axis(0), &free);

        let analytical = self.has_jacobian();
        if !analytical {
            log::debug!("Not every model has a jacobian, using finite differences");
        }

        let result = {
            let problem = FreeParameterProblem {
                fit: &*self,
                template: values,
                free: &free,
                analytical,
            };
            LevenbergMarquardt::with_config(config.clone())
                .minimize_bounded(&problem, initial, &lower, &upper)?
        };

        let names: Vec<String> = self.parameters.names().iter().map(|n| n.to_string()).collect();
        for (&index, &value) in free.iter().zip(result.params.iter()) {
            self.parameters.set_value(&names[index], value)?;
        }

        self.store_standard_errors(&free, &names);

        let report = FitReport {
            success: result.success,
            status: result.status,
            message: result.message,
            cost: result.cost,
            iterations: result.iterations,
            func_evals: result.func_evals,
        };
        log::info!(
            "Fit finished after {} iterations: {} (cost {:.6e})",
            report.iterations,
            report.message,
            report.cost
        );
        Ok(report)
    }

    fn store_standard_errors(&mut self, free: &[usize], names: &[String]) {
        for &index in free {
            if let Some(parameter) = self.parameters.get_mut(&names[index]) {
                parameter.stderr = None;
            }
        }

        match self.free_covariance(free) {
            Ok(cov) => {
                let errors = statistics::standard_errors(&cov);
                for (&index, &error) in free.iter().zip(errors.iter()) {
                    if let Some(parameter) = self.parameters.get_mut(&names[index]) {
                        parameter.stderr = Some(error);
                    }
                }
            }
            Err(err) => log::warn!("Standard errors unavailable: {}", err),
        }
    }

    fn free_covariance(&self, free: &[usize]) -> Result<Array2<f64>> {
        let values = self.parameters.values();
        let at = values.select(Axis(0), free);
        let problem = FreeParameterProblem {
            fit: self,
            template: values,
            free,
            analytical: self.has_jacobian(),
        };
        let residuals = problem.eval(&at)?;
        let jacobian = problem.jacobian(&at)?;
        statistics::covariance(&jacobian, statistics::residual_sigma(&residuals))
    }

    /// Whether every model provides an analytical Jacobian
    fn has_jacobian(&self) -> bool {
        self.models.iter().all(|m| m.model.has_jacobian())
    }

    /// A-posteriori noise level of the current residuals
    pub fn sigma(&mut self) -> Result<f64> {
        let residuals = self.residuals(None)?;
        Ok(statistics::residual_sigma(&residuals))
    }

    /// Gaussian log-likelihood of the current residuals
    pub fn log_likelihood(&mut self) -> Result<f64> {
        let residuals = self.residuals(None)?;
        let sigma = statistics::residual_sigma(&residuals);
        Ok(statistics::log_likelihood(&residuals, sigma))
    }

    /// Akaike information criterion
    pub fn aic(&mut self) -> Result<f64> {
        let log_likelihood = self.log_likelihood()?;
        Ok(statistics::aic(log_likelihood, self.parameters.n_free()))
    }

    /// Akaike information criterion with small-sample correction
    pub fn aicc(&mut self) -> Result<f64> {
        let log_likelihood = self.log_likelihood()?;
        Ok(statistics::aicc(
            log_likelihood,
            self.parameters.n_free(),
            self.n_residuals(),
        ))
    }

    /// Bayesian information criterion
    pub fn bic(&mut self) -> Result<f64> {
        let log_likelihood = self.log_likelihood()?;
        Ok(statistics::bic(
            log_likelihood,
            self.parameters.n_free(),
            self.n_residuals(),
        ))
    }

    /// Covariance of the free parameters, in registry order
    ///
    /// # Errors
    ///
    /// [`FitError::SingularMatrix`] if a free parameter is not determined by
    /// the data.
    pub fn cov(&mut self) -> Result<Array2<f64>> {
        self.ensure_built()?;
        let free = self.free_indices();
        self.free_covariance(&free)
    }
}

/// The fit as a least-squares problem over its free parameters
///
/// Fixed parameters stay at their registry values.
struct FreeParameterProblem<'a> {
    fit: &'a FitObject,
    template: Array1<f64>,
    free: &'a [usize],
    analytical: bool,
}

impl FreeParameterProblem<'_> {
    fn expand(&self, params: &Array1<f64>) -> Array1<f64> {
        let mut global = self.template.clone();
        for (&index, &value) in self.free.iter().zip(params.iter()) {
            global[index] = value;
        }
        global
    }
}

impl Problem for FreeParameterProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        self.fit.stacked_residuals(&self.expand(params))
    }

    fn parameter_count(&self) -> usize {
        self.free.len()
    }

    fn residual_count(&self) -> usize {
        self.fit.n_residuals()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        if self.analytical {
            let full = self.fit.stacked_jacobian(&self.expand(params))?;
            Ok(full.select(Axis(1), self.free))
        } else {
            crate::utils::finite_difference::jacobian(self, params, None)
        }
    }

    fn has_custom_jacobian(&self) -> bool {
        self.analytical
    }
}
