//! Integration tests for post-fit statistics.

use crate::test_helpers::{wlc_data, DNA_WLC};
use approx::assert_relative_eq;
use fdfit_rs::statistics;
use fdfit_rs::{force_model, FitError, FitObject, ForceModelKind, LmConfig, Model, Parameters};
use ndarray::{Array1, Array2};

fn fitted_dna(sigma: f64) -> FitObject {
    let force = Array1::linspace(0.5, 18.0, 50);
    let distance = wlc_data(&force, &DNA_WLC, sigma, 11);

    let mut fit = FitObject::new(force_model("DNA", ForceModelKind::Wlc).unwrap());
    fit.load_data(force, distance, "DNA", &[]).unwrap();
    fit.fit(&LmConfig::default()).unwrap();
    fit
}

#[test]
fn test_sigma_estimates_the_noise() {
    let mut fit = fitted_dna(1e-3);
    let sigma = fit.sigma().unwrap();
    assert!(sigma > 5e-4 && sigma < 1.5e-3, "sigma = {}", sigma);
}

#[test]
fn test_information_criteria() {
    let mut fit = fitted_dna(1e-3);
    let ll = fit.log_likelihood().unwrap();
    let (aic, aicc, bic) = (fit.aic().unwrap(), fit.aicc().unwrap(), fit.bic().unwrap());

    // Lp, Lc and St are free; kT is fixed
    let k = 3.0;
    let n = 50.0;
    assert_relative_eq!(aic, 2.0 * k - 2.0 * ll, epsilon = 1e-9);
    assert_relative_eq!(aicc, aic + (2.0 * k * k + 2.0 * k) / (n - k - 1.0), epsilon = 1e-9);
    assert_relative_eq!(bic, k * f64::ln(n) - 2.0 * ll, epsilon = 1e-9);
    assert!(bic > aicc && aicc > aic);

    // Fixing a parameter lowers the penalty
    fit.parameters_mut().unwrap().get_mut("DNA_St").unwrap().vary = false;
    assert_relative_eq!(fit.aic().unwrap(), aic - 2.0, epsilon = 1e-9);
}

#[test]
fn test_covariance_over_free_parameters() {
    let mut fit = fitted_dna(1e-3);
    let cov = fit.cov().unwrap();
    assert_eq!(cov.dim(), (3, 3));

    for i in 0..3 {
        assert!(cov[[i, i]] > 0.0);
        for j in 0..3 {
            assert_relative_eq!(cov[[i, j]], cov[[j, i]], max_relative = 1e-9);
        }
    }

    // Stored standard errors are the roots of the diagonal
    let errors = statistics::standard_errors(&cov);
    let params = fit.parameters().unwrap();
    for (name, error) in ["DNA_Lp", "DNA_Lc", "DNA_St"].iter().zip(errors.iter()) {
        let stored = params.get(name).unwrap().stderr().unwrap();
        assert_relative_eq!(stored, *error, max_relative = 1e-6);
    }

    // Contour length is determined far better than 1%
    assert!(errors[1] < 0.16);

    let correlation = statistics::correlation(&cov);
    assert!(correlation.iter().all(|c| c.abs() <= 1.0 + 1e-12));
}

#[test]
fn test_undetermined_parameter_has_no_covariance() {
    // `unused` never enters the model
    let model = Model::new("line", &["slope", "unused"], |x, p| Ok(x * p[0]))
        .with_jacobian(|x, _p| {
            let mut jac = Array2::zeros((2, x.len()));
            jac.row_mut(0).assign(x);
            Ok(jac)
        });

    let x = Array1::linspace(0.0, 1.0, 5);
    let mut fit = FitObject::new(model);
    fit.load_data(x.clone(), &x * 2.0 + 0.01, "line", &[]).unwrap();

    // The fit itself still converges on the determined parameter
    let report = fit.fit(&LmConfig::default()).unwrap();
    assert!(report.success, "{}", report);
    assert!(fit.parameters().unwrap().get("slope").unwrap().stderr().is_none());

    assert!(matches!(fit.cov(), Err(FitError::SingularMatrix)));
}

#[test]
fn test_fitted_parameters_survive_json() {
    let mut fit = fitted_dna(1e-3);
    let params = fit.parameters().unwrap();
    let json = params.to_json().unwrap();

    let restored = Parameters::from_json(&json).unwrap();
    assert_eq!(restored.names(), params.names());
    for (r, p) in restored.values().iter().zip(params.values().iter()) {
        assert_relative_eq!(*r, *p, max_relative = 1e-15);
    }
    assert_relative_eq!(
        restored.get("DNA_Lc").unwrap().stderr().unwrap(),
        params.get("DNA_Lc").unwrap().stderr().unwrap(),
        max_relative = 1e-15
    );
    assert!(!restored.get("kT").unwrap().vary());
    assert_eq!(restored.get("DNA_Lp").unwrap().upper_bound(), f64::INFINITY);
}
