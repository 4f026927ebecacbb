//! Integration tests for global fits over several data sets and models.

use crate::test_helpers::{central_columns, wlc_data, DNA_WLC};
use approx::assert_relative_eq;
use fdfit_rs::{
    force_model, FitError, FitObject, ForceModelKind, LmConfig, Model, Transformation,
};
use ndarray::{Array1, Axis};

fn dna_fit() -> FitObject {
    FitObject::new(force_model("DNA", ForceModelKind::Wlc).unwrap())
}

#[test]
fn test_recovers_contour_length() {
    let _ = env_logger::builder().is_test(true).try_init();

    let force = Array1::linspace(0.5, 18.0, 50);
    let distance = wlc_data(&force, &DNA_WLC, 1e-3, 42);

    let mut fit = dna_fit();
    fit.load_data(force, distance, "DNA", &[]).unwrap();
    fit.parameters_mut().unwrap().set_value("DNA_Lc", 15.0).unwrap();

    let report = fit.fit(&LmConfig::default()).unwrap();
    assert!(report.success, "{}", report);

    let params = fit.parameters().unwrap();
    let lc = params.value("DNA_Lc").unwrap();
    assert_relative_eq!(lc, 16.0, max_relative = 0.01);

    // kT is fixed by default and must not move
    assert_eq!(params.value("kT").unwrap(), 4.11);
    assert!(params.get("DNA_Lc").unwrap().stderr().is_some());
    assert!(params.get("kT").unwrap().stderr().is_none());
}

#[test]
fn test_fixed_and_renamed_substitutions() {
    let force = Array1::linspace(0.5, 10.0, 10);
    let distance = wlc_data(&force, &DNA_WLC, 0.0, 0);

    let mut fit = dna_fit();
    fit.load_data(force.clone(), distance.clone(), "fixed", &[("DNA_Lc", 14.0.into())])
        .unwrap();
    fit.load_data(force, distance, "renamed", &[("DNA_Lc", "DNA_Lc_b".into())])
        .unwrap();

    let params = fit.parameters().unwrap();
    assert!(params.contains("DNA_Lc_b"));
    assert!(!params.contains("DNA_Lc"));
    assert_eq!(params.names(), vec!["DNA_Lp", "DNA_St", "kT", "DNA_Lc_b"]);

    // A renamed parameter inherits the default of the slot it replaces
    let lc_b = params.get("DNA_Lc_b").unwrap();
    assert_eq!(lc_b.value(), 16.0);
    assert_eq!(lc_b.unit(), Some("micron"));

    assert_eq!(fit.conditions(0).unwrap().len(), 2);
}

#[test]
fn test_conditions_deduplicate_data_sets() {
    let force = Array1::linspace(1.0, 5.0, 4);
    let distance = wlc_data(&force, &DNA_WLC, 0.0, 0);
    let substitutions: [&[(&str, Transformation)]; 6] = [
        &[],
        &[("DNA_Lc", "DNA_Lc_b".into())],
        &[],
        &[("DNA_Lc", 14.0.into())],
        &[("DNA_Lc", "DNA_Lc_b".into())],
        &[("DNA_Lc", 14.0.into()), ("kT", 4.0.into())],
    ];

    let mut fit = dna_fit();
    for (i, subs) in substitutions.iter().enumerate() {
        fit.load_data(force.clone(), distance.clone(), &format!("curve {}", i), subs)
            .unwrap();
    }

    assert_eq!(fit.conditions(0).unwrap().len(), 4);
    let link = fit.data_link(0).unwrap().to_vec();
    assert_eq!(link, vec![vec![0, 2], vec![1, 4], vec![3], vec![5]]);

    let mut seen: Vec<usize> = link.into_iter().flatten().collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..substitutions.len()).collect::<Vec<_>>());

    // Globals are the distinct free names, whatever the number of data sets
    assert_eq!(fit.n_parameters().unwrap(), 5);
    assert_eq!(fit.n_residuals(), 6 * force.len());
}

#[test]
fn test_jacobian_matches_residual_differences() {
    let force = Array1::linspace(0.5, 12.0, 8);
    let mut fit = dna_fit();
    fit.load_data(force.clone(), wlc_data(&force, &DNA_WLC, 0.01, 1), "a", &[])
        .unwrap();
    fit.load_data(
        force.clone(),
        wlc_data(&force, &[40.0, 12.0, 1500.0, 4.11], 0.01, 2),
        "b",
        &[("DNA_Lc", "DNA_Lc_b".into())],
    )
    .unwrap();
    fit.load_data(force.clone(), wlc_data(&force, &DNA_WLC, 0.01, 3), "c", &[("kT", 4.0.into())])
        .unwrap();

    let global = Array1::from(vec![45.0, 15.0, 1400.0, 4.2, 11.0]);
    let analytical = fit.jacobian(Some(&global)).unwrap();
    assert_eq!(analytical.dim(), (3 * force.len(), 5));

    let numerical = central_columns(|p| fit.clone().residuals(Some(p)).unwrap(), &global, 1e-6);
    for (a, n) in analytical.iter().zip(numerical.iter()) {
        assert_relative_eq!(*a, *n, epsilon = 1e-8, max_relative = 1e-4);
    }

    // Rows of the fixed-kT data set have no kT sensitivity
    let rows = analytical.slice(ndarray::s![2 * force.len().., 3]);
    assert!(rows.iter().all(|&v| v == 0.0));
}

#[test]
fn test_global_fit_shares_parameters() {
    let force = Array1::linspace(0.5, 18.0, 40);
    let long = wlc_data(&force, &DNA_WLC, 1e-3, 7);
    let short = wlc_data(&force, &[40.0, 12.0, 1500.0, 4.11], 1e-3, 8);

    let mut fit = dna_fit();
    fit.load_data(force.clone(), long, "long", &[]).unwrap();
    fit.load_data(force, short, "short", &[("DNA_Lc", "DNA_Lc_short".into())])
        .unwrap();
    {
        let params = fit.parameters_mut().unwrap();
        params.set_value("DNA_Lc", 15.0).unwrap();
        params.set_value("DNA_Lc_short", 11.0).unwrap();
        params.set_value("DNA_Lp", 30.0).unwrap();
    }

    let report = fit.fit(&LmConfig::default()).unwrap();
    assert!(report.success, "{}", report);
    assert!(report.iterations > 0);

    let params = fit.parameters().unwrap();
    assert_relative_eq!(params.value("DNA_Lc").unwrap(), 16.0, max_relative = 0.01);
    assert_relative_eq!(params.value("DNA_Lc_short").unwrap(), 12.0, max_relative = 0.01);
    assert_relative_eq!(params.value("DNA_Lp").unwrap(), 40.0, max_relative = 0.1);
}

#[test]
fn test_models_couple_through_shared_kt() {
    let dna = force_model("DNA", ForceModelKind::Wlc).unwrap();
    let ss = force_model("ss", ForceModelKind::Fjc).unwrap();
    let mut fit = FitObject::with_models(vec![dna, ss]);

    let force = Array1::linspace(1.0, 10.0, 6);
    let first = fit
        .load_data_for(0, force.clone(), wlc_data(&force, &DNA_WLC, 0.0, 0), "ds", &[])
        .unwrap();
    let second = fit
        .load_data_for(1, force.clone(), Array1::from_elem(force.len(), 10.0), "ss", &[])
        .unwrap();
    assert_eq!((first.model(), second.model()), (0, 1));

    assert_eq!(
        fit.parameters().unwrap().names(),
        vec!["DNA_Lp", "DNA_Lc", "DNA_St", "kT", "ss_Lp", "ss_Lc", "ss_St"]
    );

    // Both models' rows respond to kT
    let jac = fit.jacobian(None).unwrap();
    let kt = jac.column(3);
    assert!(kt.iter().take(force.len()).all(|&v| v != 0.0));
    assert!(kt.iter().skip(force.len()).all(|&v| v != 0.0));

    // But not to the other model's own parameters
    let ss_rows = jac.slice(ndarray::s![..force.len(), 4..]);
    assert!(ss_rows.iter().all(|&v| v == 0.0));
}

#[test]
fn test_predict_with_data_parameters() {
    let force = Array1::linspace(1.0, 10.0, 5);
    let mut fit = dna_fit();
    let renamed = fit
        .load_data(force.clone(), wlc_data(&force, &DNA_WLC, 0.0, 0), "b", &[("DNA_Lc", "Lc_b".into())])
        .unwrap();
    fit.parameters_mut().unwrap().set_value("Lc_b", 8.0).unwrap();

    let prediction = fit.predict(renamed, None).unwrap();
    let expected = force_model("DNA", ForceModelKind::Wlc)
        .unwrap()
        .evaluate(&force, &[40.0, 8.0, 1500.0, 4.11])
        .unwrap();
    assert_eq!(prediction, expected);
}

#[test]
fn test_unknown_parameter_is_rejected_at_load() {
    let mut fit = dna_fit();
    let force = Array1::linspace(1.0, 2.0, 2);
    match fit.load_data(force.clone(), force, "bad", &[("Lc", 14.0.into())]) {
        Err(FitError::UnknownParameter(name)) => assert_eq!(name, "Lc"),
        other => panic!("Expected UnknownParameter, got {:?}", other),
    }
    assert_eq!(fit.n_residuals(), 0);
}

#[test]
fn test_fit_without_model_jacobian() {
    // Same decay in two data sets, amplitudes differ
    let decay = Model::new("decay", &["amplitude", "tau"], |x, p| {
        Ok(x.mapv(|x| p[0] * (-x / p[1]).exp()))
    });
    assert!(!decay.has_jacobian());

    let x = Array1::linspace(0.0, 6.0, 30);
    let mut fit = FitObject::new(decay);
    fit.load_data(x.clone(), x.mapv(|x| 2.0 * (-x / 1.5).exp()), "a", &[])
        .unwrap();
    fit.load_data(
        x.clone(),
        x.mapv(|x| 5.0 * (-x / 1.5).exp()),
        "b",
        &[("amplitude", "amplitude_b".into())],
    )
    .unwrap();
    {
        let params = fit.parameters_mut().unwrap();
        params.set_value("amplitude", 1.0).unwrap();
        params.set_value("amplitude_b", 1.0).unwrap();
        params.set_value("tau", 1.0).unwrap();
    }

    // The assembled jacobian needs the model's own
    assert!(matches!(
        fit.jacobian(None),
        Err(FitError::MissingDerivativeInfo { .. })
    ));

    let report = fit.fit(&LmConfig::default()).unwrap();
    assert!(report.success, "{}", report);

    let params = fit.parameters().unwrap();
    assert!(params.get("tau").unwrap().stderr().is_some());
    assert_relative_eq!(params.value("amplitude").unwrap(), 2.0, max_relative = 1e-4);
    assert_relative_eq!(params.value("amplitude_b").unwrap(), 5.0, max_relative = 1e-4);
    assert_relative_eq!(params.value("tau").unwrap(), 1.5, max_relative = 1e-4);
}

#[test]
fn test_refit_after_loading_more_data() {
    let force = Array1::linspace(0.5, 18.0, 30);
    let mut fit = dna_fit();
    fit.load_data(force.clone(), wlc_data(&force, &DNA_WLC, 1e-3, 3), "first", &[])
        .unwrap();
    fit.fit(&LmConfig::default()).unwrap();
    let generation = fit.generation();
    let lp = fit.parameters().unwrap().value("DNA_Lp").unwrap();

    fit.load_data(force.clone(), wlc_data(&force, &DNA_WLC, 1e-3, 4), "second", &[("DNA_St", "St_2".into())])
        .unwrap();
    let params = fit.parameters().unwrap();
    // Existing entries survive the rebuild by name
    assert_eq!(params.value("DNA_Lp").unwrap(), lp);
    assert!(params.contains("St_2"));
    assert_eq!(fit.generation(), generation + 1);

    let residuals = fit.residuals(None).unwrap();
    assert_eq!(residuals.len(), 2 * force.len());
    assert!(residuals.slice(ndarray::s![..force.len()]).iter().all(|r| r.abs() < 0.01));

    let free = fit.free_parameter_names().unwrap();
    assert_eq!(free, vec!["DNA_Lp", "DNA_Lc", "DNA_St", "St_2"]);
    assert_eq!(fit.cov().unwrap().len_of(Axis(0)), 4);
}
