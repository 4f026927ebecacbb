//! Integration tests for composed, inverted and shifted models.

use crate::test_helpers::DNA_WLC;
use approx::assert_relative_eq;
use fdfit_rs::{force_model, FitObject, ForceModelKind, Model, Parameter, Tolerance};
use ndarray::{array, Array1, Array2};
use std::sync::Arc;

fn baseline() -> Model {
    Model::new("baseline", &["slope", "level"], |x, p| Ok(x * p[0] + p[1]))
        .with_jacobian(|x, _p| {
            let mut jac = Array2::ones((2, x.len()));
            jac.row_mut(0).assign(x);
            Ok(jac)
        })
        .with_derivative(|x, p| Ok(Array1::from_elem(x.len(), p[0])))
}

#[test]
fn test_composite_is_additive() {
    let dna = force_model("DNA", ForceModelKind::Wlc).unwrap();
    let drift = baseline();
    let sum = &dna + &drift;

    assert_eq!(
        sum.parameter_names(),
        vec!["DNA_Lp", "DNA_Lc", "DNA_St", "kT", "slope", "level"]
    );
    assert_eq!(sum.name(), "DNA_with_baseline");

    let f = Array1::linspace(0.5, 15.0, 20);
    let merged = sum.evaluate(&f, &[40.0, 16.0, 1500.0, 4.11, 0.01, 0.3]).unwrap();
    let separate =
        dna.evaluate(&f, &DNA_WLC).unwrap() + drift.evaluate(&f, &[0.01, 0.3]).unwrap();
    assert_eq!(merged, separate);

    let check = sum
        .verify_jacobian(&f, &[40.0, 16.0, 1500.0, 4.11, 0.01, 0.3], Tolerance::new(1e-5, 1e-6), None)
        .unwrap();
    assert!(check.is_close, "{:?}", check.max_deviation);
}

#[test]
fn test_shared_kt_collapses_to_one_slot() {
    let dna = force_model("DNA", ForceModelKind::Wlc).unwrap();
    let protein = force_model("protein", ForceModelKind::Fjc).unwrap();
    let sum = dna + protein;

    let names = sum.parameter_names();
    assert_eq!(names.iter().filter(|&&n| n == "kT").count(), 1);
    assert_eq!(names.len(), 7);
    assert_eq!(sum.default_parameter("kT").unwrap().value(), 4.11);
}

#[test]
fn test_rhs_default_wins_on_collision() {
    let lhs = baseline()
        .with_default("level", Parameter::new(1.0))
        .unwrap();
    let rhs = Model::new("step", &["level"], |x, p| Ok(Array1::from_elem(x.len(), p[0])))
        .with_default("level", Parameter::new(5.0).with_bounds(0.0, 10.0).unwrap())
        .unwrap();
    let sum = lhs + rhs;

    let level = sum.default_parameter("level").unwrap();
    assert_eq!(level.value(), 5.0);
    assert_eq!(level.upper_bound(), 10.0);
    assert_eq!(sum.parameter_names(), vec!["slope", "level"]);
}

#[test]
fn test_rhs_without_default_clears_shared_default() {
    let lhs = baseline()
        .with_default("level", Parameter::new(1.0))
        .unwrap();
    let rhs = Model::new("step", &["level"], |x, p| Ok(Array1::from_elem(x.len(), p[0])));
    let sum = lhs + rhs;

    assert!(sum.default_parameter("level").is_none());
    assert_eq!(sum.parameter_names(), vec!["slope", "level"]);

    // The fit then falls back to an unbounded, free parameter at zero
    let mut fit = FitObject::new(sum);
    fit.load_data(array![0.0, 1.0], array![0.0, 1.0], "flat", &[])
        .unwrap();
    let level = fit.parameters().unwrap().get("level").unwrap();
    assert_eq!(level.value(), 0.0);
    assert!(level.vary());
    assert_eq!(level.lower_bound(), f64::NEG_INFINITY);
}

#[test]
fn test_constituents_are_shared_not_copied() {
    let dna = Arc::new(force_model("DNA", ForceModelKind::Wlc).unwrap());
    let inverted = Model::inverted(
        Arc::clone(&dna),
        0.0,
        f64::INFINITY,
        Default::default(),
    );
    let shifted = Model::independent_offset(Arc::clone(&dna), "DNA_d");

    assert_eq!(Arc::strong_count(&dna), 3);
    assert_eq!(inverted.parameter_names(), dna.parameter_names());
    assert_eq!(shifted.parameter_names()[0], "DNA_d");
    assert_eq!(shifted.name(), "DNA(x-d)");
}

#[test]
fn test_offset_on_the_independent_variable() {
    let dna = force_model("DNA", ForceModelKind::Wlc).unwrap();
    let shifted = dna.clone().subtract_offset("DNA_f0");

    let f = Array1::linspace(1.0, 15.0, 15);
    let p = [0.5, 40.0, 16.0, 1500.0, 4.11];

    let expected = dna.evaluate(&(&f - 0.5), &DNA_WLC).unwrap();
    let actual = shifted.evaluate(&f, &p).unwrap();
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *e, epsilon = 1e-14);
    }

    let tolerance = Tolerance::new(1e-5, 1e-6);
    let jac = shifted.verify_jacobian(&f, &p, tolerance, None).unwrap();
    assert!(jac.is_close, "{:?}", jac.max_deviation);
    let der = shifted.verify_derivative(&f, &p, tolerance, None).unwrap();
    assert!(der.is_close, "{:?}", der.max_deviation);

    // Offset sensitivity is minus the slope
    let slope = dna.derivative(&(&f - 0.5), &DNA_WLC).unwrap();
    let rows = shifted.jacobian(&f, &p).unwrap();
    for (s, r) in slope.iter().zip(rows.row(0).iter()) {
        assert_relative_eq!(-s, *r, epsilon = 1e-14);
    }
}

#[test]
fn test_inverted_composite_with_offset() {
    // Distance with a constant offset, inverted to force
    let dna = force_model("DNA", ForceModelKind::Wlc).unwrap();
    let offset = force_model("DNA", ForceModelKind::Offset).unwrap();
    let model = (dna + offset).invert();
    assert!(model.has_jacobian());

    let p = [40.0, 16.0, 1500.0, 4.11, 0.2];
    let f = array![1.0, 2.0, 3.0, 5.0];
    let forward = force_model("DNA", ForceModelKind::Wlc)
        .unwrap()
        .evaluate(&f, &DNA_WLC)
        .unwrap()
        + 0.2;

    let recovered = model.evaluate(&forward, &p).unwrap();
    for (r, e) in recovered.iter().zip(f.iter()) {
        assert_relative_eq!(*r, *e, max_relative = 1e-4);
    }

    // More offset means less force for the same distance
    let jac = model.jacobian(&forward, &p).unwrap();
    assert!(jac.row(4).iter().all(|&v| v < 0.0));
}
