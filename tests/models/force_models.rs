//! Integration tests for the built-in force-extension models.

use crate::test_helpers::DNA_WLC;
use approx::assert_relative_eq;
use fdfit_rs::models::default_parameter;
use fdfit_rs::{force_model, FitError, ForceModelKind, Model, Tolerance};
use ndarray::Array1;

fn defaults(model: &Model) -> Vec<f64> {
    model
        .defaults()
        .iter()
        .map(|(_, p)| p.as_ref().map_or(0.0, |p| p.value()))
        .collect()
}

#[test]
fn test_every_kind_round_trips_through_its_name() {
    for kind in ForceModelKind::ALL {
        let parsed: ForceModelKind = kind.to_string().parse().unwrap();
        assert_eq!(parsed, kind);

        let model = force_model("M", kind).unwrap();
        assert_eq!(model.n_parameters(), kind.parameter_names().len());
        assert!(model.has_jacobian(), "{}", kind);
        assert!(model.has_derivative(), "{}", kind);
    }

    match "worm".parse::<ForceModelKind>() {
        Err(FitError::InvalidInput(message)) => {
            assert!(message.contains("Invalid model worm selected"));
            assert!(message.contains("invtWLC"));
        }
        other => panic!("Expected InvalidInput, got {:?}", other),
    }
}

#[test]
fn test_every_parameter_has_a_default() {
    for kind in ForceModelKind::ALL {
        for base in kind.parameter_names() {
            let default = default_parameter(kind, base).unwrap();
            assert!(default.is_some(), "{} of {}", base, kind);
        }
    }
    assert!(default_parameter(ForceModelKind::Wlc, "nope").unwrap().is_none());
}

#[test]
fn test_analytical_derivatives_match_finite_differences() {
    // The numerically inverted models are checked through their round trips
    let cases = [
        (ForceModelKind::Offset, Array1::linspace(1.0, 20.0, 20)),
        (ForceModelKind::MarkoSiggia, Array1::linspace(1.0, 14.0, 30)),
        (ForceModelKind::Wlc, Array1::linspace(0.1, 20.0, 40)),
        (ForceModelKind::Twlc, Array1::linspace(1.0, 50.0, 25)),
        (ForceModelKind::Fjc, Array1::linspace(0.5, 20.0, 40)),
    ];
    let tolerance = Tolerance::new(1e-5, 1e-6);

    for (kind, x) in cases.iter() {
        let model = force_model("DNA", *kind).unwrap();
        let p = defaults(&model);

        let jac = model.verify_jacobian(x, &p, tolerance, None).unwrap();
        assert!(jac.is_close, "{}: {:?}", kind, jac.max_deviation);
        assert_eq!(jac.max_deviation.len(), p.len());

        let der = model.verify_derivative(x, &p, tolerance, None).unwrap();
        assert!(der.is_close, "{}: {:?}", kind, der.max_deviation);
    }
}

#[test]
fn test_wlc_properties_at_reference_parameters() {
    let model = force_model("DNA", ForceModelKind::Wlc).unwrap();
    let f = Array1::linspace(0.1, 20.0, 40);
    let check = model
        .verify_jacobian(&f, &DNA_WLC, Tolerance::new(1e-5, 1e-6), None)
        .unwrap();
    assert!(check.is_close, "{:?}", check.max_deviation);

    // Extension grows with force and stays below the stretched contour length
    let d = model.evaluate(&f, &DNA_WLC).unwrap();
    for w in d.windows(2) {
        assert!(w[1] > w[0]);
    }
    assert!(d.iter().zip(f.iter()).all(|(&d, &f)| d < 16.0 * (1.0 + f / 1500.0)));
}

#[test]
fn test_inverted_models_round_trip() {
    let force = Array1::linspace(1.0, 18.0, 12);
    let pairs = [
        (ForceModelKind::Wlc, ForceModelKind::InvertedWlc, 1e-8),
        (ForceModelKind::Twlc, ForceModelKind::InvertedTwlc, 1e-4),
        (ForceModelKind::Fjc, ForceModelKind::InvertedFjc, 1e-4),
    ];

    for (forward, inverse, tolerance) in pairs.iter() {
        let forward = force_model("DNA", *forward).unwrap();
        let inverse = force_model("DNA", *inverse).unwrap();
        assert_eq!(forward.parameter_names(), inverse.parameter_names());

        let p = defaults(&forward);
        let distance = forward.evaluate(&force, &p).unwrap();
        let recovered = inverse.evaluate(&distance, &p).unwrap();
        for (r, f) in recovered.iter().zip(force.iter()) {
            assert_relative_eq!(*r, *f, max_relative = *tolerance);
        }
    }
}

#[test]
fn test_numerical_inverses_over_the_reference_force_range() {
    let force = Array1::linspace(0.1, 20.0, 40);
    for kind in [ForceModelKind::Wlc, ForceModelKind::Fjc] {
        let forward = force_model("DNA", kind).unwrap();
        let p = defaults(&forward);
        let distance = forward.evaluate(&force, &p).unwrap();

        let recovered = forward.invert().evaluate(&distance, &p).unwrap();
        for (r, f) in recovered.iter().zip(force.iter()) {
            assert_relative_eq!(*r, *f, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_generic_inversion_matches_closed_form() {
    let numerical = force_model("DNA", ForceModelKind::Wlc).unwrap().invert();
    let closed_form = force_model("DNA", ForceModelKind::InvertedWlc).unwrap();
    assert_eq!(numerical.name(), "inv(DNA)");

    let distance = force_model("DNA", ForceModelKind::Wlc)
        .unwrap()
        .evaluate(&Array1::linspace(0.5, 15.0, 10), &DNA_WLC)
        .unwrap();

    let a = numerical.evaluate(&distance, &DNA_WLC).unwrap();
    let b = closed_form.evaluate(&distance, &DNA_WLC).unwrap();
    for (a, b) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-4);
    }

    let a = numerical.derivative(&distance, &DNA_WLC).unwrap();
    let b = closed_form.derivative(&distance, &DNA_WLC).unwrap();
    for (a, b) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-3);
    }
}

#[test]
fn test_wrong_parameter_count() {
    let model = force_model("DNA", ForceModelKind::Twlc).unwrap();
    match model.evaluate(&Array1::linspace(1.0, 2.0, 2), &DNA_WLC) {
        Err(FitError::ShapeMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 8);
            assert_eq!(actual, 4);
        }
        other => panic!("Expected ShapeMismatch, got {:?}", other),
    }
}
