//! Closed-form inverse of Odijk's worm-like chain.
//!
//! With `alpha = d / Lc - 1` and `gamma = kT / Lp`, squaring the Odijk model
//! gives a cubic in the force,
//!
//! F^3 + a F^2 + b F + c = 0,  a = -2 alpha St,  b = alpha^2 St^2,
//! c = -gamma St^2 / 4,
//!
//! which is reduced to the depressed cubic `t^3 + p t + q` with `F = t - a/3`.
//! A non-negative discriminant takes Cardano's root; otherwise the
//! trigonometric form selects the physical one of three real roots.
//!
//! The root derivatives contain cube roots that are not differentiable where
//! the chain crosses over from entropic to enthalpic stretching, and
//! `sqrt(det)` that vanishes at repeated roots. Those denominators are clamped
//! to at least [`DENOMINATOR_FLOOR`] in magnitude, which behaves better than
//! finite differences in that region.

use super::jacobian_columns;
use crate::error::Result;
use ndarray::{Array1, Array2};
use std::f64::consts::FRAC_PI_6;

const DENOMINATOR_FLOOR: f64 = 1e-5;

/// Cubic coefficients `(a, b, c)` for one extension
struct Coefficients {
    alpha: f64,
    gamma: f64,
    a: f64,
    b: f64,
    c: f64,
}

impl Coefficients {
    fn new(d: f64, lp: f64, lc: f64, st: f64, kt: f64) -> Self {
        let alpha = d / lc - 1.0;
        let gamma = kt / lp;
        Self {
            alpha,
            gamma,
            a: -2.0 * alpha * st,
            b: alpha * alpha * st * st,
            c: -0.25 * gamma * st * st,
        }
    }
}

/// Depressed cubic `t^3 + p t + q` and its discriminant
fn depressed(a: f64, b: f64, c: f64) -> (f64, f64, f64) {
    let p = b - a * a / 3.0;
    let q = 2.0 * a * a * a / 27.0 - a * b / 3.0 + c;
    let det = q * q / 4.0 + p * p * p / 27.0;
    (p, q, det)
}

fn solve(a: f64, b: f64, c: f64) -> f64 {
    let (p, q, det) = depressed(a, b, c);
    let t = if det >= 0.0 {
        let sqrt_det = det.sqrt();
        (-0.5 * q + sqrt_det).cbrt() + (-0.5 * q - sqrt_det).cbrt()
    } else {
        let sqrt_minus_p = (-p).sqrt();
        let argument = 3.0 * 3.0_f64.sqrt() * q / (2.0 * sqrt_minus_p.powi(3));
        2.0 / 3.0_f64.sqrt() * sqrt_minus_p * (argument.asin() / 3.0 + FRAC_PI_6).cos()
    };
    t - a / 3.0
}

/// Partial derivatives of the selected root with respect to `(a, b, c)`
fn root_derivatives(a: f64, b: f64, c: f64) -> (f64, f64, f64) {
    let (p, q, det) = depressed(a, b, c);

    let dp_da = -2.0 * a / 3.0;
    let dq_da = 2.0 * a * a / 9.0 - b / 3.0;
    let dq_db = -a / 3.0;

    // dp/db = dq/dc = 1, dp/dc = 0
    if det > 0.0 {
        let sqrt_det = det.sqrt();
        let t1 = floor((sqrt_det - 0.5 * q).cbrt().powi(2));
        let t2 = floor((-sqrt_det - 0.5 * q).cbrt().powi(2));
        let sqrt_det = floor(sqrt_det);

        let dy_ddet = 1.0 / (6.0 * sqrt_det * t1) - 1.0 / (6.0 * sqrt_det * t2);
        let dy_dq = -1.0 / (6.0 * t1) - 1.0 / (6.0 * t2);
        let ddet_dp = p * p / 9.0;
        let ddet_dq = 0.5 * q;

        (
            dy_ddet * ddet_dp * dp_da + dy_ddet * ddet_dq * dq_da + dy_dq * dq_da - 1.0 / 3.0,
            dy_ddet * ddet_dp + dy_ddet * ddet_dq * dq_db + dy_dq * dq_db,
            dy_ddet * ddet_dq + dy_dq,
        )
    } else {
        let sqrt3 = 3.0_f64.sqrt();
        let sqmp = (-p).sqrt();
        let argument = 3.0 * sqrt3 * q / (2.0 * sqmp.powi(3));

        let dargument_dsqmp = -9.0 * sqrt3 * q / (2.0 * sqmp.powi(4));
        let dargument_dq = 3.0 * sqrt3 / (2.0 * sqmp.powi(3));
        let dsqmp_dp = -1.0 / (2.0 * sqmp);

        let angle = argument.asin() / 3.0 + FRAC_PI_6;
        let dy_dsqmp = 2.0 * sqrt3 * angle.cos() / 3.0;
        let dy_dargument =
            -2.0 * sqrt3 * sqmp * angle.sin() / (9.0 * (1.0 - argument * argument).sqrt());

        (
            dy_dsqmp * dsqmp_dp * dp_da
                + dy_dargument * (dargument_dsqmp * dsqmp_dp * dp_da + dargument_dq * dq_da)
                - 1.0 / 3.0,
            dy_dsqmp * dsqmp_dp
                + dy_dargument * (dargument_dsqmp * dsqmp_dp + dargument_dq * dq_db),
            dy_dargument * dargument_dq,
        )
    }
}

fn floor(value: f64) -> f64 {
    if value.abs() < DENOMINATOR_FLOOR {
        DENOMINATOR_FLOOR
    } else {
        value
    }
}

// Slots: Lp, Lc, St, kT

pub(super) fn inverted_wlc(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(d.mapv(|d| {
        let k = Coefficients::new(d, lp, lc, st, kt);
        solve(k.a, k.b, k.c)
    }))
}

pub(super) fn inverted_wlc_jacobian(d: &Array1<f64>, p: &[f64]) -> Result<Array2<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(jacobian_columns(d, |d| {
        let k = Coefficients::new(d, lp, lc, st, kt);
        let (dy_da, dy_db, dy_dc) = root_derivatives(k.a, k.b, k.c);

        let da_dlc = 2.0 * st * d / (lc * lc);
        let da_dst = -2.0 * k.alpha;
        let db_dlc = -2.0 * st * st * d * k.alpha / (lc * lc);
        let db_dst = 2.0 * st * k.alpha * k.alpha;
        let dc_dlp = 0.25 * st * st * kt / (lp * lp);
        let dc_dst = -0.5 * st * k.gamma;
        let dc_dkt = -0.25 * st * st / lp;

        [
            dy_dc * dc_dlp,
            dy_da * da_dlc + dy_db * db_dlc,
            dy_da * da_dst + dy_db * db_dst + dy_dc * dc_dst,
            dy_dc * dc_dkt,
        ]
    }))
}

pub(super) fn inverted_wlc_derivative(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(d.mapv(|d| {
        let k = Coefficients::new(d, lp, lc, st, kt);
        let (dy_da, dy_db, _) = root_derivatives(k.a, k.b, k.c);
        dy_da * (-2.0 * st / lc) + dy_db * (2.0 * st * st * k.alpha / lc)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::config::Tolerance;
    use crate::models::{force_model, ForceModelKind};
    use approx::assert_relative_eq;

    const DNA: [f64; 4] = [40.0, 16.0, 1500.0, 4.11];

    fn extensions(forces: &Array1<f64>) -> Array1<f64> {
        force_model("DNA", ForceModelKind::Wlc)
            .unwrap()
            .evaluate(forces, &DNA)
            .unwrap()
    }

    #[test]
    fn test_cubic_roots() {
        // (F - 2)(F^2 + 1): one real root
        assert_relative_eq!(solve(-2.0, 1.0, -2.0), 2.0, epsilon = 1e-12);

        // (F - 1)(F - 2)(F - 3): the trigonometric branch picks the largest root
        let (_, _, det) = depressed(-6.0, 11.0, -6.0);
        assert!(det < 0.0);
        assert_relative_eq!(solve(-6.0, 11.0, -6.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverts_odijk_model() {
        let forces = Array1::linspace(1.0, 20.0, 20);
        let model = force_model("DNA", ForceModelKind::InvertedWlc).unwrap();
        let recovered = model.evaluate(&extensions(&forces), &DNA).unwrap();
        for (r, f) in recovered.iter().zip(forces.iter()) {
            assert_relative_eq!(*r, *f, max_relative = 1e-8);
        }
    }

    #[test]
    fn test_matches_numerical_inversion() {
        let closed_form = force_model("DNA", ForceModelKind::InvertedWlc).unwrap();
        let numerical = force_model("DNA", ForceModelKind::Wlc).unwrap().invert();

        let d = extensions(&Array1::linspace(2.0, 18.0, 9));
        let exact = closed_form.evaluate(&d, &DNA).unwrap();
        let solved = numerical.evaluate(&d, &DNA).unwrap();
        for (a, b) in exact.iter().zip(solved.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-4);
        }

        let exact_jac = closed_form.jacobian(&d, &DNA).unwrap();
        let solved_jac = numerical.jacobian(&d, &DNA).unwrap();
        for (a, b) in exact_jac.iter().zip(solved_jac.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-3, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_inverted_wlc_derivatives() {
        let model = force_model("DNA", ForceModelKind::InvertedWlc).unwrap();
        let d = extensions(&Array1::linspace(1.0, 20.0, 20));
        let tolerance = Tolerance::new(1e-4, 1e-6);

        let jac = model.verify_jacobian(&d, &DNA, tolerance, None).unwrap();
        assert!(jac.is_close, "{:?}", jac.max_deviation);

        let der = model.verify_derivative(&d, &DNA, tolerance, None).unwrap();
        assert!(der.is_close, "{:?}", der.max_deviation);
    }
}
