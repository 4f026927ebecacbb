//! Twistable worm-like chain.
//!
//! Extends the Odijk model with twist-stretch coupling that switches on above
//! a critical force `Fc`:
//!
//! d(F) = Lc * (1 - 0.5 * sqrt(kT / (F * Lp)) + C / (C * St - g(F)^2) * F)
//!
//! with `g(F) = g0 + g1 * Fc` for `F < Fc` and `g0 + g1 * F` otherwise.
//!
//! Reference: P. Gross et al., Quantifying how DNA stretches, melts and
//! changes twist under tension, Nature Physics 7, 731-736 (2011).
//!
//! The inverse has no closed form and is solved numerically on
//! `[0, (sqrt(St * C) - g0) / g1]`, above which the model is no longer valid.

use super::jacobian_columns;
use crate::error::Result;
use crate::inversion;
use crate::lm::config::InversionConfig;
use ndarray::{Array1, Array2};

// Slots: Lp, Lc, St, C, g0, g1, Fc, kT

pub(super) fn twlc(f: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, c, g0, g1, fc, kt) = (p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]);
    Ok(f.mapv(|f| {
        let g = if f < fc { g0 + g1 * fc } else { g0 + g1 * f };
        lc * (1.0 - 0.5 * (kt / (f * lp)).sqrt() + c / (c * st - g * g) * f)
    }))
}

pub(super) fn twlc_jacobian(f: &Array1<f64>, p: &[f64]) -> Result<Array2<f64>> {
    let (lp, lc, st, c, g0, g1, fc, kt) = (p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]);
    Ok(jacobian_columns(f, |f| {
        let above = if f > fc { 1.0 } else { 0.0 };
        let below = 1.0 - above;

        let sqrt_term = (kt / (lp * f)).sqrt();
        let entropic = 0.25 * lc * sqrt_term;
        let switch_force = f * above + fc * below;
        let g = g0 + g1 * switch_force;
        let denominator = c * st - g * g;
        let inv = 1.0 / denominator;
        let inv_sq = inv * inv;
        let coupling = 2.0 * lc * c * f;

        [
            entropic / lp,
            -0.5 * sqrt_term + inv * c * f + 1.0,
            -c * c * f * lc * inv_sq,
            lc * (f * inv - f * c * st * inv_sq),
            inv_sq * coupling * g,
            inv_sq * coupling * g * switch_force,
            g1 * inv_sq * coupling * g * below,
            -entropic / kt,
        ]
    }))
}

pub(super) fn twlc_derivative(f: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, c, g0, g1, fc, kt) = (p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7]);
    Ok(f.mapv(|f| {
        let above = if f > fc { 1.0 } else { 0.0 };
        let g = g0 + g1 * (f * above + fc * (1.0 - above));
        let inv = 1.0 / (c * st - g * g);
        lc * (2.0 * c * f * g1 * g * inv * inv * above
            + c * inv
            + 0.25 / f * (kt / (f * lp)).sqrt())
    }))
}

/// Largest force for which the coupling term stays finite
fn valid_force_limit(p: &[f64]) -> f64 {
    let (st, c, g0, g1) = (p[2], p[3], p[4], p[5]);
    ((st * c).sqrt() - g0) / g1
}

fn solve_force(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let forward = |f: &Array1<f64>| twlc(f, p);
    let slope = |f: &Array1<f64>| twlc_derivative(f, p);
    inversion::invert_function(
        d,
        &Array1::ones(d.len()),
        0.0,
        valid_force_limit(p),
        &forward,
        Some(&slope),
        &InversionConfig::default(),
    )
}

pub(super) fn inverted_twlc(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    solve_force(d, p)
}

pub(super) fn inverted_twlc_jacobian(d: &Array1<f64>, p: &[f64]) -> Result<Array2<f64>> {
    inversion::invert_jacobian(
        d,
        |d| solve_force(d, p),
        |f| twlc_jacobian(f, p),
        |f| twlc_derivative(f, p),
    )
}

pub(super) fn inverted_twlc_derivative(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    inversion::invert_derivative(d, |d| solve_force(d, p), |f| twlc_derivative(f, p))
}
