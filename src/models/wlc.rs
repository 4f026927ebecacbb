//! Worm-like chain models.
//!
//! Odijk's extensible worm-like chain, valid between roughly 10 and 30 pN:
//!
//! d(F) = Lc * (1 - 0.5 * sqrt(kT / (F * Lp)) + F / St)
//!
//! References:
//! 1. T. Odijk, Stiff Chains and Filaments under Tension, Macromolecules 28,
//!    7016-7018 (1995).
//! 2. M. D. Wang, H. Yin, R. Landick, J. Gelles, S. M. Block, Stretching DNA
//!    with optical tweezers, Biophysical Journal 72, 1335-46 (1997).
//!
//! Marko and Siggia's purely entropic chain, valid below roughly 10 pN, with
//! distance as the independent variable and x = d / Lc:
//!
//! F(d) = kT / Lp * (0.25 / (1 - x)^2 - 0.25 + x)
//!
//! 3. J. Marko, E. D. Siggia, Stretching DNA, Macromolecules 28, 8759-8770
//!    (1995).

use super::jacobian_columns;
use crate::error::Result;
use ndarray::{Array1, Array2};

// Slots: Lp, Lc, St, kT

pub(super) fn wlc(f: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(f.mapv(|f| lc * (1.0 - 0.5 * (kt / (f * lp)).sqrt() + f / st)))
}

pub(super) fn wlc_jacobian(f: &Array1<f64>, p: &[f64]) -> Result<Array2<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(jacobian_columns(f, |f| {
        let s = (kt / (f * lp)).sqrt();
        [
            0.25 * lc * s / lp,
            f / st - 0.5 * s + 1.0,
            -f * lc / (st * st),
            -0.25 * lc * s / kt,
        ]
    }))
}

pub(super) fn wlc_derivative(f: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(f.mapv(|f| lc * (0.25 / f * (kt / (f * lp)).sqrt() + 1.0 / st)))
}

// Slots: Lp, Lc, kT

// The whole bracket is scaled by kT/Lp, as published by Marko and Siggia.
// Implementations that scale only the first term return different forces for
// the same inputs; this one deliberately does not follow them.
pub(super) fn marko_siggia(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, kt) = (p[0], p[1], p[2]);
    Ok(d.mapv(|d| kt / lp * entropic(d / lc)))
}

pub(super) fn marko_siggia_jacobian(d: &Array1<f64>, p: &[f64]) -> Result<Array2<f64>> {
    let (lp, lc, kt) = (p[0], p[1], p[2]);
    let scale = kt / lp;
    Ok(jacobian_columns(d, |d| {
        let x = d / lc;
        let h = entropic(x);
        let slope = entropic_slope(x);
        [
            -kt / (lp * lp) * h,
            -scale * slope * d / (lc * lc),
            h / lp,
        ]
    }))
}

pub(super) fn marko_siggia_derivative(d: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, kt) = (p[0], p[1], p[2]);
    Ok(d.mapv(|d| kt / lp * entropic_slope(d / lc) / lc))
}

/// Interpolation formula in the relative extension `x`
fn entropic(x: f64) -> f64 {
    0.25 / ((1.0 - x) * (1.0 - x)) - 0.25 + x
}

fn entropic_slope(x: f64) -> f64 {
    0.5 / (1.0 - x).powi(3) + 1.0
}
