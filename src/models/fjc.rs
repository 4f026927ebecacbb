//! Extensible freely-jointed chain.
//!
//! d(F) = Lc * (coth(2 * F * Lp / kT) - kT / (2 * F * Lp)) * (1 + F / St)
//!
//! References:
//! 1. S. B. Smith, Y. Cui, C. Bustamante, Overstretching B-DNA: The Elastic
//!    Response of Individual Double-Stranded and Single-Stranded DNA
//!    Molecules, Science 271, 795-799 (1996).
//! 2. M. D. Wang, H. Yin, R. Landick, J. Gelles, S. M. Block, Stretching DNA
//!    with optical tweezers, Biophysical Journal 72, 1335-46 (1997).

use super::jacobian_columns;
use crate::error::Result;
use ndarray::{Array1, Array2};

/// Above this argument `1 / sinh(x)^2` is zero in double precision
const CSCH_CUTOFF: f64 = 300.0;

/// Hyperbolic cotangent, saturating to `±1` for large arguments
pub fn coth(x: f64) -> f64 {
    1.0 / x.tanh()
}

fn csch_squared(x: f64) -> f64 {
    if x.abs() < CSCH_CUTOFF {
        let s = x.sinh();
        1.0 / (s * s)
    } else {
        0.0
    }
}

// Slots: Lp, Lc, St, kT

pub(super) fn fjc(f: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(f.mapv(|f| lc * (coth(2.0 * f * lp / kt) - kt / (2.0 * f * lp)) * (1.0 + f / st)))
}

pub(super) fn fjc_jacobian(f: &Array1<f64>, p: &[f64]) -> Result<Array2<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    Ok(jacobian_columns(f, |f| {
        let half_inv_force = 0.5 / f;
        let scaled_force = 2.0 * f / kt;
        let argument = lp * scaled_force;
        let csch2 = csch_squared(argument);
        let stretch = f / st + 1.0;
        let langevin = coth(argument) - kt * half_inv_force / lp;

        [
            lc * stretch * (-scaled_force * csch2 + kt * half_inv_force / (lp * lp)),
            stretch * langevin,
            -f * lc * langevin / (st * st),
            lc * stretch * (2.0 * f * lp * csch2 / (kt * kt) - half_inv_force / lp),
        ]
    }))
}

pub(super) fn fjc_derivative(f: &Array1<f64>, p: &[f64]) -> Result<Array1<f64>> {
    let (lp, lc, st, kt) = (p[0], p[1], p[2], p[3]);
    let coefficient = 2.0 * lp / kt;
    let half_ratio = 0.5 * kt / lp;
    Ok(f.mapv(|f| {
        let argument = f * coefficient;
        lc / st * (coth(argument) - half_ratio / f)
            + lc * (f / st + 1.0) * (-coefficient * csch_squared(argument) + half_ratio / (f * f))
    }))
}
