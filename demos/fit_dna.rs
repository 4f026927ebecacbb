//! Global fit of two DNA force-extension curves.
//!
//! Both curves share persistence length and stretch modulus while each has
//! its own contour length. The second part fits force as a function of
//! distance with an inverted model and a distance offset.
//!
//! Run with `RUST_LOG=debug cargo run --example fit_dna` to follow the solver.

use fdfit_rs::{force_model, FitObject, ForceModelKind, LmConfig};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

fn noisy(
    values: Array1<f64>,
    sigma: f64,
    rng: &mut ChaCha8Rng,
) -> Result<Array1<f64>, Box<dyn std::error::Error>> {
    let normal = Normal::new(0.0, sigma)?;
    Ok(values.mapv(|v| v + normal.sample(rng)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    println!("Global DNA fit");
    println!("==============\n");

    let dna = force_model("DNA", ForceModelKind::Wlc)?;
    let force = Array1::linspace(0.5, 20.0, 100);
    let short = noisy(dna.evaluate(&force, &[45.0, 5.0, 1400.0, 4.11])?, 2e-3, &mut rng)?;
    let long = noisy(dna.evaluate(&force, &[45.0, 16.0, 1400.0, 4.11])?, 2e-3, &mut rng)?;

    let mut fit = FitObject::new(dna);
    fit.load_data(
        force.clone(),
        short,
        "short construct",
        &[("DNA_Lc", "DNA_Lc_short".into())],
    )?;
    let long_handle = fit.load_data(
        force.clone(),
        long,
        "long construct",
        &[("DNA_Lc", "DNA_Lc_long".into())],
    )?;

    // Starting points near the expected lengths
    let params = fit.parameters_mut()?;
    params.set_value("DNA_Lc_short", 4.0)?;
    params.set_value("DNA_Lc_long", 15.0)?;

    let report = fit.fit(&LmConfig::default())?;
    println!("{}", report);
    println!("{}", fit.parameters()?);
    println!("sigma = {:.3e}", fit.sigma()?);
    println!("AIC = {:.2}, AICc = {:.2}, BIC = {:.2}\n", fit.aic()?, fit.aicc()?, fit.bic()?);

    let prediction = fit.predict(long_handle, Some(&Array1::linspace(1.0, 10.0, 4)))?;
    println!("Long construct at 1..10 pN: {:.4}\n", prediction);

    println!("Force from distance with offset");
    println!("===============================\n");

    let model = force_model("DNA", ForceModelKind::InvertedWlc)?
        + force_model("DNA", ForceModelKind::Offset)?;
    let true_params = [45.0, 16.0, 1400.0, 4.11, 0.5];
    let distance = dna_distance(&force)?;
    let measured_force = noisy(model.evaluate(&distance, &true_params)?, 0.05, &mut rng)?;

    let mut fit = FitObject::new(model);
    fit.load_data(distance, measured_force, "force curve", &[])?;
    let report = fit.fit(&LmConfig::default())?;
    println!("{}", report);
    println!("{}", fit.parameters()?);

    Ok(())
}

fn dna_distance(force: &Array1<f64>) -> fdfit_rs::Result<Array1<f64>> {
    force_model("DNA", ForceModelKind::Wlc)?.evaluate(force, &[45.0, 16.0, 1400.0, 4.11])
}
