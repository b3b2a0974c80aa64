//! Draws a Johnson S_U mass spectrum directly and a two-dimensional bump through the foam,
//! then prints a few summary statistics.

use densample::config::{FoamConfig, GenConfig};
use densample::core::ParallelGenerate;
use densample::distributions::FnDensity;
use densample::integrator::AnalyticIntegrator;
use densample::johnson::Johnson;
use densample::parameter::Parameter;
use densample::selector::SamplerSelector;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    const N_EVENTS: usize = 200_000;
    const N_STREAMS: usize = 8;
    const SEED: u64 = 42;

    let johnson = Johnson::new(
        Parameter::new("mass", 1.0, -5.0, 10.0),
        Parameter::new("mu", 1.0, -5.0, 5.0),
        Parameter::new("lambda", 0.8, 0.0, 5.0),
        Parameter::new("gamma", -0.5, -5.0, 5.0),
        Parameter::new("delta", 1.2, 0.0, 5.0),
    )?;
    let integrator = AnalyticIntegrator::new(&johnson);
    println!(
        "Johnson mass in [-5, 10]: {:.6}, in [0, 2]: {:.6}",
        integrator.normalization("mass")?,
        integrator.integral("mass", 0.0, 2.0)?
    );

    let selector = SamplerSelector::new(GenConfig::default())?;
    let mut rng = SmallRng::seed_from_u64(SEED);
    let sampler = selector.select(&johnson, &["mass"], &mut rng)?;
    let (masses, stats) = sampler.par_generate_with_progress(N_EVENTS, N_STREAMS, SEED)?;
    let mean = masses.as_slice().iter().sum::<f64>() / masses.len() as f64;
    println!(
        "Generated {} masses (resample ratio {:.3}), mean {:.4}",
        masses.len(),
        stats.resample_ratio(),
        mean
    );

    let bump = FnDensity::new(
        vec![
            Parameter::new("x", 0.0, -1.0, 1.0),
            Parameter::new("y", 0.0, -1.0, 1.0),
        ],
        |p: &[f64]| (-8.0 * (p[0] * p[0] + p[1] * p[1] - 0.25).powi(2)).exp(),
    );
    let selector =
        SamplerSelector::new(GenConfig::default().set_foam(FoamConfig::for_dimension(2)))?;
    let foam = selector.select(&bump, &["x", "y"], &mut rng)?;
    let (points, stats) = foam.par_generate_with_progress(N_EVENTS, N_STREAMS, SEED)?;
    let radius = points
        .points()
        .map(|p| p[0].hypot(p[1]))
        .sum::<f64>()
        / points.len() as f64;
    println!(
        "Generated {} ring points (resample ratio {:.3}), mean radius {:.4}",
        points.len(),
        stats.resample_ratio(),
        radius
    );
    Ok(())
}
