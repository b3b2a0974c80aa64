//! Statistical checks of Johnson S_U generation against its closed-form integrals.
//!
//! 1. `test_direct_matches_analytic_bins`: 100,000 direct draws pass a chi-square test
//!    against bin integrals from the analytic integrator.
//! 2. `test_direct_rejects_wrong_shape`: the same test rejects a different shape.
//! 3. `test_threshold_cuts_sample`: a mass threshold removes everything below it.

use densample::direct::DirectSampler;
use densample::integrator::AnalyticIntegrator;
use densample::johnson::Johnson;
use densample::parameter::Parameter;
use densample::stats;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::SmallRng, SeedableRng};

    const SAMPLE_SIZE: usize = 100_000;
    const BINS: usize = 40;
    const SEED: u64 = 42;

    fn johnson(gamma: f64) -> Johnson {
        Johnson::new(
            Parameter::new("mass", 1.0, -2.0, 6.0),
            Parameter::new("mu", 1.0, -5.0, 5.0),
            Parameter::new("lambda", 0.8, 0.0, 5.0),
            Parameter::new("gamma", gamma, -5.0, 5.0),
            Parameter::new("delta", 1.2, 0.0, 5.0),
        )
        .unwrap()
    }

    /// Analytic integral of each of `BINS` equal-width bins over `[lo, hi]`.
    fn bin_integrals(density: &Johnson, lo: f64, hi: f64) -> Vec<f64> {
        let integrator = AnalyticIntegrator::new(density);
        let width = (hi - lo) / BINS as f64;
        (0..BINS)
            .map(|b| {
                let a = lo + b as f64 * width;
                integrator.integral("mass", a, a + width).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_direct_matches_analytic_bins() {
        let density = johnson(-0.5);
        let mut sampler = DirectSampler::new(&density, "mass", 100_000_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(SEED);
        let samples = sampler.generate(SAMPLE_SIZE, &mut rng).unwrap();
        assert_eq!(samples.len(), SAMPLE_SIZE);

        let observed = stats::histogram(samples.as_slice(), -2.0, 6.0, BINS);
        assert_eq!(observed.iter().sum::<f64>(), SAMPLE_SIZE as f64);
        let expected = bin_integrals(&density, -2.0, 6.0);

        // The bins tile the range, so their integrals add up to the normalization.
        let total = AnalyticIntegrator::new(&density).normalization("mass").unwrap();
        assert_abs_diff_eq!(expected.iter().sum::<f64>(), total, epsilon = 1e-12);
        // The rejected share is the mass outside the range.
        assert_abs_diff_eq!(sampler.resample_ratio(), 1.0 - total, epsilon = 0.01);

        let result = stats::chi_square_gof(&observed, &expected, 0.001).unwrap();
        assert!(!result.is_rejected, "{result:?}");
    }

    #[test]
    fn test_direct_rejects_wrong_shape() {
        let density = johnson(-0.5);
        let mut sampler = DirectSampler::new(&density, "mass", 100_000_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(SEED);
        let samples = sampler.generate(SAMPLE_SIZE, &mut rng).unwrap();

        let observed = stats::histogram(samples.as_slice(), -2.0, 6.0, BINS);
        let wrong = bin_integrals(&johnson(0.0), -2.0, 6.0);
        let result = stats::chi_square_gof(&observed, &wrong, 0.001).unwrap();
        assert!(result.is_rejected, "{result:?}");
    }

    #[test]
    fn test_threshold_cuts_sample() {
        let density = johnson(-0.5).set_mass_threshold(0.5);
        let mut sampler = DirectSampler::new(&density, "mass", 100_000_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(SEED);
        let samples = sampler.generate(SAMPLE_SIZE / 2, &mut rng).unwrap();
        assert!(samples.as_slice().iter().all(|&m| m >= 0.5));

        let observed = stats::histogram(samples.as_slice(), 0.5, 6.0, BINS);
        let expected = bin_integrals(&density, 0.5, 6.0);
        let result = stats::chi_square_gof(&observed, &expected, 0.001).unwrap();
        assert!(!result.is_rejected, "{result:?}");
    }
}
