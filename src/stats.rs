//! Goodness-of-fit checks for generated samples: binning, Pearson's chi-square test and a
//! one-sample Kolmogorov–Smirnov test against a known CDF.
//!
//! The Kolmogorov distribution tails follow *Numerical Recipes* (Third Edition).

use std::cmp::Ordering;

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Outcome of a hypothesis test at significance `level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub is_rejected: bool,
    pub statistic: f64,
    pub p_value: f64,
    pub level: f64,
}

impl TestResult {
    fn new(statistic: f64, p_value: f64, level: f64) -> Self {
        Self {
            is_rejected: p_value < level,
            statistic,
            p_value,
            level,
        }
    }
}

/// Counts `values` into `bins` equal-width bins over `[lo, hi)`. Values outside are dropped;
/// `hi` itself lands in the last bin.
pub fn histogram(values: &[f64], lo: f64, hi: f64, bins: usize) -> Vec<f64> {
    let mut counts = vec![0.0; bins];
    if bins == 0 || !(hi > lo) {
        return counts;
    }
    let width = (hi - lo) / bins as f64;
    for &v in values {
        if !(lo..=hi).contains(&v) {
            continue;
        }
        let b = (((v - lo) / width) as usize).min(bins - 1);
        counts[b] += 1.0;
    }
    counts
}

/// Pearson's chi-square test of `observed` counts against `expected` counts.
///
/// `expected` is rescaled to the observed total, so bin probabilities may be passed
/// directly. Bins with zero expectation are skipped; the test has one degree of freedom
/// less than the number of used bins.
pub fn chi_square_gof(observed: &[f64], expected: &[f64], level: f64) -> Result<TestResult, String> {
    if observed.len() != expected.len() {
        return Err(format!(
            "{} observed bins but {} expected",
            observed.len(),
            expected.len()
        ));
    }
    let n_obs: f64 = observed.iter().sum();
    let n_exp: f64 = expected.iter().sum();
    if !(n_obs > 0.0 && n_exp > 0.0) {
        return Err("chi-square test needs positive totals".into());
    }
    let scale = n_obs / n_exp;

    let mut statistic = 0.0;
    let mut used = 0;
    for (&o, &e) in observed.iter().zip(expected) {
        let e = e * scale;
        if e > 0.0 {
            statistic += (o - e).powi(2) / e;
            used += 1;
        }
    }
    if used < 2 {
        return Err("chi-square test needs at least two populated bins".into());
    }
    let dist = ChiSquared::new((used - 1) as f64).map_err(|e| e.to_string())?;
    Ok(TestResult::new(statistic, dist.sf(statistic), level))
}

/// One-sample KS test of `sample` against the continuous distribution function `cdf`.
///
/// Sorts `sample` in place.
pub fn ks_test<F>(sample: &mut [f64], cdf: F, level: f64) -> Result<TestResult, String>
where
    F: Fn(f64) -> f64,
{
    if sample.is_empty() {
        return Err("Expected a non-empty sample.".into());
    }
    sample.sort_unstable_by(cmp_f64);
    let n = sample.len() as f64;
    let statistic = sample
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let f = cdf(x);
            ((i + 1) as f64 / n - f).max(f - i as f64 / n)
        })
        .fold(0.0, f64::max);
    let sqrt_n = n.sqrt();
    let p_value = qks((sqrt_n + 0.12 + 0.11 / sqrt_n) * statistic)?;
    Ok(TestResult::new(statistic, p_value, level))
}

/// CDF of the Kolmogorov distribution.
fn pks(z: f64) -> Result<f64, String> {
    if z < 0. {
        return Err("Bad z for KS distribution function.".into());
    }
    if z == 0. {
        return Ok(0.);
    }
    if z < 1.18 {
        let y = (-1.233_700_550_136_169_7 / z.powi(2)).exp();
        return Ok(2.256_758_334_191_025
            * (-y.ln()).sqrt()
            * (y + y.powf(9.) + y.powf(25.) + y.powf(49.)));
    }
    let x = (-2. * z.powi(2)).exp();
    Ok(1. - 2. * (x - x.powf(4.) + x.powf(9.)))
}

/// Complementary CDF of the Kolmogorov distribution.
fn qks(z: f64) -> Result<f64, String> {
    if z < 0. {
        return Err("Bad z for KS distribution function.".into());
    }
    if z == 0. {
        return Ok(1.);
    }
    if z < 1.18 {
        return Ok(1. - pks(z)?);
    }
    let x = (-2. * z.powi(2)).exp();
    Ok(2. * (x - x.powf(4.) + x.powf(9.)))
}

/// Sort order with NaN after every number.
fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn histogram_bins_and_edges() {
        let counts = histogram(&[0.0, 0.1, 0.5, 0.99, 1.0, 1.5, -0.1], 0.0, 1.0, 4);
        assert_eq!(counts, vec![2.0, 0.0, 1.0, 2.0]);
        assert!(histogram(&[0.5], 1.0, 0.0, 3).iter().all(|&c| c == 0.0));
    }

    #[test]
    fn chi_square_known_value() {
        let res = chi_square_gof(&[10.0, 20.0], &[0.5, 0.5], 0.05).unwrap();
        assert_abs_diff_eq!(res.statistic, 10.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(res.p_value, 0.067889, epsilon = 1e-5);
        assert!(!res.is_rejected);

        let perfect = chi_square_gof(&[5.0, 5.0, 10.0], &[1.0, 1.0, 2.0], 0.05).unwrap();
        assert_eq!(perfect.statistic, 0.0);
        assert_abs_diff_eq!(perfect.p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn chi_square_input_errors() {
        assert!(chi_square_gof(&[1.0], &[1.0, 2.0], 0.05).is_err());
        assert!(chi_square_gof(&[0.0, 0.0], &[1.0, 1.0], 0.05).is_err());
        assert!(chi_square_gof(&[3.0, 4.0], &[1.0, 0.0], 0.05).is_err());
    }

    #[test]
    fn ks_accepts_matching_sample() {
        let mut grid: Vec<f64> = (0..1_000).rev().map(|i| (i as f64 + 0.5) / 1_000.0).collect();
        let res = ks_test(&mut grid, |x| x, 0.05).unwrap();
        assert_abs_diff_eq!(res.statistic, 0.0005, epsilon = 1e-12);
        assert!(!res.is_rejected);
        assert!(grid.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn ks_rejects_shifted_sample() {
        let mut shifted: Vec<f64> = (0..1_000).map(|i| (i as f64 + 0.5) / 1_000.0 * 0.8).collect();
        let res = ks_test(&mut shifted, |x| x.clamp(0.0, 1.0), 0.01).unwrap();
        assert_abs_diff_eq!(res.statistic, 0.2, epsilon = 1e-3);
        assert!(res.is_rejected);
        assert!(ks_test(&mut [], |x| x, 0.05).is_err());
    }

    #[test]
    fn kolmogorov_tails() {
        assert!(pks(-1.0).is_err());
        assert_eq!(pks(0.0).unwrap(), 0.0);
        assert_abs_diff_eq!(pks(1.23).unwrap(), 0.9029731024047791, epsilon = 1e-8);
        assert_abs_diff_eq!(pks(2.34).unwrap(), 0.9999649260833611, epsilon = 1e-8);
        assert_eq!(qks(0.0).unwrap(), 1.0);
        assert_abs_diff_eq!(qks(0.5).unwrap() + pks(0.5).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn nan_sorts_last() {
        let mut s = [f64::NAN, 2.0, f64::NAN, 1.0];
        s.sort_by(cmp_f64);
        assert!(s[0] == 1.0 && s[1] == 2.0 && s[2].is_nan() && s[3].is_nan());
    }
}
