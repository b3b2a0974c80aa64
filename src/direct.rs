/*!
Direct generation: draws a single observable through the density's own inversion routine.

Each trial asks [`DensityFunction::generate_direct`] for one candidate; rejected candidates
(outside the observable's range, below a threshold) are retried until the requested number
of points exists or the trial budget is spent.

# Examples

```rust
use densample::direct::DirectSampler;
use densample::johnson::Johnson;
use densample::parameter::Parameter;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let johnson = Johnson::new(
    Parameter::new("mass", 0.0, -10.0, 10.0),
    Parameter::new("mu", 0.0, -5.0, 5.0),
    Parameter::new("lambda", 1.0, 0.0, 10.0),
    Parameter::new("gamma", 0.5, -5.0, 5.0),
    Parameter::new("delta", 1.5, 0.0, 10.0),
)
.unwrap();

let mut sampler = DirectSampler::new(&johnson, "mass", 1_000_000).unwrap();
let mut rng = SmallRng::seed_from_u64(42);
let samples = sampler.generate(1_000, &mut rng).unwrap();
assert_eq!(samples.len(), 1_000);
```
*/

use rand::Rng;

use crate::core::{check_complete, DrawStats, EventSource, SampleBuffer};
use crate::distributions::{DensityFunction, GenerationCode};
use crate::error::{Result, SamplingError};

/// Samples one observable by repeated direct-generation trials.
#[derive(Debug)]
pub struct DirectSampler<'a, D: ?Sized> {
    density: &'a D,
    code: GenerationCode,
    variables: Vec<String>,
    max_trials: u64,
    last: DrawStats,
}

impl<'a, D> DirectSampler<'a, D>
where
    D: DensityFunction + ?Sized,
{
    /// Fails with [`SamplingError::UnsupportedGenerationTarget`] unless the density declares
    /// a direct-generation code for the floating variable `variable`.
    pub fn new(density: &'a D, variable: &str, max_trials: u64) -> Result<Self> {
        if max_trials == 0 {
            return Err(SamplingError::InvalidConfig(
                "max_trials must be positive".into(),
            ));
        }
        let id = density
            .variable_id(variable)
            .ok_or_else(|| SamplingError::UnknownVariable(variable.to_string()))?;
        let floating = density.variable(id).is_some_and(|p| p.is_floating());
        let code = density
            .direct_generation_code(id)
            .filter(|_| floating)
            .ok_or_else(|| SamplingError::UnsupportedGenerationTarget(variable.to_string()))?;
        Ok(Self {
            density,
            code,
            variables: vec![variable.to_string()],
            max_trials,
            last: DrawStats::default(),
        })
    }

    /// Generates exactly `count` points or fails with
    /// [`SamplingError::GenerationBudgetExceeded`].
    pub fn generate<R: Rng>(&mut self, count: usize, rng: &mut R) -> Result<SampleBuffer> {
        let mut out = SampleBuffer::with_capacity(self.variables.clone(), count);
        self.last = self.draw(count, self.max_trials, rng, &mut out)?;
        check_complete(count, &self.last)?;
        Ok(out)
    }

    /// Fraction of trials rejected by the most recent `generate` call.
    pub fn resample_ratio(&self) -> f64 {
        self.last.resample_ratio()
    }

    pub fn last_stats(&self) -> DrawStats {
        self.last
    }
}

impl<'a, D> EventSource for DirectSampler<'a, D>
where
    D: DensityFunction + ?Sized,
{
    fn variables(&self) -> &[String] {
        &self.variables
    }

    fn max_trials(&self) -> u64 {
        self.max_trials
    }

    fn draw<R: Rng>(
        &self,
        count: usize,
        budget: u64,
        rng: &mut R,
        out: &mut SampleBuffer,
    ) -> Result<DrawStats> {
        let mut stats = DrawStats::default();
        while stats.accepted < count && stats.trials < budget {
            stats.trials += 1;
            if let Some(x) = self.density.generate_direct(self.code, rng)? {
                out.push(&[x]);
                stats.accepted += 1;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParallelGenerate;
    use crate::distributions::FnDensity;
    use crate::johnson::Johnson;
    use crate::parameter::Parameter;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn johnson(lo: f64, hi: f64) -> Johnson {
        Johnson::new(
            Parameter::new("mass", 0.0, lo, hi),
            Parameter::new("mu", 0.0, -5.0, 5.0),
            Parameter::new("lambda", 1.0, 0.0, 10.0),
            Parameter::new("gamma", 0.0, -5.0, 5.0),
            Parameter::new("delta", 1.0, 0.0, 10.0),
        )
        .unwrap()
    }

    #[test]
    fn generates_exact_count_inside_range() {
        let density = johnson(-1.0, 2.0);
        let mut sampler = DirectSampler::new(&density, "mass", 1_000_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let samples = sampler.generate(5_000, &mut rng).unwrap();
        assert_eq!(samples.len(), 5_000);
        assert!(samples.as_slice().iter().all(|m| (-1.0..=2.0).contains(m)));
        // Roughly a third of the unbounded distribution falls outside [-1, 2].
        assert!(sampler.resample_ratio() > 0.1 && sampler.resample_ratio() < 0.6);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let density = johnson(8.0, 9.0);
        let mut sampler = DirectSampler::new(&density, "mass", 1_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let err = sampler.generate(100, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            SamplingError::GenerationBudgetExceeded { requested: 100, trials: 1_000, .. }
        ));
        assert!(err.is_recoverable());
    }

    #[test]
    fn parameters_cannot_be_generated_directly() {
        let density = johnson(-1.0, 1.0);
        assert_eq!(
            DirectSampler::new(&density, "mu", 10).unwrap_err(),
            SamplingError::UnsupportedGenerationTarget("mu".into())
        );
        assert!(matches!(
            DirectSampler::new(&density, "nope", 10),
            Err(SamplingError::UnknownVariable(_))
        ));
        assert!(DirectSampler::new(&density, "mass", 0).is_err());
    }

    #[test]
    fn closure_densities_have_no_direct_path() {
        let density = FnDensity::new(vec![Parameter::new("x", 0.5, 0.0, 1.0)], |_: &[f64]| 1.0);
        assert!(matches!(
            DirectSampler::new(&density, "x", 10),
            Err(SamplingError::UnsupportedGenerationTarget(_))
        ));
    }

    #[test]
    fn constant_observable_is_not_generated() {
        let mut density = johnson(-1.0, 1.0);
        density.variable_mut("mass").unwrap().set_floating(false);
        assert!(matches!(
            DirectSampler::new(&density, "mass", 10),
            Err(SamplingError::UnsupportedGenerationTarget(_))
        ));
    }

    #[test]
    fn parallel_streams_fill_request() {
        let density = johnson(-3.0, 3.0);
        let sampler = DirectSampler::new(&density, "mass", 10_000_000).unwrap();
        let (samples, stats) = sampler.par_generate(20_000, 4, 42).unwrap();
        assert_eq!(samples.len(), 20_000);
        assert_eq!(stats.accepted, 20_000);
        let mean = samples.as_slice().iter().sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.05, "mean = {mean}");
    }
}
