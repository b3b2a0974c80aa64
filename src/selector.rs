/*!
Chooses how to generate a set of variables of a density.

A single variable with a declared direct-generation code goes to [`DirectSampler`];
everything else goes to a [`FoamGenerator`] over the full variable set, unless the
adaptive fallback is switched off in [`GenConfig`].

# Examples

```rust
use densample::config::GenConfig;
use densample::johnson::Johnson;
use densample::parameter::Parameter;
use densample::selector::SamplerSelector;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let johnson = Johnson::new(
    Parameter::new("mass", 0.0, -10.0, 10.0),
    Parameter::new("mu", 0.0, -5.0, 5.0),
    Parameter::new("lambda", 1.0, 0.0, 10.0),
    Parameter::new("gamma", 0.0, -5.0, 5.0),
    Parameter::new("delta", 1.0, 0.0, 10.0),
)
.unwrap();

let selector = SamplerSelector::new(GenConfig::default()).unwrap();
let mut rng = SmallRng::seed_from_u64(42);
let mut sampler = selector.select(&johnson, &["mass"], &mut rng).unwrap();
assert!(sampler.is_direct());
let samples = sampler.generate(100, &mut rng).unwrap();
assert_eq!(samples.len(), 100);
```
*/

use rand::Rng;

use crate::config::GenConfig;
use crate::core::{DrawStats, EventSource, SampleBuffer};
use crate::direct::DirectSampler;
use crate::distributions::DensityFunction;
use crate::error::{Result, SamplingError};
use crate::foam::FoamGenerator;

/// A constructed sampler of either kind.
#[derive(Debug)]
pub enum Sampler<'a, D: ?Sized> {
    Direct(DirectSampler<'a, D>),
    Foam(FoamGenerator<'a, D>),
}

impl<'a, D> Sampler<'a, D>
where
    D: DensityFunction + ?Sized,
{
    pub fn is_direct(&self) -> bool {
        matches!(self, Sampler::Direct(_))
    }

    pub fn generate<R: Rng>(&mut self, count: usize, rng: &mut R) -> Result<SampleBuffer> {
        match self {
            Sampler::Direct(s) => s.generate(count, rng),
            Sampler::Foam(s) => s.generate(count, rng),
        }
    }

    pub fn resample_ratio(&self) -> f64 {
        match self {
            Sampler::Direct(s) => s.resample_ratio(),
            Sampler::Foam(s) => s.resample_ratio(),
        }
    }

    pub fn last_stats(&self) -> DrawStats {
        match self {
            Sampler::Direct(s) => s.last_stats(),
            Sampler::Foam(s) => s.last_stats(),
        }
    }
}

impl<'a, D> EventSource for Sampler<'a, D>
where
    D: DensityFunction + ?Sized,
{
    fn variables(&self) -> &[String] {
        match self {
            Sampler::Direct(s) => s.variables(),
            Sampler::Foam(s) => s.variables(),
        }
    }

    fn max_trials(&self) -> u64 {
        match self {
            Sampler::Direct(s) => s.max_trials(),
            Sampler::Foam(s) => s.max_trials(),
        }
    }

    fn draw<R: Rng>(
        &self,
        count: usize,
        budget: u64,
        rng: &mut R,
        out: &mut SampleBuffer,
    ) -> Result<DrawStats> {
        match self {
            Sampler::Direct(s) => s.draw(count, budget, rng, out),
            Sampler::Foam(s) => s.draw(count, budget, rng, out),
        }
    }
}

/// Dispatches generation requests on the density's declared capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SamplerSelector {
    config: GenConfig,
}

impl SamplerSelector {
    pub fn new(config: GenConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GenConfig {
        &self.config
    }

    /// Builds the sampler for `variables`. `rng` drives the foam exploration, if any.
    pub fn select<'a, D, R>(
        &self,
        density: &'a D,
        variables: &[&str],
        rng: &mut R,
    ) -> Result<Sampler<'a, D>>
    where
        D: DensityFunction + ?Sized,
        R: Rng,
    {
        if let &[name] = variables {
            match DirectSampler::new(density, name, self.config.max_trials) {
                Ok(direct) => return Ok(Sampler::Direct(direct)),
                Err(SamplingError::UnsupportedGenerationTarget(_))
                    if self.config.adaptive_fallback =>
                {
                    log::debug!("no direct generation for '{name}', exploring a foam");
                }
                Err(e) => return Err(e),
            }
        } else if !self.config.adaptive_fallback {
            return Err(SamplingError::UnsupportedGenerationTarget(variables.join(", ")));
        }
        FoamGenerator::new(density, variables, &[], &self.config, rng).map(Sampler::Foam)
    }
}
