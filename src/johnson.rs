/*!
Johnson's S_U distribution.

A normally distributed `z` is mapped onto the observable through
`z = gamma + delta * asinh((x - mu) / lambda)`, giving the density

```text
f(x) = delta / (lambda * sqrt(2 pi) * sqrt(1 + a^2)) * exp(-z^2 / 2),   a = (x - mu) / lambda
```

It is normalized on the real line. A mass threshold sets the density to zero to the
left of it, which is how the distribution is commonly used for mass differences close
to a kinematic limit.

Reference: Johnson, N. L. (1949). *Systems of Frequency Curves Generated by Methods of
Translation*. Biometrika 36(1/2), 149–176.

# Examples

```rust
use densample::distributions::DensityFunction;
use densample::integrator::AnalyticIntegrator;
use densample::johnson::Johnson;
use densample::parameter::Parameter;

let johnson = Johnson::new(
    Parameter::new("mass", 0.0, -50.0, 50.0),
    Parameter::new("mu", 0.0, -5.0, 5.0),
    Parameter::new("lambda", 1.0, 0.0, 10.0),
    Parameter::new("gamma", 0.5, -5.0, 5.0),
    Parameter::new("delta", 1.5, 0.0, 10.0),
)
.unwrap();

assert!(johnson.evaluate(&[0.3]).unwrap() > 0.0);
let norm = AnalyticIntegrator::new(&johnson).normalization("mass").unwrap();
assert!((norm - 1.0).abs() < 1e-9);
```
*/

use std::f64::consts::PI;

use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use crate::distributions::{check_parameters, DensityFunction, GenerationCode};
use crate::error::{Result, SamplingError};
use crate::integrator::{normal_mass, IntegrationRequest, INTEGRAL_FLOOR};
use crate::parameter::{Parameter, VariableId};

const MU: usize = 0;
const LAMBDA: usize = 1;
const GAMMA: usize = 2;
const DELTA: usize = 3;

/// Johnson S_U density over a single observable (`mass`).
#[derive(Debug, Clone, PartialEq)]
pub struct Johnson {
    observables: [Parameter; 1],
    parameters: [Parameter; 4],
    mass_threshold: f64,
}

/// Parameter values checked against their ranges.
#[derive(Debug, Clone, Copy)]
struct Shape {
    mu: f64,
    lambda: f64,
    gamma: f64,
    delta: f64,
}

impl Shape {
    fn reduced(&self, x: f64) -> f64 {
        self.gamma + self.delta * ((x - self.mu) / self.lambda).asinh()
    }

    fn density(&self, x: f64) -> f64 {
        let arg = (x - self.mu) / self.lambda;
        let expo = self.gamma + self.delta * arg.asinh();
        self.delta / (2.0 * PI).sqrt() / (self.lambda * arg.hypot(1.0)) * (-0.5 * expo * expo).exp()
    }
}

impl Johnson {
    /// Creates the density. `lambda` and `delta` must not admit negative values.
    pub fn new(
        mass: Parameter,
        mu: Parameter,
        lambda: Parameter,
        gamma: Parameter,
        delta: Parameter,
    ) -> Result<Self> {
        for p in [&lambda, &delta] {
            if p.min() < 0.0 {
                return Err(SamplingError::InvalidRange {
                    name: p.name().to_string(),
                    min: p.min(),
                    max: p.max(),
                });
            }
        }
        Ok(Self {
            observables: [mass],
            parameters: [mu, lambda, gamma, delta],
            mass_threshold: f64::NEG_INFINITY,
        })
    }

    /// Sets the density to zero below `threshold`.
    pub fn set_mass_threshold(mut self, threshold: f64) -> Self {
        self.mass_threshold = threshold;
        self
    }

    pub fn mass_threshold(&self) -> f64 {
        self.mass_threshold
    }

    fn shape(&self) -> Result<Shape> {
        check_parameters(&self.parameters)?;
        for idx in [LAMBDA, DELTA] {
            let p = &self.parameters[idx];
            if p.value() <= 0.0 {
                return Err(SamplingError::InvalidParameter {
                    name: p.name().to_string(),
                    value: p.value(),
                    min: p.min(),
                    max: p.max(),
                });
            }
        }
        Ok(Shape {
            mu: self.parameters[MU].value(),
            lambda: self.parameters[LAMBDA].value(),
            gamma: self.parameters[GAMMA].value(),
            delta: self.parameters[DELTA].value(),
        })
    }
}

impl DensityFunction for Johnson {
    fn observables(&self) -> &[Parameter] {
        &self.observables
    }

    fn observables_mut(&mut self) -> &mut [Parameter] {
        &mut self.observables
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    fn evaluate(&self, point: &[f64]) -> Result<f64> {
        let &[x] = point else {
            return Err(SamplingError::DimensionMismatch {
                expected: 1,
                got: point.len(),
            });
        };
        let shape = self.shape()?;
        if x < self.mass_threshold {
            return Ok(0.0);
        }
        Ok(shape.density(x))
    }

    fn has_analytic_integral(&self, variable: VariableId) -> bool {
        matches!(
            variable,
            VariableId::Observable(0) | VariableId::Parameter(MU..=DELTA)
        )
    }

    /// All branches reduce to a standard normal mass between two transformed bounds.
    ///
    /// Integrals over `mass`, `mu` and `gamma` are exact. For `lambda` and `delta` the
    /// returned value is the Gaussian mass between the transformed bounds.
    fn analytic_integral(&self, request: &IntegrationRequest) -> Result<f64> {
        let shape = self.shape()?;
        let (min, max) = (request.min, request.max);
        let x = self.observables[0].value();
        if !matches!(request.variable, VariableId::Observable(_)) && x < self.mass_threshold {
            return Ok(INTEGRAL_FLOOR);
        }

        // Each branch maps the integration range to reduced Gaussian bounds.
        let (z1, z2, jacobian) = match request.variable {
            VariableId::Observable(0) => {
                // Nothing below the threshold contributes.
                let lo = min.max(self.mass_threshold);
                let hi = max.max(lo);
                (shape.reduced(lo), shape.reduced(hi), 1.0)
            }
            // mu and lambda enter through `a`, so the bounds may come out reversed.
            VariableId::Parameter(MU) => {
                let z = |mu: f64| shape.gamma + shape.delta * ((x - mu) / shape.lambda).asinh();
                (z(min), z(max), 1.0)
            }
            VariableId::Parameter(LAMBDA) => {
                let z = |lambda: f64| shape.gamma + shape.delta * ((x - shape.mu) / lambda).asinh();
                (z(min), z(max), 1.0)
            }
            // Shifting gamma moves the Gaussian; the density carries the Jacobian.
            VariableId::Parameter(GAMMA) => {
                let arg = (x - shape.mu) / shape.lambda;
                let s = shape.delta * arg.asinh();
                (min + s, max + s, shape.delta / (shape.lambda * arg.hypot(1.0)))
            }
            VariableId::Parameter(DELTA) => {
                let s = ((x - shape.mu) / shape.lambda).asinh();
                (shape.gamma + min * s, shape.gamma + max * s, 1.0)
            }
            other => {
                return Err(SamplingError::UnknownIntegrationCode(format!("{other:?}")));
            }
        };

        // normal_mass orders the bounds itself.
        let value = jacobian * normal_mass(z1, z2);
        Ok(if value > 0.0 { value } else { INTEGRAL_FLOOR })
    }

    fn direct_generation_code(&self, variable: VariableId) -> Option<GenerationCode> {
        match variable {
            VariableId::Observable(0) if self.observables[0].is_floating() => {
                Some(GenerationCode(0))
            }
            _ => None,
        }
    }

    /// Inverts the transform for a standard normal deviate and keeps it if it lands in
    /// the mass range and above the threshold.
    fn generate_direct(&self, code: GenerationCode, rng: &mut dyn RngCore) -> Result<Option<f64>> {
        if code != GenerationCode(0) {
            return Err(SamplingError::UnsupportedGenerationTarget(format!(
                "observable #{}",
                code.0
            )));
        }
        let shape = self.shape()?;
        let gauss: f64 = rng.sample(StandardNormal);
        let mass = shape.mu + shape.lambda * ((gauss - shape.gamma) / shape.delta).sinh();
        let accepted = self.observables[0].contains(mass) && self.mass_threshold <= mass;
        Ok(accepted.then_some(mass))
    }
}
