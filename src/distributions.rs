/*!
Defines the [`DensityFunction`] trait that every sampled density implements, along with
[`FnDensity`], a density built from a plain closure.

A density `f(x; θ)` owns its observables `x` and shape parameters `θ` as [`Parameter`]s.
The point passed to [`DensityFunction::evaluate`] holds one value per observable; the
parameters are read from their current values, which the caller may change between calls.

# Examples

```rust
use densample::distributions::{DensityFunction, FnDensity};
use densample::parameter::Parameter;

let x = Parameter::new("x", 0.5, 0.0, 1.0);
let ramp = FnDensity::new(vec![x], |p: &[f64]| 2.0 * p[0]);
assert_eq!(ramp.evaluate(&[0.25]).unwrap(), 0.5);

let values = ramp.evaluate_batch(&[0.1, 0.2, 0.3]).unwrap();
assert_eq!(values.len(), 3);
```
*/

use rand::RngCore;
use rayon::prelude::*;

use crate::error::{Result, SamplingError};
use crate::integrator::IntegrationRequest;
use crate::parameter::{Parameter, VariableId};

/// Identifies the direct-generation routine a density declared for one of its observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationCode(pub usize);

/// A non-negative, possibly unnormalized density over one or more observables.
///
/// Implementations hold no global state; evaluation is a pure function of the point and
/// the current parameter values, so a shared reference can be evaluated from many threads.
pub trait DensityFunction: Send + Sync {
    /// Observables in the order expected by `evaluate`.
    fn observables(&self) -> &[Parameter];

    fn observables_mut(&mut self) -> &mut [Parameter];

    /// Shape parameters.
    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];

    /// Evaluates the density at `point` (one value per observable).
    ///
    /// Returns a finite, non-negative value, or [`SamplingError::InvalidParameter`] if a
    /// parameter currently sits outside its range.
    fn evaluate(&self, point: &[f64]) -> Result<f64>;

    /// Evaluates a row-major buffer of points in parallel.
    ///
    /// Element `i` of the output equals `evaluate` on the `i`-th point.
    fn evaluate_batch(&self, points: &[f64]) -> Result<Vec<f64>> {
        let dim = self.observables().len();
        if dim == 0 || points.len() % dim != 0 {
            return Err(SamplingError::DimensionMismatch {
                expected: dim,
                got: points.len(),
            });
        }
        points
            .par_chunks_exact(dim)
            .map(|point| self.evaluate(point))
            .collect()
    }

    /// Whether `analytic_integral` has a closed form over the given variable.
    fn has_analytic_integral(&self, _variable: VariableId) -> bool {
        false
    }

    /// Definite integral over the variable and range named by `request`.
    fn analytic_integral(&self, request: &IntegrationRequest) -> Result<f64> {
        Err(SamplingError::UnknownIntegrationCode(format!(
            "{:?}",
            request.variable
        )))
    }

    /// Declares whether `variable` can be drawn by direct inversion.
    fn direct_generation_code(&self, _variable: VariableId) -> Option<GenerationCode> {
        None
    }

    /// Performs one direct-generation trial.
    ///
    /// Returns `Ok(None)` when the trial was rejected (e.g. it fell outside the
    /// observable's range), so the caller decides how often to retry.
    fn generate_direct(&self, code: GenerationCode, _rng: &mut dyn RngCore) -> Result<Option<f64>> {
        let name = self
            .observables()
            .get(code.0)
            .map_or_else(|| format!("observable #{}", code.0), |p| p.name().to_string());
        Err(SamplingError::UnsupportedGenerationTarget(name))
    }

    /// Looks a variable up by name, observables first.
    fn variable_id(&self, name: &str) -> Option<VariableId> {
        if let Some(i) = self.observables().iter().position(|p| p.name() == name) {
            return Some(VariableId::Observable(i));
        }
        self.parameters()
            .iter()
            .position(|p| p.name() == name)
            .map(VariableId::Parameter)
    }

    fn variable(&self, id: VariableId) -> Option<&Parameter> {
        match id {
            VariableId::Observable(i) => self.observables().get(i),
            VariableId::Parameter(i) => self.parameters().get(i),
        }
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        match self.variable_id(name) {
            Some(VariableId::Observable(i)) => Ok(&mut self.observables_mut()[i]),
            Some(VariableId::Parameter(i)) => Ok(&mut self.parameters_mut()[i]),
            None => Err(SamplingError::UnknownVariable(name.to_string())),
        }
    }

    /// Binds a new value to the named variable.
    fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        self.variable_mut(name)?.set_value(value);
        Ok(())
    }

    /// Current observable values, the point the density is "sitting at".
    fn current_point(&self) -> Vec<f64> {
        self.observables().iter().map(Parameter::value).collect()
    }
}

/// Fails on the first parameter outside its range.
pub(crate) fn check_parameters(params: &[Parameter]) -> Result<()> {
    params.iter().try_for_each(|p| p.check().map(|_| ()))
}

/**
A density given by a closure over the observables, with no shape parameters.

Negative or non-finite closure values are reported as zero, keeping the
non-negativity contract of [`DensityFunction::evaluate`].

# Examples

```rust
use densample::distributions::{DensityFunction, FnDensity};
use densample::parameter::Parameter;

let gauss = FnDensity::new(
    vec![Parameter::new("x", 0.0, -5.0, 5.0)],
    |p: &[f64]| (-0.5 * p[0] * p[0]).exp(),
);
assert_eq!(gauss.evaluate(&[0.0]).unwrap(), 1.0);
```
*/
#[derive(Clone)]
pub struct FnDensity<F> {
    observables: Vec<Parameter>,
    parameters: Vec<Parameter>,
    func: F,
}

impl<F> FnDensity<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    pub fn new(observables: Vec<Parameter>, func: F) -> Self {
        Self {
            observables,
            parameters: Vec::new(),
            func,
        }
    }
}

impl<F> std::fmt::Debug for FnDensity<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDensity")
            .field("observables", &self.observables)
            .finish_non_exhaustive()
    }
}

impl<F> DensityFunction for FnDensity<F>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
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
        if point.len() != self.observables.len() {
            return Err(SamplingError::DimensionMismatch {
                expected: self.observables.len(),
                got: point.len(),
            });
        }
        let value = (self.func)(point);
        Ok(if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane() -> FnDensity<impl Fn(&[f64]) -> f64 + Send + Sync> {
        FnDensity::new(
            vec![
                Parameter::new("x", 0.1, 0.0, 1.0),
                Parameter::new("y", 0.2, 0.0, 1.0),
            ],
            |p: &[f64]| 1.0 + p[0] - p[1],
        )
    }

    #[test]
    fn batch_matches_pointwise() {
        let density = plane();
        let points: Vec<f64> = (0..200).map(|i| (i as f64 * 0.37).fract()).collect();
        let batch = density.evaluate_batch(&points).unwrap();
        for (point, value) in points.chunks_exact(2).zip(batch) {
            assert_eq!(density.evaluate(point).unwrap(), value);
        }
    }

    #[test]
    fn batch_rejects_ragged_buffers() {
        let density = plane();
        let err = density.evaluate_batch(&[0.1, 0.2, 0.3]).unwrap_err();
        assert_eq!(
            err,
            SamplingError::DimensionMismatch {
                expected: 2,
                got: 3
            }
        );
    }

    #[test]
    fn negative_and_nan_values_read_as_zero() {
        let density = FnDensity::new(vec![Parameter::new("x", 0.0, -1.0, 1.0)], |p: &[f64]| {
            if p[0] < 0.0 {
                -1.0
            } else {
                f64::NAN
            }
        });
        assert_eq!(density.evaluate(&[-0.5]).unwrap(), 0.0);
        assert_eq!(density.evaluate(&[0.5]).unwrap(), 0.0);
    }

    #[test]
    fn variables_are_found_by_name() {
        let mut density = plane();
        assert_eq!(density.variable_id("y"), Some(VariableId::Observable(1)));
        assert_eq!(density.variable_id("z"), None);
        density.set_value("x", 0.7).unwrap();
        assert_eq!(density.current_point(), vec![0.7, 0.2]);
        assert!(matches!(
            density.set_value("z", 1.0),
            Err(SamplingError::UnknownVariable(_))
        ));
    }

    #[test]
    fn no_direct_generation_by_default() {
        let density = plane();
        assert_eq!(density.direct_generation_code(VariableId::Observable(0)), None);
        let mut rng = rand::thread_rng();
        let err = density
            .generate_direct(GenerationCode(0), &mut rng)
            .unwrap_err();
        assert_eq!(err, SamplingError::UnsupportedGenerationTarget("x".into()));
    }
}
