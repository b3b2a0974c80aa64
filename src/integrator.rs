//! Closed-form integration of densities that declare an analytic integral.
//!
//! An [`IntegrationRequest`] resolves the variable name into a [`VariableId`] once, when it
//! is built; the density then matches on that tag to pick the branch for that variable.

use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;

use crate::distributions::DensityFunction;
use crate::error::{Result, SamplingError};
use crate::parameter::VariableId;

/// Returned instead of an exact zero so that callers dividing by an integral stay finite.
pub const INTEGRAL_FLOOR: f64 = 1e-300;

/// Integrate the density over `variable` between `min` and `max`, all other variables
/// held at their current values.
///
/// The range may be any sub-range (or super-range) of the variable's declared range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationRequest {
    pub variable: VariableId,
    pub min: f64,
    pub max: f64,
}

impl IntegrationRequest {
    /// Resolves `name` against `density` and checks that a closed form exists for it.
    pub fn new<D>(density: &D, name: &str, min: f64, max: f64) -> Result<Self>
    where
        D: DensityFunction + ?Sized,
    {
        let variable = density
            .variable_id(name)
            .ok_or_else(|| SamplingError::UnknownVariable(name.to_string()))?;
        let request = Self { variable, min, max };
        request.validate(density)?;
        Ok(request)
    }

    /// A request over the variable's full declared range.
    pub fn full_range<D>(density: &D, name: &str) -> Result<Self>
    where
        D: DensityFunction + ?Sized,
    {
        let variable = density
            .variable_id(name)
            .and_then(|id| density.variable(id))
            .ok_or_else(|| SamplingError::UnknownVariable(name.to_string()))?;
        Self::new(density, name, variable.min(), variable.max())
    }

    fn validate<D>(&self, density: &D) -> Result<()>
    where
        D: DensityFunction + ?Sized,
    {
        let param = density
            .variable(self.variable)
            .ok_or_else(|| SamplingError::UnknownIntegrationCode(format!("{:?}", self.variable)))?;
        if !param.is_floating() || !density.has_analytic_integral(self.variable) {
            return Err(SamplingError::UnknownIntegrationCode(param.name().to_string()));
        }
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(SamplingError::InvalidRange {
                name: param.name().to_string(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Computes definite integrals through a density's closed forms.
#[derive(Debug, Clone, Copy)]
pub struct AnalyticIntegrator<'a, D: ?Sized> {
    density: &'a D,
}

impl<'a, D> AnalyticIntegrator<'a, D>
where
    D: DensityFunction + ?Sized,
{
    pub fn new(density: &'a D) -> Self {
        Self { density }
    }

    /// Builds a request for `name` over `[min, max]`.
    pub fn request(&self, name: &str, min: f64, max: f64) -> Result<IntegrationRequest> {
        IntegrationRequest::new(self.density, name, min, max)
    }

    /// Evaluates a request. Requests assembled by hand are re-checked against the density,
    /// so a tag the density never declared fails with
    /// [`SamplingError::UnknownIntegrationCode`].
    pub fn integrate(&self, request: &IntegrationRequest) -> Result<f64> {
        request.validate(self.density)?;
        self.density.analytic_integral(request)
    }

    /// Integral of `name` over `[min, max]`.
    pub fn integral(&self, name: &str, min: f64, max: f64) -> Result<f64> {
        let request = self.request(name, min, max)?;
        self.density.analytic_integral(&request)
    }

    /// Integral of `name` over its declared range.
    pub fn normalization(&self, name: &str) -> Result<f64> {
        let request = IntegrationRequest::full_range(self.density, name)?;
        self.density.analytic_integral(&request)
    }
}

/// Standard normal probability mass between `z1` and `z2`, in either order.
///
/// erfc is only ever evaluated on `|z|`, where it is most precise, and the signed
/// result is rebuilt from `erfc(-x) = 2 - erfc(x)`. Two bounds deep in the same tail
/// therefore keep their relative precision instead of cancelling. A zero bound takes
/// the non-negative branch. A mass that underflows to zero is replaced by
/// [`INTEGRAL_FLOOR`].
pub fn normal_mass(z1: f64, z2: f64) -> f64 {
    let (lo, hi) = if z1 <= z2 { (z1, z2) } else { (z2, z1) };
    let ec_lo = erfc(lo.abs() / SQRT_2);
    let ec_hi = erfc(hi.abs() / SQRT_2);

    let mass = 0.5
        * if lo * hi < 0.0 {
            2.0 - (ec_lo + ec_hi)
        } else if hi <= 0.0 {
            ec_hi - ec_lo
        } else {
            ec_lo - ec_hi
        };

    if mass > 0.0 {
        mass
    } else {
        INTEGRAL_FLOOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::FnDensity;
    use crate::parameter::Parameter;
    use approx::assert_relative_eq;

    #[test]
    fn whole_line_has_unit_mass() {
        assert_relative_eq!(
            normal_mass(f64::NEG_INFINITY, f64::INFINITY),
            1.0,
            epsilon = 1e-15
        );
        assert_relative_eq!(normal_mass(-1e300, 1e300), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn bound_order_does_not_matter() {
        assert_eq!(normal_mass(-0.3, 1.7), normal_mass(1.7, -0.3));
    }

    #[test]
    fn zero_bounds_take_the_non_negative_branch() {
        let one_sigma = 0.341_344_746_068_542_9;
        assert_relative_eq!(normal_mass(0.0, 1.0), one_sigma, max_relative = 1e-9);
        assert_relative_eq!(normal_mass(-1.0, 0.0), one_sigma, max_relative = 1e-9);
        assert_relative_eq!(normal_mass(0.0, f64::INFINITY), 0.5, epsilon = 1e-15);
        assert_relative_eq!(normal_mass(-0.0, 2.0), normal_mass(0.0, 2.0));
    }

    #[test]
    fn branches_agree_at_zero() {
        // [-z, 0] uses the non-positive branch, [0, z] the non-negative one.
        for z in [0.3, 1.0, 2.5, 8.0] {
            assert_eq!(normal_mass(-z, 0.0), normal_mass(0.0, z));
            // The straddling branch must split exactly at zero.
            assert_relative_eq!(
                normal_mass(-z, 0.0) + normal_mass(0.0, z),
                normal_mass(-z, z),
                max_relative = 1e-14
            );
        }
    }

    #[test]
    fn upper_tail_keeps_relative_precision() {
        // Q(10)
        let q10 = 7.619_853_024_160_527e-24;
        assert_relative_eq!(normal_mass(10.0, f64::INFINITY), q10, max_relative = 1e-9);
        assert_relative_eq!(normal_mass(-10.0, f64::NEG_INFINITY), q10, max_relative = 1e-9);
        let inner = normal_mass(10.0, 11.0);
        assert!(inner > 0.0 && inner < q10);
    }

    #[test]
    fn empty_range_is_floored() {
        assert_eq!(normal_mass(3.0, 3.0), INTEGRAL_FLOOR);
        assert_eq!(normal_mass(0.0, 0.0), INTEGRAL_FLOOR);
        assert_eq!(normal_mass(50.0, 60.0), INTEGRAL_FLOOR);
    }

    #[test]
    fn densities_without_closed_form_are_refused() {
        let density = FnDensity::new(vec![Parameter::new("x", 0.0, 0.0, 1.0)], |_: &[f64]| 1.0);
        let integrator = AnalyticIntegrator::new(&density);
        assert_eq!(
            integrator.integral("x", 0.0, 1.0),
            Err(SamplingError::UnknownIntegrationCode("x".into()))
        );
        assert!(matches!(
            integrator.integral("y", 0.0, 1.0),
            Err(SamplingError::UnknownVariable(_))
        ));
    }
}
