//! Named variables bound to a density: observables and shape parameters alike.

use crate::error::{Result, SamplingError};

/// Whether a variable takes real values or indexes a finite set of states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Continuous,
    Categorical { states: usize },
}

/// Position of a variable inside a density: one of its observables or one of
/// its shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableId {
    Observable(usize),
    Parameter(usize),
}

/// A named variable with a current value and a valid range `[min, max]`.
///
/// Values are written by whoever binds the density (a fit loop, a generator);
/// the range is only enforced when the density is evaluated, see [`Parameter::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: f64,
    min: f64,
    max: f64,
    floating: bool,
    kind: VariableKind,
}

impl Parameter {
    /// Creates a floating, continuous variable.
    pub fn new(name: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            value,
            min,
            max,
            floating: true,
            kind: VariableKind::Continuous,
        }
    }

    /// Creates a constant. Its range collapses onto the value.
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            floating: false,
            ..Self::new(name, value, value, value)
        }
    }

    /// Creates a categorical variable with states `0..states`.
    pub fn categorical(name: impl Into<String>, value: usize, states: usize) -> Self {
        Self {
            kind: VariableKind::Categorical { states },
            ..Self::new(name, value as f64, 0.0, states.saturating_sub(1) as f64)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn is_floating(&self) -> bool {
        self.floating
    }

    pub fn kind(&self) -> VariableKind {
        self.kind
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_floating(&mut self, floating: bool) {
        self.floating = floating;
    }

    /// Replaces the valid range. Fails if `min > max` or either end is NaN.
    pub fn set_range(&mut self, min: f64, max: f64) -> Result<()> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(SamplingError::InvalidRange {
                name: self.name.clone(),
                min,
                max,
            });
        }
        self.min = min;
        self.max = max;
        Ok(())
    }

    pub fn contains(&self, x: f64) -> bool {
        self.min <= x && x <= self.max
    }

    /// Fails with [`SamplingError::InvalidParameter`] if the current value left the range.
    pub fn check(&self) -> Result<f64> {
        if self.contains(self.value) {
            Ok(self.value)
        } else {
            Err(SamplingError::InvalidParameter {
                name: self.name.clone(),
                value: self.value,
                min: self.min,
                max: self.max,
            })
        }
    }

    /// The range as a finite interval, as needed by numeric generation.
    pub fn finite_range(&self) -> Result<(f64, f64)> {
        if self.min.is_finite() && self.max.is_finite() && self.min < self.max {
            Ok((self.min, self.max))
        } else {
            Err(SamplingError::InvalidRange {
                name: self.name.clone(),
                min: self.min,
                max: self.max,
            })
        }
    }
}
