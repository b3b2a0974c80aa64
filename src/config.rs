//! Tuning knobs for the samplers.

use crate::error::{Result, SamplingError};

/// Settings of the adaptive cell sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoamConfig {
    /// Number of leaf cells at which exploration stops.
    pub target_cells: usize,
    /// Density evaluations spent on exploring each new cell.
    pub exploration_samples: usize,
    /// A cell is only split while `1 - mean/max` of its sampled values exceeds this.
    pub flatness_threshold: f64,
}

impl Default for FoamConfig {
    fn default() -> Self {
        Self {
            target_cells: 500,
            exploration_samples: 200,
            flatness_threshold: 0.05,
        }
    }
}

impl FoamConfig {
    /// Cell budget scaled to the number of generated variables.
    pub fn for_dimension(dim: usize) -> Self {
        let target_cells = match dim {
            0 | 1 => 30,
            2 => 500,
            3 => 5_000,
            _ => 10_000,
        };
        Self {
            target_cells,
            ..Self::default()
        }
    }

    pub fn set_target_cells(mut self, target_cells: usize) -> Self {
        self.target_cells = target_cells;
        self
    }

    pub fn set_exploration_samples(mut self, exploration_samples: usize) -> Self {
        self.exploration_samples = exploration_samples;
        self
    }

    pub fn set_flatness_threshold(mut self, flatness_threshold: f64) -> Self {
        self.flatness_threshold = flatness_threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_cells == 0 {
            return Err(SamplingError::InvalidConfig(
                "target_cells must be positive".into(),
            ));
        }
        if self.exploration_samples == 0 {
            return Err(SamplingError::InvalidConfig(
                "exploration_samples must be positive".into(),
            ));
        }
        if !(self.flatness_threshold > 0.0 && self.flatness_threshold <= 1.0) {
            return Err(SamplingError::InvalidConfig(format!(
                "flatness_threshold must lie in (0, 1], got {}",
                self.flatness_threshold
            )));
        }
        Ok(())
    }
}

/// Settings shared by every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenConfig {
    pub foam: FoamConfig,
    /// Maximum number of proposals per generation call.
    pub max_trials: u64,
    /// Fall back to the adaptive cell sampler when direct generation is unavailable.
    pub adaptive_fallback: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            foam: FoamConfig::default(),
            max_trials: 100_000_000,
            adaptive_fallback: true,
        }
    }
}

impl GenConfig {
    pub fn set_foam(mut self, foam: FoamConfig) -> Self {
        self.foam = foam;
        self
    }

    pub fn set_max_trials(mut self, max_trials: u64) -> Self {
        self.max_trials = max_trials;
        self
    }

    pub fn set_adaptive_fallback(mut self, adaptive_fallback: bool) -> Self {
        self.adaptive_fallback = adaptive_fallback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_trials == 0 {
            return Err(SamplingError::InvalidConfig(
                "max_trials must be positive".into(),
            ));
        }
        self.foam.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(GenConfig::default().validate().is_ok());
        for dim in 1..6 {
            assert!(FoamConfig::for_dimension(dim).validate().is_ok());
        }
        assert_eq!(FoamConfig::for_dimension(3).target_cells, 5_000);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let foam = FoamConfig::default();
        assert!(foam.set_target_cells(0).validate().is_err());
        assert!(foam.set_exploration_samples(0).validate().is_err());
        assert!(foam.set_flatness_threshold(0.0).validate().is_err());
        assert!(foam.set_flatness_threshold(1.5).validate().is_err());
        assert!(foam.set_flatness_threshold(f64::NAN).validate().is_err());
        assert!(foam.set_flatness_threshold(1.0).validate().is_ok());
        assert!(GenConfig::default().set_max_trials(0).validate().is_err());
    }
}
