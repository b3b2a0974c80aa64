use thiserror::Error;

/// Everything that can go wrong while evaluating, integrating or sampling a density.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("parameter '{name}' = {value} is outside its valid range [{min}, {max}]")]
    InvalidParameter {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("no analytic integral is declared for '{0}'")]
    UnknownIntegrationCode(String),
    #[error("direct generation of '{0}' is not supported")]
    UnsupportedGenerationTarget(String),
    #[error("unsupported sampling mode: {0}")]
    UnsupportedSamplingMode(String),
    #[error("generated {accepted} of {requested} events before exhausting {trials} trials")]
    GenerationBudgetExceeded {
        requested: usize,
        accepted: usize,
        trials: u64,
    },
    #[error("density integrates to {integral} over the sampling domain")]
    DegenerateDensity { integral: f64 },
    #[error("invalid range [{min}, {max}] for '{name}'")]
    InvalidRange { name: String, min: f64, max: f64 },
    #[error("no variable named '{0}'")]
    UnknownVariable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("expected a multiple of {expected} values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

impl SamplingError {
    /// Whether the failure belongs to one request only and the caller may retry
    /// with other parameters, a larger budget or a different domain.
    ///
    /// Structural misuse (unknown codes, unsupported modes, bad configuration)
    /// is never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SamplingError::InvalidParameter { .. }
                | SamplingError::GenerationBudgetExceeded { .. }
                | SamplingError::DegenerateDensity { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SamplingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_taxonomy() {
        let budget = SamplingError::GenerationBudgetExceeded {
            requested: 10,
            accepted: 3,
            trials: 100,
        };
        assert!(budget.is_recoverable());
        assert!(SamplingError::DegenerateDensity { integral: 0.0 }.is_recoverable());
        assert!(!SamplingError::UnknownIntegrationCode("mu".into()).is_recoverable());
        assert!(!SamplingError::UnsupportedSamplingMode("conditional".into()).is_recoverable());
    }

    #[test]
    fn messages_name_the_variable() {
        let err = SamplingError::InvalidParameter {
            name: "lambda".into(),
            value: -1.0,
            min: 0.0,
            max: 10.0,
        };
        assert_eq!(
            err.to_string(),
            "parameter 'lambda' = -1 is outside its valid range [0, 10]"
        );
    }
}
