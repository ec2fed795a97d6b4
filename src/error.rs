//! Error taxonomy of the dynamics engine.

use thiserror::Error;

/// Everything that can go wrong while building an ecosystem or running it.
/// Nothing is retried internally; every variant reaches the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EcosystemError {
    /// Non-positive species count, malformed explicit structure or bad parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Initial population or scenario scalars rejected before integration.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The integrator produced non-finite values or could not make progress.
    #[error("Integration error: {0}")]
    IntegrationError(String),

    /// Diversity requested for a population with zero total biomass.
    #[error("Invalid metric input: {0}")]
    InvalidMetricInput(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EcosystemError>;

impl EcosystemError {
    #[must_use]
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    #[must_use]
    pub fn input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    #[must_use]
    pub fn integration<S: Into<String>>(msg: S) -> Self {
        Self::IntegrationError(msg.into())
    }

    #[must_use]
    pub fn metric<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMetricInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EcosystemError::input("population has 3 entries, expected 4");
        assert_eq!(err.to_string(), "Invalid input: population has 3 entries, expected 4");
    }

    #[test]
    fn test_variants_are_distinct() {
        assert!(matches!(EcosystemError::metric("x"), EcosystemError::InvalidMetricInput(_)));
        assert_ne!(EcosystemError::integration("x"), EcosystemError::configuration("x"));
    }
}
