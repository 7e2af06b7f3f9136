use thiserror::Error;

/// Errors raised while building or running the forecaster.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TftError {
    /// A capability that the model does not implement, such as categorical
    /// variables.
    #[error("{0} not yet supported")]
    Unsupported(String),

    /// Hyper-parameters that cannot produce a valid model.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A tensor required by the variable groups was not supplied.
    #[error("missing input tensor: {0}")]
    MissingInput(&'static str),

    /// A tensor dimension disagrees with the one fixed at construction.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Rollout parameters outside the supported range.
    #[error("invalid rollout: {0}")]
    InvalidRollout(String),
}

pub type Result<T> = std::result::Result<T, TftError>;

impl TftError {
    pub(crate) fn check_dim(what: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(TftError::DimensionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}
