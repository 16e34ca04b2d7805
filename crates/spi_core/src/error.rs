use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpiError {
    /// Parameter set violates a distribution invariant (omega not symmetric / not PD,
    /// centred parameters outside the admissible region).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or inconsistent inputs to fit, sample or divergence calls.
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Draw budget exhausted after {budget} attempts ({accepted} accepted)")]
    ResourceExhausted { budget: usize, accepted: usize },

    /// Caller broke a precondition of an evaluation (duplicate ranking keys, unsampled target).
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

impl SpiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SpiError::Validation(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        SpiError::Argument(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        SpiError::Precondition(msg.into())
    }

    /// Grid construction filters these out instead of reporting them.
    pub fn is_validation(&self) -> bool {
        matches!(self, SpiError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, SpiError>;
