//! Error type shared by every stage of the restoration pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdmmError>;

/// Failures surfaced to the caller. The pipeline is deterministic, so nothing here is retried.
#[derive(Debug, Error)]
pub enum AdmmError {
    /// Kernel, image, spectrum or batch dimensions do not agree.
    #[error("shape error: {0}")]
    Shape(String),
    /// A value outside the documented domain, e.g. a non-positive alpha.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The weight source produced a weight that is not strictly positive.
    #[error("non-positive penalty weight {value} at sample {sample}, iteration {iteration}")]
    NonPositiveWeight {
        sample: usize,
        iteration: usize,
        value: f64,
    },
    /// NaN or infinity found in an iterate.
    #[error("non-finite values in {stage} at iteration {iteration}")]
    NonFinite { stage: &'static str, iteration: usize },
    #[error("config error: {0}")]
    Config(String),
}

pub fn shape(m: impl Into<String>) -> AdmmError {
    AdmmError::Shape(m.into())
}

pub fn invalid(m: impl Into<String>) -> AdmmError {
    AdmmError::InvalidInput(m.into())
}
