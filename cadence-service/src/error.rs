//! Errors surfaced by the request layer.

use cadence_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A conflict that survived the retry.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(CoreError::NotFound(_)))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Core(CoreError::InvalidInput(_)))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Core(CoreError::ConcurrencyConflict(_)))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
