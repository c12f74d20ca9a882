//! Error kinds shared by the engine and the request layer.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Unknown reminder identity.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed or semantically invalid input. Never clamped.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Another writer changed the reminder between read and commit.
    #[error("concurrent update of {0}")]
    ConcurrencyConflict(String),
}

impl CoreError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
