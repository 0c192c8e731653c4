use thiserror::Error;

/// Typed result surface for every core operation. `NotFound`, `Forbidden`
/// and `Validation` propagate verbatim for the caller to render; `Conflict`
/// means bounded optimistic retries were exhausted and the whole operation
/// may be retried by the caller.
#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Concurrent update conflict after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
