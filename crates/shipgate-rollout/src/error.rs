//! Rollout-block error types.

use thiserror::Error;

/// Errors surfaced by a reconciliation pass.
///
/// An override naming an inactive policy is not an error; it is corrected
/// in place (see [`crate::resolver::Resolution::InvalidOverride`]).
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("application not found: {0}")]
    ApplicationNotFound(String),

    #[error("state store error: {0}")]
    State(#[from] shipgate_state::StateError),
}

pub type RolloutResult<T> = Result<T, RolloutError>;
