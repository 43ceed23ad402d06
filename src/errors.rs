//! Error taxonomy shared by the engine and its collaborators.

use crate::game::types::RoundStatus;
use thiserror::Error;

/// Library-wide result alias
pub type CrashiqResult<T> = Result<T, GameError>;

/// Errors surfaced by engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    /// Malformed or out-of-range caller input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation is not valid for the round's current status
    #[error("round {round_id} is {status}")]
    InvalidRoundState { round_id: String, status: RoundStatus },

    /// One non-terminal bet per round and user
    #[error("user {user_id} already has a bet on round {round_id}")]
    AlreadyBetThisRound { round_id: String, user_id: String },

    /// Item missing from the user's available inventory
    #[error("item {item_id} is not available for user {user_id}")]
    ItemUnavailable { user_id: String, item_id: String },

    /// The race against the round clock was lost
    #[error("too late: {0}")]
    TooLate(String),

    /// A store write failed; retried with backoff before surfacing
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl GameError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        GameError::InvalidInput(message.into())
    }

    pub fn too_late(message: impl Into<String>) -> Self {
        GameError::TooLate(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        GameError::PersistenceFailure(message.into())
    }

    /// Only persistence failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::PersistenceFailure(_))
    }
}
