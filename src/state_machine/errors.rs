use thiserror::Error;

/// Errors raised while evaluating or persisting a state transition
#[derive(Debug, Error)]
pub enum StateMachineError {
    /// The transition table has no edge for this (state, event) pair,
    /// or another actor won the compare-and-set on the status column.
    #[error("Invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Database error during transition: {0}")]
    Database(#[from] sqlx::Error),

    #[error("State machine internal error: {0}")]
    Internal(String),
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
