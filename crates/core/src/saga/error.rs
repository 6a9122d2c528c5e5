//! Saga error types.

use thiserror::Error;
use trellis_shared::types::SagaId;

use super::types::SagaStatus;

/// Error returned by a step's forward or compensating action.
///
/// The transient/fatal split drives the retry policy: transient failures
/// (timeouts, lock contention, downstream outages) are retried with backoff;
/// fatal failures (validation errors, business blocks) are not.
#[derive(Debug, Error)]
pub enum StepError {
    /// Retrying may succeed.
    #[error("Transient step failure: {0}")]
    Transient(String),

    /// Retrying cannot succeed; the saga must compensate.
    #[error("Fatal step failure: {0}")]
    Fatal(String),
}

impl StepError {
    /// Returns true if the retry policy applies to this failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors raised by the saga engine itself.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A status transition not permitted by the state machine.
    #[error("Invalid saga transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: SagaStatus,
        /// Requested status.
        to: SagaStatus,
    },

    /// Saga instance not found.
    #[error("Saga not found: {0}")]
    NotFound(SagaId),

    /// The saga is already in a terminal status.
    #[error("Saga {saga_id} is already terminal ({status})")]
    AlreadyTerminal {
        /// The saga.
        saga_id: SagaId,
        /// Its terminal status.
        status: SagaStatus,
    },

    /// No step definitions registered for the saga's kind.
    #[error("No saga definition registered for kind '{0}'")]
    UnknownKind(String),

    /// The saga store failed.
    #[error("Saga store error: {0}")]
    Store(String),
}

impl SagaError {
    /// Returns the stable error code for structured reporting.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "SAGA_INVALID_TRANSITION",
            Self::NotFound(_) => "SAGA_NOT_FOUND",
            Self::AlreadyTerminal { .. } => "SAGA_ALREADY_TERMINAL",
            Self::UnknownKind(_) => "SAGA_UNKNOWN_KIND",
            Self::Store(_) => "SAGA_STORE_ERROR",
        }
    }
}
