//! Saga status transition rules.
//!
//! The legal transitions are:
//! - `Running → Completed` (all forward steps succeeded)
//! - `Running → Compensating` (a step exhausted its retries or failed fatally)
//! - `Compensating → Failed` (all compensations succeeded)
//! - `Compensating → CompensationFailed` (a compensation failed; terminal)
//!
//! Terminal statuses accept no further transitions.

use super::error::SagaError;
use super::types::SagaStatus;

/// Returns true if `from → to` is a legal status transition.
#[must_use]
pub fn can_transition(from: SagaStatus, to: SagaStatus) -> bool {
    matches!(
        (from, to),
        (SagaStatus::Running, SagaStatus::Completed)
            | (SagaStatus::Running, SagaStatus::Compensating)
            | (SagaStatus::Compensating, SagaStatus::Failed)
            | (SagaStatus::Compensating, SagaStatus::CompensationFailed)
    )
}

/// Validates a status transition.
///
/// # Errors
///
/// Returns `SagaError::InvalidTransition` for any transition not listed in
/// the module docs.
pub fn transition(from: SagaStatus, to: SagaStatus) -> Result<SagaStatus, SagaError> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(SagaError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SagaStatus::Running, SagaStatus::Completed)]
    #[case(SagaStatus::Running, SagaStatus::Compensating)]
    #[case(SagaStatus::Compensating, SagaStatus::Failed)]
    #[case(SagaStatus::Compensating, SagaStatus::CompensationFailed)]
    fn test_legal_transitions(#[case] from: SagaStatus, #[case] to: SagaStatus) {
        assert_eq!(transition(from, to).unwrap(), to);
    }

    #[rstest]
    #[case(SagaStatus::Running, SagaStatus::Failed)]
    #[case(SagaStatus::Running, SagaStatus::CompensationFailed)]
    #[case(SagaStatus::Compensating, SagaStatus::Completed)]
    #[case(SagaStatus::Compensating, SagaStatus::Running)]
    #[case(SagaStatus::Completed, SagaStatus::Running)]
    #[case(SagaStatus::Failed, SagaStatus::Compensating)]
    #[case(SagaStatus::CompensationFailed, SagaStatus::Failed)]
    fn test_illegal_transitions(#[case] from: SagaStatus, #[case] to: SagaStatus) {
        assert!(matches!(
            transition(from, to),
            Err(SagaError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_statuses_accept_nothing() {
        for terminal in [
            SagaStatus::Completed,
            SagaStatus::Failed,
            SagaStatus::CompensationFailed,
        ] {
            for to in [
                SagaStatus::Running,
                SagaStatus::Compensating,
                SagaStatus::Completed,
                SagaStatus::Failed,
                SagaStatus::CompensationFailed,
            ] {
                assert!(!can_transition(terminal, to));
            }
        }
    }
}
