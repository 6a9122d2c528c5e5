//! Period error types.

use chrono::NaiveDate;
use thiserror::Error;
use trellis_shared::types::AccountingPeriodId;

/// Errors that can occur during period operations.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// No period covers the given date.
    #[error("No accounting period found for date {0}")]
    NotFound(NaiveDate),

    /// The period covering the date is closed.
    #[error("Accounting period {period_id} is closed, no posting allowed for {date}")]
    Closed {
        /// The closed period.
        period_id: AccountingPeriodId,
        /// The date that was gated.
        date: NaiveDate,
    },

    /// A candidate range overlaps an existing period.
    #[error("Period range {start_date}..{end_date} overlaps existing period {period_id}")]
    Overlap {
        /// The existing period that clashes.
        period_id: AccountingPeriodId,
        /// Candidate start date.
        start_date: NaiveDate,
        /// Candidate end date.
        end_date: NaiveDate,
    },

    /// End date precedes start date.
    #[error("Invalid period range: {start_date}..{end_date}")]
    InvalidRange {
        /// Candidate start date.
        start_date: NaiveDate,
        /// Candidate end date.
        end_date: NaiveDate,
    },

    /// The period is already closed.
    #[error("Period {0} is already closed")]
    AlreadyClosed(AccountingPeriodId),

    /// The period is already open.
    #[error("Period {0} is already open")]
    AlreadyOpen(AccountingPeriodId),

    /// Reopening requires a non-empty audit reason.
    #[error("Reopening a period requires a reason")]
    ReopenReasonRequired,

    /// Period row not found by id.
    #[error("Accounting period not found: {0}")]
    PeriodMissing(AccountingPeriodId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl PeriodError {
    /// Returns the stable error code for structured reporting.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "PERIOD_NOT_FOUND",
            Self::Closed { .. } => "PERIOD_CLOSED",
            Self::Overlap { .. } => "PERIOD_OVERLAP",
            Self::InvalidRange { .. } => "PERIOD_INVALID_RANGE",
            Self::AlreadyClosed(_) => "PERIOD_ALREADY_CLOSED",
            Self::AlreadyOpen(_) => "PERIOD_ALREADY_OPEN",
            Self::ReopenReasonRequired => "REOPEN_REASON_REQUIRED",
            Self::PeriodMissing(_) => "PERIOD_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(PeriodError::NotFound(date).error_code(), "PERIOD_NOT_FOUND");
        assert_eq!(
            PeriodError::Closed {
                period_id: AccountingPeriodId::new(),
                date,
            }
            .error_code(),
            "PERIOD_CLOSED"
        );
        assert_eq!(
            PeriodError::ReopenReasonRequired.error_code(),
            "REOPEN_REASON_REQUIRED"
        );
    }
}
