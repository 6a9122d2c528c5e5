//! Compliance error types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::RuleCategory;

/// Errors that can occur during compliance resolution and application.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// No effective rule applies anywhere in the fallback chain.
    #[error("No {category:?} rule found for {jurisdiction} as of {as_of}")]
    RuleNotFound {
        /// The requested category.
        category: RuleCategory,
        /// The queried jurisdiction, rendered.
        jurisdiction: String,
        /// The as-of date queried.
        as_of: NaiveDate,
    },

    /// Parameters of the wrong category were passed to an applier.
    #[error("Expected {expected:?} parameters, got {actual:?}")]
    CategoryMismatch {
        /// The category the applier needed.
        expected: RuleCategory,
        /// The category actually supplied.
        actual: RuleCategory,
    },

    /// The configured rule is missing a parameter its fee type requires.
    #[error("{category:?} rule is missing required parameter '{name}'")]
    MissingParameter {
        /// The rule category.
        category: RuleCategory,
        /// The missing parameter name.
        name: &'static str,
    },

    /// A proposed deposit exceeds the jurisdiction cap.
    #[error("Proposed deposit {proposed} exceeds jurisdiction cap {max_allowed}")]
    DepositExceedsCap {
        /// The maximum allowed deposit.
        max_allowed: Decimal,
        /// The proposed deposit.
        proposed: Decimal,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl ComplianceError {
    /// Returns the stable error code for structured reporting.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Self::CategoryMismatch { .. } => "RULE_CATEGORY_MISMATCH",
            Self::MissingParameter { .. } => "RULE_MISSING_PARAMETER",
            Self::DepositExceedsCap { .. } => "DEPOSIT_EXCEEDS_CAP",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ComplianceError::RuleNotFound {
            category: RuleCategory::LateFee,
            jurisdiction: "Charlotte, NC".to_string(),
            as_of: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        };
        assert_eq!(err.error_code(), "RULE_NOT_FOUND");
        assert!(err.to_string().contains("Charlotte, NC"));

        assert_eq!(
            ComplianceError::DepositExceedsCap {
                max_allowed: Decimal::new(150_000, 2),
                proposed: Decimal::new(200_000, 2),
            }
            .error_code(),
            "DEPOSIT_EXCEEDS_CAP"
        );
    }
}
