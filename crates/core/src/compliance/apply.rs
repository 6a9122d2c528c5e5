//! Applying resolved rule parameters to amounts.
//!
//! The resolver only looks parameters up; the arithmetic lives here. Fee
//! amounts use Banker's Rounding to two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

use super::error::ComplianceError;
use super::types::{LateFeeType, RuleCategory, RuleParameters};

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Computes the late fee allowed for a rent amount, `days_late` past due,
/// with `prior_assessments` fees already charged for the same delinquency.
///
/// Within the grace period the fee is zero, as is any repeat assessment
/// where the jurisdiction forbids stacking. Beyond that:
/// - `lesser_of`: min(percentage of rent, flat cap)
/// - `flat`: the flat cap
/// - `reasonable`: percentage of rent if configured, else the flat cap
///
/// # Errors
///
/// Returns `CategoryMismatch` for non-late-fee parameters and
/// `MissingParameter` when the configured fee type lacks the values it
/// needs. The result is always a concrete amount, never NaN or a silent
/// default.
pub fn compute_late_fee(
    parameters: &RuleParameters,
    monthly_rent: Decimal,
    days_late: u32,
    prior_assessments: u32,
) -> Result<Decimal, ComplianceError> {
    let RuleParameters::LateFee {
        fee_type,
        max_percentage,
        max_flat_amount,
        grace_period_days,
        stacking_allowed,
    } = parameters
    else {
        return Err(ComplianceError::CategoryMismatch {
            expected: RuleCategory::LateFee,
            actual: parameters.category(),
        });
    };

    if days_late <= grace_period_days.unwrap_or(0) {
        return Ok(Decimal::ZERO);
    }
    if prior_assessments > 0 && !stacking_allowed {
        return Ok(Decimal::ZERO);
    }

    let percentage_fee = || -> Result<Decimal, ComplianceError> {
        let pct = max_percentage.ok_or(ComplianceError::MissingParameter {
            category: RuleCategory::LateFee,
            name: "max_percentage",
        })?;
        Ok(round_cents(monthly_rent * pct / Decimal::ONE_HUNDRED))
    };
    let flat_fee = || -> Result<Decimal, ComplianceError> {
        max_flat_amount.ok_or(ComplianceError::MissingParameter {
            category: RuleCategory::LateFee,
            name: "max_flat_amount",
        })
    };

    match fee_type {
        LateFeeType::LesserOf => {
            let pct = percentage_fee()?;
            let flat = flat_fee()?;
            Ok(pct.min(flat))
        }
        LateFeeType::Flat => flat_fee(),
        LateFeeType::Reasonable => {
            if max_percentage.is_some() {
                percentage_fee()
            } else {
                flat_fee()
            }
        }
    }
}

/// Validates a proposed security deposit against the jurisdiction cap.
///
/// # Errors
///
/// Returns `CategoryMismatch` for non-deposit parameters and
/// `DepositExceedsCap` when the proposal is above `max_months_rent` times
/// the monthly rent. A rule without a cap accepts any deposit.
pub fn validate_deposit(
    parameters: &RuleParameters,
    monthly_rent: Decimal,
    proposed_deposit: Decimal,
) -> Result<(), ComplianceError> {
    let RuleParameters::SecurityDeposit {
        max_months_rent, ..
    } = parameters
    else {
        return Err(ComplianceError::CategoryMismatch {
            expected: RuleCategory::SecurityDeposit,
            actual: parameters.category(),
        });
    };

    if let Some(months) = max_months_rent {
        let max_allowed = round_cents(monthly_rent * *months);
        if proposed_deposit > max_allowed {
            return Err(ComplianceError::DepositExceedsCap {
                max_allowed,
                proposed: proposed_deposit,
            });
        }
    }
    Ok(())
}

/// Returns the required notice period in days.
///
/// # Errors
///
/// Returns `CategoryMismatch` for non-notice parameters.
pub fn notice_days(parameters: &RuleParameters) -> Result<u32, ComplianceError> {
    match parameters {
        RuleParameters::NoticePeriod { days } => Ok(*days),
        other => Err(ComplianceError::CategoryMismatch {
            expected: RuleCategory::NoticePeriod,
            actual: other.category(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn nc_late_fee() -> RuleParameters {
        RuleParameters::LateFee {
            fee_type: LateFeeType::LesserOf,
            max_percentage: Some(dec!(5)),
            max_flat_amount: Some(dec!(15)),
            grace_period_days: Some(5),
            stacking_allowed: false,
        }
    }

    #[test]
    fn test_nc_lesser_of_scenario() {
        // NC: lesser of 5% and $15. For $1000 rent: min(50, 15) = 15.
        let fee = compute_late_fee(&nc_late_fee(), dec!(1000), 6, 0).unwrap();
        assert_eq!(fee, dec!(15));
    }

    #[test]
    fn test_lesser_of_picks_percentage_for_small_rent() {
        // For $200 rent: min(10, 15) = 10.
        let fee = compute_late_fee(&nc_late_fee(), dec!(200), 6, 0).unwrap();
        assert_eq!(fee, dec!(10));
    }

    #[test]
    fn test_grace_period_suppresses_fee() {
        assert_eq!(compute_late_fee(&nc_late_fee(), dec!(1000), 5, 0).unwrap(), dec!(0));
        assert_eq!(compute_late_fee(&nc_late_fee(), dec!(1000), 0, 0).unwrap(), dec!(0));
        assert_ne!(compute_late_fee(&nc_late_fee(), dec!(1000), 6, 0).unwrap(), dec!(0));
    }

    #[test]
    fn test_stacking_forbidden_suppresses_repeat_fee() {
        // NC forbids stacking: a second assessment for the same
        // delinquency is zero.
        assert_eq!(compute_late_fee(&nc_late_fee(), dec!(1000), 36, 1).unwrap(), dec!(0));
    }

    #[test]
    fn test_stacking_allowed_repeats_fee() {
        let params = RuleParameters::LateFee {
            fee_type: LateFeeType::Flat,
            max_percentage: None,
            max_flat_amount: Some(dec!(25)),
            grace_period_days: None,
            stacking_allowed: true,
        };
        assert_eq!(compute_late_fee(&params, dec!(1000), 36, 2).unwrap(), dec!(25));
    }

    #[test]
    fn test_flat_fee() {
        let params = RuleParameters::LateFee {
            fee_type: LateFeeType::Flat,
            max_percentage: None,
            max_flat_amount: Some(dec!(25)),
            grace_period_days: None,
            stacking_allowed: true,
        };
        assert_eq!(compute_late_fee(&params, dec!(1000), 1, 0).unwrap(), dec!(25));
    }

    #[test]
    fn test_reasonable_uses_percentage_when_present() {
        let params = RuleParameters::LateFee {
            fee_type: LateFeeType::Reasonable,
            max_percentage: Some(dec!(10)),
            max_flat_amount: None,
            grace_period_days: None,
            stacking_allowed: false,
        };
        assert_eq!(compute_late_fee(&params, dec!(950), 3, 0).unwrap(), dec!(95));
    }

    #[test]
    fn test_percentage_rounds_to_cents() {
        let params = RuleParameters::LateFee {
            fee_type: LateFeeType::Reasonable,
            max_percentage: Some(dec!(5)),
            max_flat_amount: None,
            grace_period_days: None,
            stacking_allowed: false,
        };
        // 5% of 1234.565 = 61.72825 → 61.73 under Banker's Rounding.
        assert_eq!(compute_late_fee(&params, dec!(1234.565), 3, 0).unwrap(), dec!(61.73));
    }

    #[test]
    fn test_missing_parameter_fails_explicitly() {
        let params = RuleParameters::LateFee {
            fee_type: LateFeeType::LesserOf,
            max_percentage: Some(dec!(5)),
            max_flat_amount: None,
            grace_period_days: None,
            stacking_allowed: false,
        };
        let result = compute_late_fee(&params, dec!(1000), 1, 0);
        assert!(matches!(
            result,
            Err(ComplianceError::MissingParameter { name: "max_flat_amount", .. })
        ));
    }

    #[test]
    fn test_category_mismatch_rejected() {
        let deposit = RuleParameters::SecurityDeposit {
            max_months_rent: Some(dec!(2)),
            return_deadline_days: 30,
            interest_required: false,
        };
        assert!(matches!(
            compute_late_fee(&deposit, dec!(1000), 10, 0),
            Err(ComplianceError::CategoryMismatch { .. })
        ));
        assert!(matches!(
            notice_days(&deposit),
            Err(ComplianceError::CategoryMismatch { .. })
        ));
    }

    #[test]
    fn test_deposit_cap() {
        let params = RuleParameters::SecurityDeposit {
            max_months_rent: Some(dec!(1.5)),
            return_deadline_days: 30,
            interest_required: false,
        };

        assert!(validate_deposit(&params, dec!(1000), dec!(1500)).is_ok());
        let result = validate_deposit(&params, dec!(1000), dec!(1500.01));
        assert!(matches!(
            result,
            Err(ComplianceError::DepositExceedsCap { max_allowed, .. }) if max_allowed == dec!(1500)
        ));
    }

    #[test]
    fn test_deposit_without_cap_accepts_any() {
        let params = RuleParameters::SecurityDeposit {
            max_months_rent: None,
            return_deadline_days: 14,
            interest_required: true,
        };
        assert!(validate_deposit(&params, dec!(1000), dec!(99999)).is_ok());
    }

    #[test]
    fn test_notice_days() {
        let params = RuleParameters::NoticePeriod { days: 30 };
        assert_eq!(notice_days(&params).unwrap(), 30);
    }
}
