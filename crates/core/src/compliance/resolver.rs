//! Jurisdiction rule resolution.

use chrono::NaiveDate;

use super::error::ComplianceError;
use super::types::{ComplianceRule, Jurisdiction, RuleCategory, RuleParameters};

/// Resolves the rule parameters governing `category` at `location` on
/// `as_of`.
///
/// Resolution order is most specific first: a city rule wins over a state
/// rule, which wins over a federal default. Within one specificity tier the
/// most recently effective rule wins. If nothing matches anywhere the lookup
/// fails; rule values are never silently defaulted from constants.
///
/// # Errors
///
/// Returns `ComplianceError::RuleNotFound` when no effective rule applies.
pub fn resolve(
    category: RuleCategory,
    location: &Jurisdiction,
    as_of: NaiveDate,
    rules: &[ComplianceRule],
) -> Result<RuleParameters, ComplianceError> {
    let candidates = rules.iter().filter(|r| {
        r.category == category
            && r.parameters.category() == category
            && r.effective_on(as_of)
            && r.jurisdiction.applies_to(location)
    });

    candidates
        .max_by_key(|r| (r.jurisdiction.specificity(), r.effective_from))
        .map(|r| r.parameters.clone())
        .ok_or_else(|| ComplianceError::RuleNotFound {
            category,
            jurisdiction: location.to_string(),
            as_of,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::types::LateFeeType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use trellis_shared::types::ComplianceRuleId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn late_fee_rule(
        jurisdiction: Jurisdiction,
        max_flat: Decimal,
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> ComplianceRule {
        ComplianceRule {
            id: ComplianceRuleId::new(),
            category: RuleCategory::LateFee,
            jurisdiction,
            parameters: RuleParameters::LateFee {
                fee_type: LateFeeType::LesserOf,
                max_percentage: Some(dec!(5)),
                max_flat_amount: Some(max_flat),
                grace_period_days: Some(5),
                stacking_allowed: false,
            },
            effective_from: from,
            effective_to: to,
        }
    }

    fn deposit_rule(jurisdiction: Jurisdiction) -> ComplianceRule {
        ComplianceRule {
            id: ComplianceRuleId::new(),
            category: RuleCategory::SecurityDeposit,
            jurisdiction,
            parameters: RuleParameters::SecurityDeposit {
                max_months_rent: Some(dec!(2)),
                return_deadline_days: 30,
                interest_required: false,
            },
            effective_from: date(2020, 1, 1),
            effective_to: None,
        }
    }

    #[test]
    fn test_city_beats_state_beats_federal() {
        let rules = vec![
            late_fee_rule(Jurisdiction::federal(), dec!(50), date(2020, 1, 1), None),
            late_fee_rule(Jurisdiction::state("NC"), dec!(15), date(2020, 1, 1), None),
            late_fee_rule(
                Jurisdiction::city("NC", "Charlotte"),
                dec!(10),
                date(2020, 1, 1),
                None,
            ),
        ];

        let charlotte = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::city("NC", "Charlotte"),
            date(2026, 3, 1),
            &rules,
        )
        .unwrap();
        assert!(
            matches!(charlotte, RuleParameters::LateFee { max_flat_amount: Some(f), .. } if f == dec!(10))
        );

        let raleigh = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::city("NC", "Raleigh"),
            date(2026, 3, 1),
            &rules,
        )
        .unwrap();
        assert!(
            matches!(raleigh, RuleParameters::LateFee { max_flat_amount: Some(f), .. } if f == dec!(15))
        );

        let texas = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::city("TX", "Austin"),
            date(2026, 3, 1),
            &rules,
        )
        .unwrap();
        assert!(
            matches!(texas, RuleParameters::LateFee { max_flat_amount: Some(f), .. } if f == dec!(50))
        );
    }

    #[test]
    fn test_no_match_fails_instead_of_defaulting() {
        let rules = vec![late_fee_rule(
            Jurisdiction::state("NC"),
            dec!(15),
            date(2020, 1, 1),
            None,
        )];

        let result = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::state("TX"),
            date(2026, 3, 1),
            &rules,
        );
        assert!(matches!(result, Err(ComplianceError::RuleNotFound { .. })));
    }

    #[test]
    fn test_effective_date_versioning() {
        // Old NC rule capped at 15, superseded by 20 from 2026-01-01.
        let rules = vec![
            late_fee_rule(
                Jurisdiction::state("NC"),
                dec!(15),
                date(2020, 1, 1),
                Some(date(2025, 12, 31)),
            ),
            late_fee_rule(Jurisdiction::state("NC"), dec!(20), date(2026, 1, 1), None),
        ];

        let before = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::state("NC"),
            date(2025, 6, 1),
            &rules,
        )
        .unwrap();
        assert!(
            matches!(before, RuleParameters::LateFee { max_flat_amount: Some(f), .. } if f == dec!(15))
        );

        let after = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::state("NC"),
            date(2026, 6, 1),
            &rules,
        )
        .unwrap();
        assert!(
            matches!(after, RuleParameters::LateFee { max_flat_amount: Some(f), .. } if f == dec!(20))
        );
    }

    #[test]
    fn test_latest_effective_wins_within_tier() {
        let rules = vec![
            late_fee_rule(Jurisdiction::state("NC"), dec!(15), date(2020, 1, 1), None),
            late_fee_rule(Jurisdiction::state("NC"), dec!(18), date(2024, 1, 1), None),
        ];

        let resolved = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::state("NC"),
            date(2026, 3, 1),
            &rules,
        )
        .unwrap();
        assert!(
            matches!(resolved, RuleParameters::LateFee { max_flat_amount: Some(f), .. } if f == dec!(18))
        );
    }

    #[test]
    fn test_category_filter() {
        let rules = vec![
            late_fee_rule(Jurisdiction::state("NC"), dec!(15), date(2020, 1, 1), None),
            deposit_rule(Jurisdiction::state("NC")),
        ];

        let resolved = resolve(
            RuleCategory::SecurityDeposit,
            &Jurisdiction::city("NC", "Charlotte"),
            date(2026, 3, 1),
            &rules,
        )
        .unwrap();
        assert!(matches!(resolved, RuleParameters::SecurityDeposit { .. }));
    }

    #[test]
    fn test_expired_rule_not_resolved() {
        let rules = vec![late_fee_rule(
            Jurisdiction::state("NC"),
            dec!(15),
            date(2020, 1, 1),
            Some(date(2024, 12, 31)),
        )];

        let result = resolve(
            RuleCategory::LateFee,
            &Jurisdiction::state("NC"),
            date(2026, 3, 1),
            &rules,
        );
        assert!(matches!(result, Err(ComplianceError::RuleNotFound { .. })));
    }
}
