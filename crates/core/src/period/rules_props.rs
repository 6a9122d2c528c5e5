//! Property tests for period gating rules.

use chrono::NaiveDate;
use proptest::prelude::*;
use trellis_shared::types::OrganizationId;

use super::rules::{ensure_open, generate_monthly_periods, reversal_date, validate_no_overlap};
use super::types::PeriodStatus;

fn day_strategy() -> impl Strategy<Value = NaiveDate> {
    (2024i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every date in a generated year is covered by exactly one period.
    #[test]
    fn prop_generated_year_covers_every_date(
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let periods = generate_monthly_periods(OrganizationId::new(), 2026);
        let date = NaiveDate::from_ymd_opt(2026, month, day).unwrap();

        let covering = periods.iter().filter(|p| p.contains_date(date)).count();
        prop_assert_eq!(covering, 1, "each date must be covered exactly once");
        prop_assert!(ensure_open(&periods, date).is_ok());
    }

    /// No pair of generated periods passes the overlap check against each
    /// other reversed: generation and validation agree.
    #[test]
    fn prop_generated_periods_never_overlap(_seed in 0u8..1) {
        let periods = generate_monthly_periods(OrganizationId::new(), 2027);
        for (i, a) in periods.iter().enumerate() {
            for b in periods.iter().skip(i + 1) {
                prop_assert!(!a.overlaps(b));
            }
        }
    }

    /// A range overlapping any existing period is rejected; a range in a
    /// gap is accepted.
    #[test]
    fn prop_overlap_check_matches_pairwise_test(
        start in day_strategy(),
        len in 0i64..120,
    ) {
        let end = start + chrono::Duration::days(len);
        let periods = generate_monthly_periods(OrganizationId::new(), 2026);

        let collides = periods.iter().any(|p| p.start_date <= end && start <= p.end_date);
        let result = validate_no_overlap(&periods, start, end);
        prop_assert_eq!(result.is_err(), collides);
    }

    /// The reversal date is always the original date for open periods and
    /// always today for closed periods, never anything else.
    #[test]
    fn prop_reversal_date_is_binary(
        original in day_strategy(),
        today in day_strategy(),
    ) {
        prop_assert_eq!(reversal_date(original, PeriodStatus::Open, today), original);
        prop_assert_eq!(reversal_date(original, PeriodStatus::Closed, today), today);
    }
}
