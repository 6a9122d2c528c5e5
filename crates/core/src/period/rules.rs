//! Period gating, overlap, reversal dating, and generation rules.

use chrono::NaiveDate;
use trellis_shared::types::OrganizationId;

use super::error::PeriodError;
use super::types::{AccountingPeriod, PeriodStatus};

/// Finds the period containing `date` among an organization's periods.
///
/// # Errors
///
/// Returns `PeriodError::NotFound` if no period covers the date.
pub fn find_period(
    periods: &[AccountingPeriod],
    date: NaiveDate,
) -> Result<&AccountingPeriod, PeriodError> {
    periods
        .iter()
        .find(|p| p.contains_date(date))
        .ok_or(PeriodError::NotFound(date))
}

/// The single gate every posting flows through: the date must fall inside
/// an open period.
///
/// # Errors
///
/// Returns `PeriodError::NotFound` if no period covers the date, and
/// `PeriodError::Closed` if the covering period is closed.
pub fn ensure_open(
    periods: &[AccountingPeriod],
    date: NaiveDate,
) -> Result<&AccountingPeriod, PeriodError> {
    let period = find_period(periods, date)?;
    if !period.is_open() {
        return Err(PeriodError::Closed {
            period_id: period.id,
            date,
        });
    }
    Ok(period)
}

/// Validates that a candidate range does not overlap any existing period.
///
/// # Errors
///
/// Returns `PeriodError::InvalidRange` if the range is inverted, and
/// `PeriodError::Overlap` naming the clashing period otherwise.
pub fn validate_no_overlap(
    existing: &[AccountingPeriod],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<(), PeriodError> {
    if end_date < start_date {
        return Err(PeriodError::InvalidRange {
            start_date,
            end_date,
        });
    }
    if let Some(clash) = existing
        .iter()
        .find(|p| p.start_date <= end_date && start_date <= p.end_date)
    {
        return Err(PeriodError::Overlap {
            period_id: clash.id,
            start_date,
            end_date,
        });
    }
    Ok(())
}

/// Computes the date a reversal must be posted under.
///
/// If the original entry's period is still open, the reversal carries the
/// original date so the period nets to zero in place. Once the period has
/// closed, history is immutable and the reversal is dated today.
#[must_use]
pub fn reversal_date(
    original_date: NaiveDate,
    original_period_status: PeriodStatus,
    today: NaiveDate,
) -> NaiveDate {
    match original_period_status {
        PeriodStatus::Open => original_date,
        PeriodStatus::Closed => today,
    }
}

/// Generates twelve contiguous monthly periods for a calendar year.
///
/// The caller persists them; creation still goes through the overlap check
/// against whatever already exists.
#[must_use]
pub fn generate_monthly_periods(
    organization_id: OrganizationId,
    year: i32,
) -> Vec<AccountingPeriod> {
    (1..=12u32)
        .map(|month| {
            let start_date = NaiveDate::from_ymd_opt(year, month, 1)
                .expect("month in 1..=12 is always valid");
            let end_date = last_day_of_month(year, month);
            AccountingPeriod {
                id: trellis_shared::types::AccountingPeriodId::new(),
                organization_id,
                name: format!("{} {year}", month_name(month)),
                start_date,
                end_date,
                status: PeriodStatus::Open,
                closed_at: None,
                closed_by: None,
                reopened_at: None,
                reopened_by: None,
                reopen_reason: None,
            }
        })
        .collect()
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("month in 1..=12 is always valid")
        .pred_opt()
        .expect("first of month always has a predecessor")
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}
