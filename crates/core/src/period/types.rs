//! Accounting period types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use trellis_shared::types::{AccountingPeriodId, OrganizationId, UserId};

/// Status of an accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Period is open for postings.
    Open,
    /// Period is closed; no new postings allowed.
    Closed,
}

/// An accounting period: a non-overlapping date range per organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier.
    pub id: AccountingPeriodId,
    /// Organization this period belongs to.
    pub organization_id: OrganizationId,
    /// Period name (e.g., "March 2026").
    pub name: String,
    /// First date of the period (inclusive).
    pub start_date: NaiveDate,
    /// Last date of the period (inclusive).
    pub end_date: NaiveDate,
    /// Current status.
    pub status: PeriodStatus,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed the period.
    pub closed_by: Option<UserId>,
    /// When the period was last reopened, if ever.
    pub reopened_at: Option<DateTime<Utc>>,
    /// Who reopened the period.
    pub reopened_by: Option<UserId>,
    /// The audit reason given for reopening.
    pub reopen_reason: Option<String>,
}

impl AccountingPeriod {
    /// Returns true if postings may be recorded in this period.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Returns true if this period's range overlaps another's.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(start: (i32, u32, u32), end: (i32, u32, u32)) -> AccountingPeriod {
        AccountingPeriod {
            id: AccountingPeriodId::new(),
            organization_id: OrganizationId::new(),
            name: "test".to_string(),
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            status: PeriodStatus::Open,
            closed_at: None,
            closed_by: None,
            reopened_at: None,
            reopened_by: None,
            reopen_reason: None,
        }
    }

    #[test]
    fn test_contains_date_inclusive_bounds() {
        let p = period((2026, 3, 1), (2026, 3, 31));
        assert!(p.contains_date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()));
        assert!(p.contains_date(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert!(!p.contains_date(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()));
        assert!(!p.contains_date(NaiveDate::from_ymd_opt(2026, 2, 28).unwrap()));
    }

    #[test]
    fn test_overlap_detection() {
        let march = period((2026, 3, 1), (2026, 3, 31));
        let april = period((2026, 4, 1), (2026, 4, 30));
        let mid = period((2026, 3, 15), (2026, 4, 15));

        assert!(!march.overlaps(&april));
        assert!(!april.overlaps(&march));
        assert!(march.overlaps(&mid));
        assert!(april.overlaps(&mid));
        assert!(march.overlaps(&march));
    }
}
