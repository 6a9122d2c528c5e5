//! Accounting period management.
//!
//! Periods gate every posting: an entry's date must fall inside an open
//! period. Closing is one-way under normal operation; reopening requires a
//! reason and actor and is logged for audit.

pub mod error;
pub mod rules;
pub mod types;

#[cfg(test)]
mod rules_props;

pub use error::PeriodError;
pub use rules::{
    ensure_open, find_period, generate_monthly_periods, reversal_date, validate_no_overlap,
};
pub use types::{AccountingPeriod, PeriodStatus};
