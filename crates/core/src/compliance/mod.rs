//! Jurisdiction compliance rules.
//!
//! Rule values (late-fee caps, deposit caps, notice periods) originate from
//! configured data with effective-date versioning, never from constants
//! compiled into business logic. The resolver only looks parameters up;
//! applying them to amounts lives in [`apply`] so jurisdiction changes never
//! require code changes.

pub mod apply;
pub mod error;
pub mod resolver;
pub mod types;

pub use apply::{compute_late_fee, notice_days, validate_deposit};
pub use error::ComplianceError;
pub use resolver::resolve;
pub use types::{
    ComplianceRule, Jurisdiction, LateFeeType, RuleCategory, RuleParameters,
};
