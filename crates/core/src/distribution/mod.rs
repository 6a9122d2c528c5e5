//! Distribution safety calculation.
//!
//! Computes the cash an owner may actually receive for a property. This is
//! the primary defense against commingling: the calculation starts from the
//! property's own settled cash and subtracts reserves, pending obligations,
//! and trust-restricted liabilities. It never consults a "total cash"
//! figure that mixes trust and operating funds.

pub mod calculator;
pub mod types;

pub use calculator::{compute_batch, compute_distributable, request_distribution};
pub use types::{
    BatchDistribution, BlockedReason, DistributionDecision, DistributionOutcome, PropertyFunds,
};
