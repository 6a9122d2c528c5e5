//! The distributable-funds calculation.

use rust_decimal::Decimal;
use trellis_shared::types::Money;

use super::types::{
    BatchDistribution, BlockedReason, DistributionDecision, DistributionOutcome, PropertyFunds,
};

/// Computes the distributable figure for one property:
///
/// `max(0, settled_cash - reserve - pending_bills - trust_liabilities)`
///
/// Unsettled inflows are already excluded by `settled_cash`. When the raw
/// figure is negative the property is reported blocked with the shortfall;
/// the distributable amount is floored at zero either way, never presented
/// as a negative or missing value.
#[must_use]
pub fn compute_distributable(funds: &PropertyFunds) -> DistributionOutcome {
    let raw = funds.settled_cash()
        - funds.reserve_minimum
        - funds.pending_bills
        - funds.trust_liabilities;

    let mut blocked_reasons = Vec::new();
    if raw < Decimal::ZERO {
        blocked_reasons.push(BlockedReason::WouldGoNegative {
            property_id: funds.property_id,
            shortfall: -raw,
        });
    }

    DistributionOutcome {
        property_id: funds.property_id,
        distributable: Money::new(raw.max(Decimal::ZERO), funds.currency),
        blocked_reasons,
    }
}

/// Decides a concrete distribution request against the distributable figure.
///
/// A request above the figure is blocked with `INSUFFICIENT_FUNDS` naming
/// both amounts; this is a structured business outcome the caller renders,
/// not an error path.
#[must_use]
pub fn request_distribution(funds: &PropertyFunds, requested: Decimal) -> DistributionDecision {
    let outcome = compute_distributable(funds);
    if let Some(reason) = outcome.blocked_reasons.into_iter().next() {
        return DistributionDecision::Blocked { reason };
    }
    if requested > outcome.distributable.amount {
        return DistributionDecision::Blocked {
            reason: BlockedReason::InsufficientFunds {
                property_id: funds.property_id,
                requested,
                available: outcome.distributable.amount,
            },
        };
    }
    DistributionDecision::Approved {
        amount: Money::new(requested, funds.currency),
    }
}

/// Runs a multi-property distribution.
///
/// Each property distributes its full distributable figure. Properties that
/// would go negative are excluded and named in `blocked` while the rest
/// proceed; failure is partial, not all-or-nothing.
#[must_use]
pub fn compute_batch(properties: &[PropertyFunds]) -> BatchDistribution {
    let mut approved = Vec::new();
    let mut blocked = Vec::new();

    for funds in properties {
        let outcome = compute_distributable(funds);
        if outcome.blocked_reasons.is_empty() {
            if !outcome.distributable.is_zero() {
                approved.push((funds.property_id, outcome.distributable));
            }
        } else {
            blocked.extend(outcome.blocked_reasons);
        }
    }

    BatchDistribution { approved, blocked }
}
