//! Distribution types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trellis_shared::types::{Money, PropertyId};
use trellis_shared::types::money::Currency;

/// The funds picture for one property, assembled from ledger balances and
/// configuration by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyFunds {
    /// The property.
    pub property_id: PropertyId,
    /// Currency all amounts are denominated in.
    pub currency: Currency,
    /// The property's cash account balance.
    pub cash_balance: Decimal,
    /// Inflows not yet settled (e.g. ACH in flight). Excluded from
    /// distributable cash until they clear.
    pub pending_inflows: Decimal,
    /// Configured reserve minimum that must stay in the account.
    pub reserve_minimum: Decimal,
    /// Sum of known open bills.
    pub pending_bills: Decimal,
    /// Trust-restricted liability balances (security deposits held, prepaid
    /// rent). Never distributable.
    pub trust_liabilities: Decimal,
}

impl PropertyFunds {
    /// Cash that has actually cleared.
    #[must_use]
    pub fn settled_cash(&self) -> Decimal {
        self.cash_balance - self.pending_inflows
    }
}

/// Why a property was blocked from a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockedReason {
    /// Obligations exceed settled cash; distributing anything would dip
    /// into reserves or trust funds.
    WouldGoNegative {
        /// The blocked property.
        property_id: PropertyId,
        /// How far under water the property is.
        shortfall: Decimal,
    },
    /// The requested amount exceeds the distributable figure.
    InsufficientFunds {
        /// The blocked property.
        property_id: PropertyId,
        /// The amount requested.
        requested: Decimal,
        /// The amount actually available.
        available: Decimal,
    },
}

impl BlockedReason {
    /// Returns the stable code for structured reporting.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::WouldGoNegative { .. } => "DISTRIBUTION_BLOCKED",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
        }
    }
}

/// The distributable figure for one property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionOutcome {
    /// The property.
    pub property_id: PropertyId,
    /// Cash the owner may receive. Never negative.
    pub distributable: Money,
    /// Reasons the figure is zero or reduced, if any.
    pub blocked_reasons: Vec<BlockedReason>,
}

/// Decision on a concrete distribution request.
///
/// A refusal is an expected business outcome, not a system error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DistributionDecision {
    /// The request can proceed.
    Approved {
        /// The amount to distribute.
        amount: Money,
    },
    /// The request is blocked.
    Blocked {
        /// Why.
        reason: BlockedReason,
    },
}

/// Result of a multi-property distribution run.
///
/// Failure is partial: blocked properties are named while the rest proceed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDistribution {
    /// Properties approved for distribution, with their amounts.
    pub approved: Vec<(PropertyId, Money)>,
    /// Properties excluded from the batch.
    pub blocked: Vec<BlockedReason>,
}
