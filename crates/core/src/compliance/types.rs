//! Compliance rule types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trellis_shared::types::ComplianceRuleId;

/// Category of compliance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Late fee caps and grace periods.
    LateFee,
    /// Security deposit caps and return deadlines.
    SecurityDeposit,
    /// Notice periods (entry, termination).
    NoticePeriod,
}

impl RuleCategory {
    /// Returns the category as a stable string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LateFee => "late_fee",
            Self::SecurityDeposit => "security_deposit",
            Self::NoticePeriod => "notice_period",
        }
    }
}

/// The jurisdiction a rule applies to, or a property sits in.
///
/// `state` and `city` are normalized uppercase/lowercase-insensitive codes
/// (e.g. "NC", "charlotte"). A rule with neither is a federal default; with
/// only `state` it is state-wide; with both it is city-specific.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    /// Two-letter state code.
    pub state: Option<String>,
    /// City name within the state.
    pub city: Option<String>,
}

impl Jurisdiction {
    /// Federal scope (no state, no city).
    #[must_use]
    pub fn federal() -> Self {
        Self::default()
    }

    /// State-wide scope.
    #[must_use]
    pub fn state(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            city: None,
        }
    }

    /// City scope within a state.
    #[must_use]
    pub fn city(state: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
            city: Some(city.into()),
        }
    }

    /// Specificity rank: city (2) beats state (1) beats federal (0).
    #[must_use]
    pub fn specificity(&self) -> u8 {
        match (&self.state, &self.city) {
            (Some(_), Some(_)) => 2,
            (Some(_), None) => 1,
            _ => 0,
        }
    }

    fn eq_fold(a: Option<&String>, b: Option<&String>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Returns true if a rule in `self`'s scope applies to a property in
    /// `location`: federal applies everywhere, state-wide applies to the
    /// whole state, city rules only to that city.
    #[must_use]
    pub fn applies_to(&self, location: &Self) -> bool {
        match self.specificity() {
            0 => true,
            1 => Self::eq_fold(self.state.as_ref(), location.state.as_ref()),
            _ => {
                Self::eq_fold(self.state.as_ref(), location.state.as_ref())
                    && Self::eq_fold(self.city.as_ref(), location.city.as_ref())
            }
        }
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.state, &self.city) {
            (Some(state), Some(city)) => write!(f, "{city}, {state}"),
            (Some(state), None) => write!(f, "{state}"),
            _ => write!(f, "federal"),
        }
    }
}

/// How a late fee is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LateFeeType {
    /// Lesser of a percentage of rent and a flat cap.
    LesserOf,
    /// Jurisdiction caps at a "reasonable" amount; percentage used if set.
    Reasonable,
    /// A flat cap.
    Flat,
}

/// Typed parameter bundle per rule category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RuleParameters {
    /// Late fee parameters.
    LateFee {
        /// How the fee is bounded.
        fee_type: LateFeeType,
        /// Percentage cap (e.g. 5 means 5% of rent).
        max_percentage: Option<Decimal>,
        /// Flat cap.
        max_flat_amount: Option<Decimal>,
        /// Days after the due date before a fee may be assessed.
        grace_period_days: Option<u32>,
        /// Whether fees may stack across months.
        stacking_allowed: bool,
    },
    /// Security deposit parameters.
    SecurityDeposit {
        /// Deposit cap as a multiple of monthly rent.
        max_months_rent: Option<Decimal>,
        /// Days after move-out the deposit must be returned within.
        return_deadline_days: u32,
        /// Whether deposit interest must be paid.
        interest_required: bool,
    },
    /// Notice period parameters.
    NoticePeriod {
        /// Required notice, in days.
        days: u32,
    },
}

impl RuleParameters {
    /// Returns the category this parameter bundle belongs to.
    #[must_use]
    pub fn category(&self) -> RuleCategory {
        match self {
            Self::LateFee { .. } => RuleCategory::LateFee,
            Self::SecurityDeposit { .. } => RuleCategory::SecurityDeposit,
            Self::NoticePeriod { .. } => RuleCategory::NoticePeriod,
        }
    }
}

/// A versioned jurisdiction rule.
///
/// Rules are never mutated in place: a change is a new row with a new
/// effective date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRule {
    /// Unique identifier.
    pub id: ComplianceRuleId,
    /// Rule category.
    pub category: RuleCategory,
    /// The scope this rule applies to.
    pub jurisdiction: Jurisdiction,
    /// Typed parameters.
    pub parameters: RuleParameters,
    /// First date the rule is effective (inclusive).
    pub effective_from: NaiveDate,
    /// Last date the rule is effective (inclusive), open-ended if `None`.
    pub effective_to: Option<NaiveDate>,
}

impl ComplianceRule {
    /// Returns true if this rule is effective on the given date.
    #[must_use]
    pub fn effective_on(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date <= to)
    }
}
