//! Ledger domain types for entry creation and validation.
//!
//! This module defines the input and resolved types used when posting
//! journal entries to the double-entry ledger.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trellis_shared::types::{AccountId, OrganizationId, UserId};

use super::entry::DimensionTags;

/// Entry type: either Debit or Credit.
///
/// In double-entry bookkeeping:
/// - Debits increase asset/expense accounts, decrease liability/equity/revenue accounts
/// - Credits decrease asset/expense accounts, increase liability/equity/revenue accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

/// Account classification in the chart of accounts.
///
/// The type of an account never changes once a posting references it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset account (cash, receivables).
    Asset,
    /// Liability account (security deposits held, prepaid rent).
    Liability,
    /// Equity account.
    Equity,
    /// Revenue account (rent income, fee income).
    Revenue,
    /// Expense account.
    Expense,
}

impl AccountType {
    /// Returns true for debit-normal accounts (Asset, Expense).
    #[must_use]
    pub fn is_debit_normal(self) -> bool {
        matches!(self, Self::Asset | Self::Expense)
    }
}

/// Information about an account needed for posting validation.
///
/// Supplied by the persistence layer through a lookup closure so the
/// validation logic stays database-free.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// The account ID.
    pub id: AccountId,
    /// The organization that owns the account.
    pub organization_id: OrganizationId,
    /// The account's classification.
    pub account_type: AccountType,
    /// Whether the account is active.
    pub is_active: bool,
}

/// Input for a single posting line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingInput {
    /// The account to post to.
    pub account_id: AccountId,
    /// Whether this is a debit or credit.
    pub entry_type: EntryType,
    /// The amount (must be positive; the sign comes from `entry_type`).
    pub amount: Decimal,
    /// Optional memo for this line.
    pub memo: Option<String>,
    /// Dimensional tags (property, unit, tenant).
    #[serde(default)]
    pub tags: DimensionTags,
}

impl PostingInput {
    /// Returns the signed amount: positive for debits, negative for credits.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => self.amount,
            EntryType::Credit => -self.amount,
        }
    }
}

/// Input for posting a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostEntryInput {
    /// The organization this entry belongs to.
    pub organization_id: OrganizationId,
    /// The business date of the entry; must fall in an open period.
    pub entry_date: NaiveDate,
    /// A description of the business event.
    pub description: String,
    /// Caller-supplied idempotency key, derived from a stable business
    /// identity (e.g. a payment intent id), never from a timestamp.
    pub idempotency_key: String,
    /// The posting lines (at least 2, summing to exactly zero).
    pub postings: Vec<PostingInput>,
    /// The user or process posting the entry.
    pub created_by: UserId,
}

/// A posting line validated and resolved against its account.
#[derive(Debug, Clone)]
pub struct ResolvedPosting {
    /// The account posted to.
    pub account_id: AccountId,
    /// The account's classification, for balance presentation.
    pub account_type: AccountType,
    /// Signed amount: positive debit, negative credit.
    pub signed_amount: Decimal,
    /// Optional memo.
    pub memo: Option<String>,
    /// Dimensional tags.
    pub tags: DimensionTags,
}

/// Entry totals for validation and display.
#[derive(Debug, Clone)]
pub struct EntryTotals {
    /// Total debit amount.
    pub debit: Decimal,
    /// Total credit amount.
    pub credit: Decimal,
    /// Whether the entry is balanced (debits == credits, exactly).
    pub is_balanced: bool,
}

impl EntryTotals {
    /// Creates entry totals from debit and credit sums.
    ///
    /// Balance is exact `Decimal` equality. There is no tolerance: a
    /// difference of the smallest representable unit is unbalanced.
    #[must_use]
    pub fn new(debit: Decimal, credit: Decimal) -> Self {
        Self {
            debit,
            credit,
            is_balanced: debit == credit,
        }
    }

    /// Returns the difference between debits and credits.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_amount() {
        let debit = PostingInput {
            account_id: AccountId::new(),
            entry_type: EntryType::Debit,
            amount: dec!(100),
            memo: None,
            tags: DimensionTags::default(),
        };
        assert_eq!(debit.signed_amount(), dec!(100));

        let credit = PostingInput {
            entry_type: EntryType::Credit,
            ..debit
        };
        assert_eq!(credit.signed_amount(), dec!(-100));
    }

    #[test]
    fn test_account_type_normal_side() {
        assert!(AccountType::Asset.is_debit_normal());
        assert!(AccountType::Expense.is_debit_normal());
        assert!(!AccountType::Liability.is_debit_normal());
        assert!(!AccountType::Equity.is_debit_normal());
        assert!(!AccountType::Revenue.is_debit_normal());
    }

    #[test]
    fn test_totals_balanced() {
        let totals = EntryTotals::new(dec!(100.00), dec!(100.00));
        assert!(totals.is_balanced);
        assert_eq!(totals.difference(), Decimal::ZERO);
    }

    #[test]
    fn test_totals_unbalanced_by_smallest_unit() {
        let totals = EntryTotals::new(dec!(100.0000001), dec!(100));
        assert!(!totals.is_balanced);
        assert_eq!(totals.difference(), dec!(0.0000001));
    }
}
