//! Balance projection rules.
//!
//! The materialized `AccountBalance` value is the exact signed sum of every
//! posting ever applied to the account: debits add, credits subtract,
//! regardless of account type. Presentation in an account's natural sign is
//! a display concern layered on top.

use rust_decimal::Decimal;
use trellis_shared::types::AccountId;

use super::entry::DimensionTags;
use super::types::{AccountType, ResolvedPosting};

/// The balance increments one journal entry produces.
///
/// Computed once per entry inside the posting unit of work and applied as
/// atomic SQL increments, never as application-level read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    /// The account to increment.
    pub account_id: AccountId,
    /// Dimensional tags, when the increment also addresses a dimensional row.
    pub tags: DimensionTags,
    /// Signed amount to add to the balance.
    pub delta: Decimal,
}

/// Collapses an entry's resolved postings into per-account increments.
///
/// Postings hitting the same account are combined so each balance row is
/// touched once per unit of work. Posting order within the entry does not
/// affect the result.
#[must_use]
pub fn account_deltas(postings: &[ResolvedPosting]) -> Vec<BalanceDelta> {
    let mut deltas: Vec<BalanceDelta> = Vec::new();
    for posting in postings {
        match deltas
            .iter_mut()
            .find(|d| d.account_id == posting.account_id && d.tags.is_empty())
        {
            Some(existing) => existing.delta += posting.signed_amount,
            None => deltas.push(BalanceDelta {
                account_id: posting.account_id,
                tags: DimensionTags::default(),
                delta: posting.signed_amount,
            }),
        }
    }
    deltas
}

/// Per-dimension increments for postings carrying tags.
///
/// Each distinct (account, tag combination) gets its own increment; untagged
/// postings produce none.
#[must_use]
pub fn dimensional_deltas(postings: &[ResolvedPosting]) -> Vec<BalanceDelta> {
    let mut deltas: Vec<BalanceDelta> = Vec::new();
    for posting in postings {
        if posting.tags.is_empty() {
            continue;
        }
        match deltas.iter_mut().find(|d| {
            d.account_id == posting.account_id
                && d.tags.dimension_key() == posting.tags.dimension_key()
        }) {
            Some(existing) => existing.delta += posting.signed_amount,
            None => deltas.push(BalanceDelta {
                account_id: posting.account_id,
                tags: posting.tags.clone(),
                delta: posting.signed_amount,
            }),
        }
    }
    deltas
}

/// Presents a signed-sum balance in the account's natural sign.
///
/// Asset/Expense accounts are debit-normal (signed sum already natural);
/// Liability/Equity/Revenue accounts are credit-normal, so their natural
/// balance is the negated signed sum.
#[must_use]
pub fn natural_balance(account_type: AccountType, signed_sum: Decimal) -> Decimal {
    if account_type.is_debit_normal() {
        signed_sum
    } else {
        -signed_sum
    }
}
