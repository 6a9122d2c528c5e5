//! Posting validation for the double-entry journal.
//!
//! Validation is pure: account information is injected through a lookup
//! closure so the same rules run identically in unit tests and inside the
//! repository's unit of work.

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{AccountInfo, EntryTotals, EntryType, PostEntryInput, ResolvedPosting};

/// Validates a journal entry input and resolves its postings.
///
/// Checks, in order:
/// 1. At least 2 posting lines
/// 2. Every amount positive and non-zero (sign comes from the entry type)
/// 3. Every account exists, is active, and belongs to the entry's organization
/// 4. Debits equal credits under exact `Decimal` comparison
///
/// The period gate is not checked here; the repository asks the period rules
/// before opening its unit of work.
///
/// # Errors
///
/// Returns `LedgerError` if any check fails. `UnbalancedEntry` is never
/// auto-corrected: a sum of `0.0000001` is a failure, not a rounding success.
pub fn validate_entry<A>(
    input: &PostEntryInput,
    account_lookup: A,
) -> Result<(Vec<ResolvedPosting>, EntryTotals), LedgerError>
where
    A: Fn(trellis_shared::types::AccountId) -> Result<AccountInfo, LedgerError>,
{
    if input.postings.len() < 2 {
        return Err(LedgerError::InsufficientPostings);
    }

    let mut resolved = Vec::with_capacity(input.postings.len());
    let mut debit = Decimal::ZERO;
    let mut credit = Decimal::ZERO;

    for posting in &input.postings {
        if posting.amount == Decimal::ZERO {
            return Err(LedgerError::ZeroAmount);
        }
        if posting.amount < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount);
        }

        let account = account_lookup(posting.account_id)?;
        if account.organization_id != input.organization_id {
            return Err(LedgerError::AccountOrganizationMismatch(posting.account_id));
        }
        if !account.is_active {
            return Err(LedgerError::AccountInactive(posting.account_id));
        }

        match posting.entry_type {
            EntryType::Debit => debit += posting.amount,
            EntryType::Credit => credit += posting.amount,
        }

        resolved.push(ResolvedPosting {
            account_id: posting.account_id,
            account_type: account.account_type,
            signed_amount: posting.signed_amount(),
            memo: posting.memo.clone(),
            tags: posting.tags.clone(),
        });
    }

    let totals = EntryTotals::new(debit, credit);
    if !totals.is_balanced {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    Ok((resolved, totals))
}
