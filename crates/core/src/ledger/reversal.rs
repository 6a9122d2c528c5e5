//! Reversal construction.
//!
//! A reversal never edits the original entry: it is a new balancing entry
//! whose postings are the originals with inverted signs. The reversal date
//! follows the period rule (original date while the period is open, today
//! once it has closed).

use chrono::NaiveDate;
use trellis_shared::types::{JournalEntryId, UserId};

use super::entry::Posting;
use super::error::LedgerError;
use super::types::{EntryType, PostEntryInput, PostingInput};

/// Builds the posting input that reverses an existing entry.
///
/// Debits become credits and vice versa; amounts, accounts, and tags are
/// preserved. The idempotency key is derived from the original entry id so
/// a retried reversal collides with itself.
///
/// # Errors
///
/// Returns `LedgerError::AlreadyReversed` if the original already carries a
/// reversal stamp, and `LedgerError::EmptyReversal` if the original has no
/// postings to invert (a corrupt read, not a valid state).
pub fn build_reversal(
    original_entry_id: JournalEntryId,
    original_reversed_by: Option<JournalEntryId>,
    original_postings: &[Posting],
    original_description: &str,
    organization_id: trellis_shared::types::OrganizationId,
    reversal_date: NaiveDate,
    reason: &str,
    requested_by: UserId,
) -> Result<PostEntryInput, LedgerError> {
    if original_reversed_by.is_some() {
        return Err(LedgerError::AlreadyReversed(original_entry_id));
    }
    if original_postings.is_empty() {
        return Err(LedgerError::EmptyReversal(original_entry_id));
    }

    let postings = original_postings
        .iter()
        .map(|p| {
            let (entry_type, amount) = if p.signed_amount.is_sign_positive() {
                (EntryType::Credit, p.signed_amount)
            } else {
                (EntryType::Debit, -p.signed_amount)
            };
            PostingInput {
                account_id: p.account_id,
                entry_type,
                amount,
                memo: Some(format!(
                    "Reversal: {}",
                    p.memo.clone().unwrap_or_default()
                )),
                tags: p.tags.clone(),
            }
        })
        .collect();

    Ok(PostEntryInput {
        organization_id,
        entry_date: reversal_date,
        description: format!(
            "Reversal of '{original_description}'. Reason: {reason}"
        ),
        idempotency_key: format!("reversal:{original_entry_id}"),
        postings,
        created_by: requested_by,
    })
}
