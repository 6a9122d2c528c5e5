//! Property tests for posting validation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use trellis_shared::types::{AccountId, OrganizationId, UserId};

use super::entry::DimensionTags;
use super::error::LedgerError;
use super::types::{AccountInfo, AccountType, EntryType, PostEntryInput, PostingInput};
use super::validation::validate_entry;

fn org() -> OrganizationId {
    OrganizationId::from_uuid(uuid::Uuid::nil())
}

fn ok_lookup(id: AccountId) -> Result<AccountInfo, LedgerError> {
    Ok(AccountInfo {
        id,
        organization_id: org(),
        account_type: AccountType::Asset,
        is_active: true,
    })
}

fn make_input(postings: Vec<PostingInput>) -> PostEntryInput {
    PostEntryInput {
        organization_id: org(),
        entry_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        description: "generated".to_string(),
        idempotency_key: "prop-key".to_string(),
        postings,
        created_by: UserId::new(),
    }
}

fn posting(entry_type: EntryType, cents: i64) -> PostingInput {
    PostingInput {
        account_id: AccountId::new(),
        entry_type,
        amount: Decimal::new(cents, 2),
        memo: None,
        tags: DimensionTags::default(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Mirrored debit/credit pairs always validate, and the resolved
    /// signed amounts always sum to exactly zero.
    #[test]
    fn prop_mirrored_pairs_validate(
        cents in prop::collection::vec(1i64..10_000_000i64, 1..8),
    ) {
        let mut postings = Vec::new();
        for c in &cents {
            postings.push(posting(EntryType::Debit, *c));
            postings.push(posting(EntryType::Credit, *c));
        }

        let (resolved, totals) = validate_entry(&make_input(postings), ok_lookup).unwrap();
        prop_assert!(totals.is_balanced);
        let sum: Decimal = resolved.iter().map(|p| p.signed_amount).sum();
        prop_assert_eq!(sum, Decimal::ZERO);
    }

    /// Any single-cent perturbation of a balanced entry fails with
    /// `UnbalancedEntry`: there is no tolerance window.
    #[test]
    fn prop_perturbed_entry_rejected(
        cents in 2i64..10_000_000i64,
    ) {
        let postings = vec![
            posting(EntryType::Debit, cents),
            posting(EntryType::Credit, cents - 1),
        ];

        let result = validate_entry(&make_input(postings), ok_lookup);
        prop_assert!(
            matches!(result, Err(LedgerError::UnbalancedEntry { .. })),
            "expected UnbalancedEntry error"
        );
    }

    /// Validation never panics and never fabricates a balanced result for
    /// arbitrary debit/credit mixes: it either errors or the resolved sum
    /// is exactly zero.
    #[test]
    fn prop_no_silent_imbalance(
        debits in prop::collection::vec(1i64..1_000_000i64, 1..6),
        credits in prop::collection::vec(1i64..1_000_000i64, 1..6),
    ) {
        let mut postings: Vec<PostingInput> =
            debits.iter().map(|c| posting(EntryType::Debit, *c)).collect();
        postings.extend(credits.iter().map(|c| posting(EntryType::Credit, *c)));

        match validate_entry(&make_input(postings), ok_lookup) {
            Ok((resolved, totals)) => {
                prop_assert!(totals.is_balanced);
                let sum: Decimal = resolved.iter().map(|p| p.signed_amount).sum();
                prop_assert_eq!(sum, Decimal::ZERO);
            }
            Err(LedgerError::UnbalancedEntry { debit, credit }) => {
                prop_assert_ne!(debit, credit);
            }
            Err(e) => prop_assert!(false, "unexpected error: {e}"),
        }
    }
}
