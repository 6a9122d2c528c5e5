//! Double-entry journal logic.
//!
//! This module implements the core ledger functionality:
//! - Journal entries and their posting lines
//! - Business rule validation (balanced, exact, org-scoped)
//! - Balance projection rules
//! - Reversal construction
//! - Error types for ledger operations

pub mod balance;
pub mod entry;
pub mod error;
pub mod reversal;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use balance::{account_deltas, dimensional_deltas, natural_balance, BalanceDelta};
pub use entry::{DimensionTags, JournalEntry, Posting};
pub use error::LedgerError;
pub use reversal::build_reversal;
pub use types::{
    AccountInfo, AccountType, EntryTotals, EntryType, PostEntryInput, PostingInput,
    ResolvedPosting,
};
pub use validation::validate_entry;
